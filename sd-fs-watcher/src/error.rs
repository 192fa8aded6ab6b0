//! Error types surfaced by the watcher.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned synchronously from [`crate::Watcher::new`](crate::watcher::Watcher::new).
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// The underlying raw backend failed to initialize (e.g. the OS ran out
    /// of inotify instances, or the platform watch API refused to start).
    #[error("failed to initialize watch backend: {0}")]
    BackendInit(String),

    /// One of the requested roots does not exist or is not a directory.
    #[error("watch root does not exist or is not a directory: {0}")]
    NoSuchRoot(PathBuf),

    /// One of the requested roots could not be read.
    #[error("access denied to watch root: {0}")]
    AccessDenied(PathBuf),
}

/// Errors delivered on the watcher's error sequence after construction.
#[derive(Error, Debug)]
pub enum WatchError {
    /// A watched root itself was removed. Fatal: the watcher keeps draining
    /// in-flight work but the consumer is expected to call `close()`.
    #[error("watched root was removed: {0}")]
    WatchedRootRemoved(PathBuf),

    /// An error surfaced verbatim from the raw backend's transport. Fatal
    /// only if the backend also ends its raw event sequence.
    #[error("raw backend transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A `walkdir` traversal error encountered while enlisting a newly
    /// created subtree. Non-fatal: surfaced for visibility, the watcher
    /// continues running.
    #[error("failed to walk directory during enlistment: {0}")]
    Enlist(#[from] walkdir::Error),
}

pub type ConstructionResult<T> = std::result::Result<T, ConstructionError>;
pub type Result<T> = std::result::Result<T, WatchError>;
