//! `RawBackend` — the port the core consumes raw, backend-native
//! notifications through. Three OS primitives live behind this port in
//! principle (inotify, FSEvents, ReadDirectoryChangesW); this crate ships a
//! single production adapter (`notify_backend`) that delegates the actual
//! syscall plumbing to the `notify` crate's own per-platform watchers, and a
//! scripted in-memory backend for tests (`mock`).

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::error::ConstructionResult;

pub mod mock;
pub mod notify_backend;

bitflags! {
    /// Flags a single raw event can carry. Mirrors `spec.md` §3's
    /// `RawEvent.flags` bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RawFlags: u32 {
        const CREATED       = 1 << 0;
        const REMOVED       = 1 << 1;
        /// Departure half of a cookie-keyed rename (inotify `IN_MOVED_FROM`,
        /// Windows `IN_MOVED_FROM` analogue).
        const RENAMED_FROM  = 1 << 2;
        /// Arrival half of a cookie-keyed rename.
        const RENAMED_TO    = 1 << 3;
        /// A rename the backend cannot pair itself (FSEvents-style).
        const RENAMED       = 1 << 4;
        const MODIFIED      = 1 << 5;
        const INODE_META_MOD = 1 << 6;
        /// A write-capable descriptor was closed — the conventional commit
        /// point on backends that provide it.
        const CLOSE_WRITE   = 1 << 7;
        const IS_DIR        = 1 << 8;
        const IS_SYMLINK    = 1 << 9;
        /// The event concerns a watched root itself, not a path under it.
        const ROOT_CHANGED  = 1 << 10;
        /// The backend's event queue overflowed; events may have been
        /// dropped. Not attributable to any single path.
        const OVERFLOW      = 1 << 11;
    }
}

/// A backend-native notification, not yet normalized.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: Option<PathBuf>,
    pub flags: RawFlags,
    /// Pairs a rename's `from` half with its `to` half. `None` means the
    /// backend can't correlate the two itself (the cookieless FIFO path).
    pub cookie: Option<u32>,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, flags: RawFlags) -> Self {
        Self {
            path: Some(path.into()),
            flags,
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: u32) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn overflow() -> Self {
        Self {
            path: None,
            flags: RawFlags::OVERFLOW,
            cookie: None,
        }
    }
}

/// What a given backend can and can't tell us, queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether rename events ever carry a `cookie` pairing from/to.
    pub supports_cookies: bool,
    /// Whether newly created subdirectories are watched without the core
    /// having to register them explicitly.
    pub implicit_recursion: bool,
    /// Whether writes are signalled by a close-of-write-handle event
    /// (`CLOSE_WRITE`) rather than by a modify+inode-metadata pair.
    pub emits_close_write: bool,
    /// Whether raw events carry the `IS_DIR` flag directly, or whether the
    /// core must `stat` to find out.
    pub has_is_dir_flag: bool,
}

/// The live half of a started backend: a lazy sequence of raw events and a
/// parallel sequence of transport errors, both of which finish once `stop()`
/// has drained them.
pub struct BackendHandle {
    pub events: tokio::sync::mpsc::UnboundedReceiver<RawEvent>,
    pub errors: tokio::sync::mpsc::UnboundedReceiver<std::io::Error>,
}

/// Port the Translator consumes raw notifications through.
pub trait RawBackend: Send {
    fn capabilities(&self) -> Capabilities;

    /// Starts watching `roots` (non-recursively per root — see
    /// `RecursiveEnlister`, which is responsible for extending the watch set
    /// to subdirectories) and returns the live event/error sequences.
    fn start(&mut self, roots: &[PathBuf]) -> ConstructionResult<BackendHandle>;

    /// Registers one additional directory, non-recursively.
    fn watch(&mut self, path: &Path) -> std::io::Result<()>;

    /// Unregisters a previously-watched directory.
    fn unwatch(&mut self, path: &Path) -> std::io::Result<()>;

    /// Stops the backend; causes both sequences returned by `start` to
    /// finish after draining.
    fn stop(&mut self);
}
