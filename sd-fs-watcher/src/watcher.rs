//! Public handle owning the translator, backend, and output sequences
//! (`spec.md` §4.7). Enforces the lifecycle invariants: construction
//! validates roots synchronously, `close()` is idempotent, and both output
//! sequences finish exactly once.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::backend::notify_backend::NotifyRawBackend;
use crate::backend::RawBackend;
use crate::config::WatchOptions;
use crate::error::{ConstructionError, ConstructionResult, WatchError};
use crate::event::Event;
use crate::probe::{FsProbe, StdFsProbe};
use crate::translator::Translator;

/// A running filesystem watcher. Drop without calling [`Watcher::close`]
/// still tears down the background task (the translator selects against a
/// dropped quit sender the same as an explicit signal), but callers should
/// prefer an explicit `close()` to observe the final transport error, if
/// any.
pub struct Watcher {
    events: mpsc::Receiver<Event>,
    errors: mpsc::Receiver<WatchError>,
    quit: Option<tokio::sync::oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<()>>,
    roots: Vec<PathBuf>,
    ignored_patterns: Vec<String>,
    closed: AtomicBool,
}

impl Watcher {
    /// Validates every root, starts the raw backend, performs initial
    /// recursive enlistment, and spawns the translator task.
    pub fn new(roots: Vec<PathBuf>, options: WatchOptions) -> ConstructionResult<Self> {
        Self::with_backend_and_probe(roots, options, Box::new(NotifyRawBackend::new()), Arc::new(StdFsProbe))
    }

    /// Like [`Watcher::new`] but with an injectable backend/probe, used by
    /// tests to drive the translator deterministically.
    pub fn with_backend_and_probe(
        roots: Vec<PathBuf>,
        options: WatchOptions,
        mut backend: Box<dyn RawBackend>,
        probe: Arc<dyn FsProbe>,
    ) -> ConstructionResult<Self> {
        for root in &roots {
            if !root.exists() {
                return Err(ConstructionError::NoSuchRoot(root.clone()));
            }
            match std::fs::metadata(root) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(ConstructionError::NoSuchRoot(root.clone())),
                Err(_) => return Err(ConstructionError::AccessDenied(root.clone())),
            }
        }

        let ignored_patterns = options.ignored_patterns().to_vec();
        let ignored = options.compile_ignored();

        let handle = backend.start(&roots)?;

        let translator = Translator::new(backend, probe, roots.clone(), ignored, options);
        let translator_handle = translator.spawn(handle.events, handle.errors);

        info!(roots = ?roots, "watcher constructed");

        Ok(Self {
            events: translator_handle.events,
            errors: translator_handle.errors,
            quit: Some(translator_handle.quit),
            join: Some(translator_handle.join),
            roots,
            ignored_patterns,
            closed: AtomicBool::new(false),
        })
    }

    /// Receives the next normalized event, if any. Returns `None` once the
    /// watcher has fully closed.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Receives the next error, if any. Returns `None` once the watcher has
    /// fully closed.
    pub async fn next_error(&mut self) -> Option<WatchError> {
        self.errors.recv().await
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn ignored_paths(&self) -> &[String] {
        &self.ignored_patterns
    }

    /// Idempotent. Signals the translator to stop, waits for it to finish
    /// draining, and closes both output sequences. Safe to call more than
    /// once or concurrently with event consumption.
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("close() called");
        if let Some(quit) = self.quit.take() {
            let _ = quit.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        // Anything the translator emitted during the draining window is
        // still sitting in `self.events`/`self.errors` at this point —
        // leave it there for the caller's own `next_event()`/`next_error()`
        // calls to observe, rather than discarding it here.
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Some(quit) = self.quit.take() {
                let _ = quit.send(());
            }
        }
    }
}

/// Convenience constructor matching `spec.md` §6's programmatic API shape.
pub fn new_watcher(roots: Vec<PathBuf>, ignored: Vec<String>) -> ConstructionResult<Watcher> {
    let mut options = WatchOptions::default();
    for pattern in ignored {
        options = options.with_ignored(pattern);
    }
    Watcher::new(roots, options)
}
