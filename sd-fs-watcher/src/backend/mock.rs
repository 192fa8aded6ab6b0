//! Scripted, in-memory [`RawBackend`] used by unit tests to drive the
//! Translator/RenameCorrelator/WriteSynthesizer/RecursiveEnlister state
//! machines deterministically, without touching a real filesystem.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::ConstructionResult;

use super::{BackendHandle, Capabilities, RawBackend, RawEvent};

/// A [`RawBackend`] whose raw events are pushed in by the test itself via
/// [`MockRawBackend::sender`], rather than produced by the OS.
///
/// The channels are created at construction time (not in [`RawBackend::start`])
/// so a test can grab a [`MockRawBackend::sender`] clone before handing the
/// backend off (boxed, by value) to [`crate::watcher::Watcher::with_backend_and_probe`].
pub struct MockRawBackend {
    capabilities: Capabilities,
    events_tx: mpsc::UnboundedSender<RawEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<RawEvent>>,
    errors_tx: mpsc::UnboundedSender<std::io::Error>,
    errors_rx: Option<mpsc::UnboundedReceiver<std::io::Error>>,
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockRawBackend {
    pub fn new(capabilities: Capabilities) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            capabilities,
            events_tx,
            events_rx: Some(events_rx),
            errors_tx,
            errors_rx: Some(errors_rx),
            watched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A sender the test can push scripted [`RawEvent`]s through.
    pub fn sender(&self) -> mpsc::UnboundedSender<RawEvent> {
        self.events_tx.clone()
    }

    pub fn error_sender(&self) -> mpsc::UnboundedSender<std::io::Error> {
        self.errors_tx.clone()
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched.lock().expect("watched lock poisoned").clone()
    }
}

impl RawBackend for MockRawBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn start(&mut self, roots: &[PathBuf]) -> ConstructionResult<BackendHandle> {
        let events = self.events_rx.take().expect("MockRawBackend::start called twice");
        let errors = self.errors_rx.take().expect("MockRawBackend::start called twice");
        self.watched.lock().expect("watched lock poisoned").extend(roots.iter().cloned());
        Ok(BackendHandle { events, errors })
    }

    fn watch(&mut self, path: &Path) -> std::io::Result<()> {
        self.watched.lock().expect("watched lock poisoned").push(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> std::io::Result<()> {
        self.watched.lock().expect("watched lock poisoned").retain(|p| p != path);
        Ok(())
    }

    fn stop(&mut self) {
        // Nothing to tear down: the channels are plain in-memory `mpsc`
        // pairs. A test holding its own `sender()`/`error_sender()` clone
        // keeps the backend's sequences open until it drops them too,
        // mirroring how a real OS handle only fully releases once every
        // reference to it is gone.
    }
}
