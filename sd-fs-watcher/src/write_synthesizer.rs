//! Converts noisy Create/Modify/Close-Write sequences into the one-Create,
//! no-spurious-Write-on-creation semantics downstream consumers expect
//! (`spec.md` §4.3).
//!
//! On backends that couple file creation with a later close-write
//! notification (inotify, ReadDirectoryChangesW), a bare `Created` for a
//! non-directory does not emit anything yet — it only marks the path as
//! "just created" so the *next* close-write/commit-flagged modify for that
//! path is reported as `Create` rather than `Write`. A safety timer ensures
//! the `Create` still fires even if no close-write ever arrives (e.g. the
//! file is created and then deleted before being written to).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinSet;
use tracing::debug;

use crate::event::Event;

/// Tracks paths whose `Create` is pending a close-write/commit signal.
#[derive(Default)]
pub struct WriteSynthesizer {
    /// One-shot signal per just-created path. Consuming it (via `resolve`
    /// or the safety timeout racing it) removes the entry.
    just_created: RwLock<HashMap<std::path::PathBuf, oneshot::Sender<()>>>,
}

impl WriteSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as just-created and registers the safety timer that
    /// emits `Create` on its own if no close-write arrives within `timeout`
    /// onto `tasks`, so the caller's drain can await it like any other
    /// in-flight rename/create task rather than it running fully detached.
    /// The emitted event (if the timer fires) is sent to `emit`.
    pub async fn mark_just_created(
        self: &Arc<Self>,
        path: std::path::PathBuf,
        timeout: Duration,
        emit: tokio::sync::mpsc::Sender<Event>,
        tasks: &mut JoinSet<()>,
    ) {
        let (tx, rx) = oneshot::channel();
        {
            let mut map = self.just_created.write().await;
            // A second Created for the same path (backend glitch / rapid
            // recreate) replaces the stale signal rather than stacking one.
            map.insert(path.clone(), tx);
        }

        let this = self.clone();
        tasks.spawn(async move {
            match tokio::time::timeout(timeout, rx).await {
                Ok(_) => {
                    // Consumed by `resolve` before the timer fired — nothing
                    // left to do.
                }
                Err(_) => {
                    let consumed = this.try_consume(&path).await;
                    if consumed {
                        debug!(?path, "create safety timeout fired, no close-write arrived");
                        let _ = emit.send(Event::create(path, false)).await;
                    }
                }
            }
        });
    }

    /// Called on `CloseWrite`/commit-flagged `Modify` for `path`. Returns
    /// `true` if a pending just-created marker was consumed (the caller
    /// should emit `Create`); `false` if none was pending (emit `Write`).
    pub async fn resolve(&self, path: &std::path::Path) -> bool {
        self.try_consume(path).await
    }

    async fn try_consume(&self, path: &std::path::Path) -> bool {
        let sender = self.just_created.write().await.remove(path);
        match sender {
            Some(tx) => {
                // Ignore send failure: the safety-timer task may have
                // already raced past its timeout and returned.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}
