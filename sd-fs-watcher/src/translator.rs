//! The central state machine. Consumes raw events from a [`RawBackend`],
//! dispatches to the rename correlator, write synthesizer, recursive
//! enlister, and root sentry, and emits normalized [`Event`]s (`spec.md`
//! §4.6).
//!
//! Owns the backend exclusively: `watch()`/`unwatch()` calls made during
//! recursive enlistment happen on this task, never concurrently with any
//! other mutator, so no lock is needed around the backend itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use globset::GlobSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, trace, warn};

use crate::backend::{RawBackend, RawEvent, RawFlags};
use crate::config::WatchOptions;
use crate::error::WatchError;
use crate::event::Event;
use crate::probe::FsProbe;
use crate::recursive_enlister::{RecursiveEnlister, SymlinkOutcome};
use crate::rename_correlator::{CookieCorrelator, CookielessCorrelator};
use crate::root_sentry::RootSentry;
use crate::write_synthesizer::WriteSynthesizer;

/// Output-side channels and the quit handle the facade holds on to.
pub struct TranslatorHandle {
    pub events: mpsc::Receiver<Event>,
    pub errors: mpsc::Receiver<WatchError>,
    pub quit: oneshot::Sender<()>,
    pub join: tokio::task::JoinHandle<()>,
}

/// Buffer depth for the public output sequences. `spec.md` §5 requires
/// "a buffer of ≥128 events" as intentional backpressure.
const OUTPUT_BUFFER: usize = 128;

pub struct Translator {
    backend: Box<dyn RawBackend>,
    probe: Arc<dyn FsProbe>,
    options: WatchOptions,
    cookie_correlator: Arc<CookieCorrelator>,
    cookieless_correlator: Arc<CookielessCorrelator>,
    write_synth: Arc<WriteSynthesizer>,
    enlister: RecursiveEnlister,
    sentry: RootSentry,
}

impl Translator {
    pub fn new(
        backend: Box<dyn RawBackend>,
        probe: Arc<dyn FsProbe>,
        roots: Vec<PathBuf>,
        ignored: GlobSet,
        options: WatchOptions,
    ) -> Self {
        Self {
            backend,
            probe,
            cookie_correlator: Arc::new(CookieCorrelator::new()),
            cookieless_correlator: Arc::new(CookielessCorrelator::new(options.cookieless_rename_idle)),
            write_synth: Arc::new(WriteSynthesizer::new()),
            enlister: RecursiveEnlister::new(ignored),
            sentry: RootSentry::new(roots),
            options,
        }
    }

    pub fn backend_mut(&mut self) -> &mut dyn RawBackend {
        &mut *self.backend
    }

    pub fn enlister(&self) -> &RecursiveEnlister {
        &self.enlister
    }

    pub fn probe(&self) -> &Arc<dyn FsProbe> {
        &self.probe
    }

    /// Spawns the translator's long-lived task. `raw_events`/`raw_errors`
    /// are the receivers from the already-started [`crate::backend::BackendHandle`].
    pub fn spawn(mut self, raw_events: mpsc::UnboundedReceiver<RawEvent>, raw_errors: mpsc::UnboundedReceiver<std::io::Error>) -> TranslatorHandle {
        let (event_tx, event_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (quit_tx, quit_rx) = oneshot::channel();

        let join = tokio::spawn(async move {
            self.run(raw_events, raw_errors, quit_rx, event_tx, error_tx).await;
        });

        TranslatorHandle {
            events: event_rx,
            errors: error_rx,
            quit: quit_tx,
            join,
        }
    }

    async fn run(
        &mut self,
        mut raw_events: mpsc::UnboundedReceiver<RawEvent>,
        mut raw_errors: mpsc::UnboundedReceiver<std::io::Error>,
        mut quit_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<Event>,
        error_tx: mpsc::Sender<WatchError>,
    ) {
        info!(roots = ?self.sentry.roots(), "translator active");
        let mut tasks = JoinSet::new();

        let capabilities = self.backend.capabilities();
        if self.options.recursive && !capabilities.implicit_recursion {
            let roots = self.sentry.roots().to_vec();
            for root in &roots {
                self.enlister.enlist_subtree(&mut *self.backend, self.probe.as_ref(), root, &error_tx);
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = &mut quit_rx => {
                    info!("close requested, entering draining state");
                    break;
                }
                maybe_raw = raw_events.recv() => {
                    match maybe_raw {
                        Some(raw) => self.dispatch(raw, &mut tasks, &event_tx, &error_tx).await,
                        None => {
                            info!("raw backend ended its event sequence");
                            break;
                        }
                    }
                }
                maybe_err = raw_errors.recv() => {
                    if let Some(err) = maybe_err {
                        error!(%err, "raw backend transport error");
                        let _ = error_tx.send(WatchError::Transport(err)).await;
                    }
                }
            }
        }

        self.backend.stop();

        // Draining: let any already-scheduled raw events flush, and give
        // in-flight rename/create tasks a chance to resolve rather than be
        // silently dropped, bounded by a hard ceiling past close().
        let drain_deadline = Duration::from_secs(1);
        let drain = async {
            while let Some(raw) = raw_events.recv().await {
                self.dispatch(raw, &mut tasks, &event_tx, &error_tx).await;
            }
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(drain_deadline, drain).await.is_err() {
            warn!("draining timed out past its ceiling, abandoning remaining in-flight tasks");
            tasks.abort_all();
        }

        info!("translator finished, output sequences closing");
        // event_tx/error_tx are dropped here, which is what finishes the
        // facade's output sequences.
    }

    async fn dispatch(&mut self, raw: RawEvent, tasks: &mut JoinSet<()>, event_tx: &mpsc::Sender<Event>, error_tx: &mpsc::Sender<WatchError>) {
        let flags = raw.flags;
        trace!(?raw.path, ?flags, "dispatching raw event");

        if flags.contains(RawFlags::OVERFLOW) {
            error!("raw backend queue overflowed, events may have been dropped");
            let _ = error_tx
                .send(WatchError::Transport(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "raw backend event queue overflowed",
                )))
                .await;
            return;
        }

        let Some(path) = raw.path else {
            return;
        };
        let is_dir = flags.contains(RawFlags::IS_DIR);
        let capabilities = self.backend.capabilities();

        if flags.contains(RawFlags::REMOVED) {
            if flags.contains(RawFlags::ROOT_CHANGED) || self.sentry.is_root(&path) {
                let err = self.sentry.on_root_removed(&path);
                let _ = error_tx.send(err).await;
            } else {
                let _ = event_tx.send(Event::remove(path, is_dir)).await;
            }
            return;
        }

        if flags.contains(RawFlags::RENAMED_FROM) {
            if let Some(cookie) = raw.cookie {
                // Registration happens synchronously, here, before the next
                // raw event is dispatched — only the wait is deferred to a
                // task, so a `to` processed right after this one always
                // sees the rendezvous (see `CookieCorrelator`'s doc comment).
                let rx = self.cookie_correlator.arm(cookie);
                let correlator = self.cookie_correlator.clone();
                let deadline = self.options.rename_deadline;
                let event_tx = event_tx.clone();
                tasks.spawn(async move {
                    let outcome = correlator.wait(path, is_dir, cookie, rx, deadline).await;
                    let _ = event_tx.send(outcome.into_event()).await;
                });
            }
            return;
        }

        if flags.contains(RawFlags::RENAMED_TO) {
            if let Some(cookie) = raw.cookie {
                if let Some(outcome) = self.cookie_correlator.deposit(cookie, path, is_dir) {
                    let _ = event_tx.send(outcome.into_event()).await;
                }
            }
            return;
        }

        if flags.contains(RawFlags::RENAMED) {
            match self.cookieless_correlator.offer(path.clone(), is_dir).await {
                Some(outcome) => {
                    let _ = event_tx.send(outcome.into_event()).await;
                }
                None => {
                    let correlator = self.cookieless_correlator.clone();
                    let probe = self.probe.clone();
                    let idle = correlator.idle_timeout();
                    let event_tx = event_tx.clone();
                    tasks.spawn(async move {
                        tokio::time::sleep(idle).await;
                        if let Some(outcome) = correlator.resolve_held(probe.as_ref(), &path).await {
                            let _ = event_tx.send(outcome.into_event()).await;
                        }
                    });
                }
            }
            return;
        }

        if flags.contains(RawFlags::CREATED) {
            if flags.contains(RawFlags::IS_SYMLINK) {
                match self.enlister.classify_symlink(self.probe.as_ref(), &path, self.sentry.roots()) {
                    SymlinkOutcome::File => {
                        let _ = event_tx.send(Event::create(path, false)).await;
                    }
                    SymlinkOutcome::Directory => {
                        let _ = event_tx.send(Event::create(path.clone(), true)).await;
                        if self.options.recursive {
                            self.enlister.enlist_subtree(&mut *self.backend, self.probe.as_ref(), &path, error_tx);
                        }
                    }
                    SymlinkOutcome::Drop => {}
                }
                return;
            }

            if is_dir {
                if self.options.recursive && !capabilities.implicit_recursion {
                    self.enlister.enlist_subtree(&mut *self.backend, self.probe.as_ref(), &path, error_tx);
                }
                let _ = event_tx.send(Event::create(path, true)).await;
                return;
            }

            // Non-directory, non-symlink create.
            if capabilities.emits_close_write {
                let synth = self.write_synth.clone();
                synth.mark_just_created(path, self.options.create_safety_timeout, event_tx.clone(), tasks).await;
            } else {
                // FSEvents: no close-write follows, the Create is final.
                let _ = event_tx.send(Event::create(path, false)).await;
            }
            return;
        }

        let is_commit = flags.contains(RawFlags::CLOSE_WRITE) || (flags.contains(RawFlags::MODIFIED) && flags.contains(RawFlags::INODE_META_MOD));
        if is_commit {
            if self.write_synth.resolve(&path).await {
                let _ = event_tx.send(Event::create(path, is_dir)).await;
            } else {
                let _ = event_tx.send(Event::write(path, is_dir)).await;
            }
            return;
        }

        if flags.contains(RawFlags::MODIFIED) {
            // Bare, uncommitted modify — dropped per spec.md §4.6.
            trace!(?path, "dropping bare modify, no commit flag");
        }
    }
}
