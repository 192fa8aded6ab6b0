//! Pairs the two-phase rename protocol (`Renamed|from` + `Renamed|to`) into a
//! single [`Event::rename`](crate::event::Event::rename).
//!
//! Two independent pairing strategies coexist because backends differ in
//! whether they can correlate a rename's halves themselves (`spec.md` §4.2):
//!
//! - **Cookie-keyed** (inotify, Windows): each `from` allocates a one-shot
//!   rendezvous keyed by the backend's `cookie`, with its own deadline task.
//!   A `to` carrying the same cookie deposits into it; a `to` with no match
//!   is an unrelated arrival (`Create`).
//! - **Cookieless** (FSEvents): a single FIFO slot holds at most one pending
//!   `old_path`; the next `Renamed` path pairs with it if it arrives before
//!   the idle timeout, otherwise the held path is resolved by probing the
//!   filesystem.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::event::Event;
use crate::probe::FsProbe;

/// Outcome of resolving one pending rename half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlated {
    Rename { old_path: PathBuf, new_path: PathBuf, is_dir: bool },
    /// The deadline elapsed with no `to` — the path left the watched set.
    Remove { path: PathBuf, is_dir: bool },
    /// A `to` arrived with no matching `from` — the path entered the
    /// watched set from outside it.
    Create { path: PathBuf, is_dir: bool },
}

impl Correlated {
    pub fn into_event(self) -> Event {
        match self {
            Correlated::Rename { old_path, new_path, is_dir } => Event::rename(old_path, new_path, is_dir),
            Correlated::Remove { path, is_dir } => Event::remove(path, is_dir),
            Correlated::Create { path, is_dir } => Event::create(path, is_dir),
        }
    }
}

/// Cookie-keyed half of the correlator. Each `from` owns a private
/// rendezvous, so pairing one rename never blocks or interferes with
/// another in flight concurrently.
///
/// Registration (`arm`) and waiting (`wait`) are deliberately split: `arm`
/// is synchronous and must run on the Translator's own task, in raw-event
/// order, so the rendezvous is visible to a `to` half processed right
/// after it in the same dispatch loop. Only the *wait* — which can take up
/// to `deadline` — is spawned as its own task. Folding both into one
/// spawned async fn would let the `to` half's dispatch run before the
/// spawned task ever got scheduled, racing the registration.
#[derive(Default)]
pub struct CookieCorrelator {
    pending: StdMutex<HashMap<u32, oneshot::Sender<(PathBuf, bool)>>>,
}

impl CookieCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronously registers a `from` half's rendezvous and returns a
    /// receiver the caller should await (typically on a spawned task) to
    /// learn the outcome.
    pub fn arm(&self, cookie: u32) -> oneshot::Receiver<(PathBuf, bool)> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("cookie correlator lock poisoned").insert(cookie, tx);
        rx
    }

    /// Awaits the rendezvous registered by [`CookieCorrelator::arm`] up to
    /// `deadline`, resolving to the correlation outcome.
    pub async fn wait(self: &Arc<Self>, old_path: PathBuf, is_dir: bool, cookie: u32, rx: oneshot::Receiver<(PathBuf, bool)>, deadline: Duration) -> Correlated {
        let result = tokio::time::timeout(deadline, rx).await;

        // Whichever side resolves first, make sure the slot doesn't linger
        // for a `to` that shows up late and would otherwise fall through
        // to the no-match `Create` branch for an already-decided rename.
        self.pending.lock().expect("cookie correlator lock poisoned").remove(&cookie);

        match result {
            Ok(Ok((new_path, new_is_dir))) => {
                debug!(cookie, ?old_path, ?new_path, "rename correlated via cookie");
                Correlated::Rename { old_path, new_path, is_dir: new_is_dir || is_dir }
            }
            _ => {
                debug!(cookie, ?old_path, "rename deadline elapsed, no matching arrival");
                Correlated::Remove { path: old_path, is_dir }
            }
        }
    }

    /// Deposits the `to` half for `cookie`. Returns `None` if it was
    /// delivered to a waiting `from` (a `Rename` will be emitted by the
    /// task that called [`CookieCorrelator::wait`]); returns `Some` with
    /// the path/is_dir to emit as a bare `Create` if no `from` is waiting.
    pub fn deposit(&self, cookie: u32, new_path: PathBuf, is_dir: bool) -> Option<Correlated> {
        let sender = self.pending.lock().expect("cookie correlator lock poisoned").remove(&cookie);
        match sender {
            Some(tx) => match tx.send((new_path, is_dir)) {
                Ok(()) => None,
                Err((new_path, is_dir)) => Some(Correlated::Create { path: new_path, is_dir }),
            },
            None => Some(Correlated::Create { path: new_path, is_dir }),
        }
    }
}

/// Cookieless half of the correlator (FSEvents-style): a single held slot
/// plus an idle timer, per `spec.md` §4.2's "small state machine" guidance —
/// deliberately not attempting any cross-pair heuristics.
pub struct CookielessCorrelator {
    held: Mutex<Option<(PathBuf, bool)>>,
    idle_timeout: Duration,
}

impl CookielessCorrelator {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            held: Mutex::new(None),
            idle_timeout,
        }
    }

    /// Offers one `Renamed` half with no cookie. If nothing is held, this
    /// path becomes the held `old_path` and the caller is responsible for
    /// resolving it after `idle_timeout` via [`CookielessCorrelator::resolve_held`]
    /// if no second half arrives first. If something is already held, this
    /// call pairs it immediately and returns the `Rename`.
    pub async fn offer(&self, path: PathBuf, is_dir: bool) -> Option<Correlated> {
        let mut held = self.held.lock().await;
        match held.take() {
            Some((old_path, old_is_dir)) => {
                debug!(?old_path, new_path = ?path, "cookieless rename paired");
                Some(Correlated::Rename {
                    old_path,
                    new_path: path,
                    is_dir: is_dir || old_is_dir,
                })
            }
            None => {
                *held = Some((path, is_dir));
                None
            }
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Called after `idle_timeout` has elapsed since a lone half was held
    /// with no pairing offer. If the slot still holds that same path (no
    /// pairing happened meanwhile), probes the filesystem to decide between
    /// `Remove` (path now gone — it left the watched set) and `Create`
    /// (path still exists — it entered, and the backend simply never paired
    /// the two sides, per `spec.md` §9's Open Question on FSEvents).
    pub async fn resolve_held(&self, probe: &dyn FsProbe, path: &std::path::Path) -> Option<Correlated> {
        let mut held = self.held.lock().await;
        match held.as_ref() {
            Some((held_path, is_dir)) if held_path == path => {
                let is_dir = *is_dir;
                let (path, _) = held.take().unwrap();
                drop(held);
                if probe.stat(&path).is_ok() {
                    debug!(?path, "cookieless rename idle timeout, path exists, emitting Create");
                    Some(Correlated::Create { path, is_dir })
                } else {
                    debug!(?path, "cookieless rename idle timeout, path gone, emitting Remove");
                    Some(Correlated::Remove { path, is_dir })
                }
            }
            _ => None,
        }
    }
}
