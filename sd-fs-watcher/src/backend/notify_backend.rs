//! Production [`RawBackend`] built on top of the `notify` crate.
//!
//! `notify` already owns the genuinely platform-specific work this spec
//! treats as out of scope (inotify/FSEvents/ReadDirectoryChangesW syscalls);
//! this adapter's only job is translating `notify::Event` into this crate's
//! `RawEvent` vocabulary. Watches are always registered
//! [`RecursiveMode::NonRecursive`] so that `RecursiveEnlister` — not
//! `notify` — is the component responsible for extending the watch set to
//! newly created subdirectories, per `spec.md` §4.4. On FSEvents-backed
//! platforms `notify`'s underlying stream is inherently recursive regardless
//! of the mode requested; `RecursiveEnlister`'s extra registrations there are
//! idempotent no-ops rather than load-bearing (see `DESIGN.md`).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{ConstructionError, ConstructionResult};

use super::{BackendHandle, Capabilities, RawBackend, RawEvent, RawFlags};

pub struct NotifyRawBackend {
    watcher: Option<RecommendedWatcher>,
    synthetic_cookie: Arc<AtomicU32>,
}

impl Default for NotifyRawBackend {
    fn default() -> Self {
        Self {
            watcher: None,
            synthetic_cookie: Arc::new(AtomicU32::new(1)),
        }
    }
}

impl NotifyRawBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawBackend for NotifyRawBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_cookies: true,
            implicit_recursion: false,
            emits_close_write: !cfg!(target_os = "macos"),
            has_is_dir_flag: true,
        }
    }

    fn start(&mut self, roots: &[PathBuf]) -> ConstructionResult<BackendHandle> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let cookie_gen = self.synthetic_cookie.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            match result {
                Ok(event) => {
                    for raw in translate(event, &cookie_gen) {
                        if events_tx.send(raw).is_err() {
                            break;
                        }
                    }
                }
                Err(err) => {
                    let _ = errors_tx.send(std::io::Error::new(std::io::ErrorKind::Other, err));
                }
            }
        })
        .map_err(|err| ConstructionError::BackendInit(err.to_string()))?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::NonRecursive)
                .map_err(|err| ConstructionError::BackendInit(err.to_string()))?;
        }

        self.watcher = Some(watcher);

        Ok(BackendHandle {
            events: events_rx,
            errors: errors_rx,
        })
    }

    fn watch(&mut self, path: &Path) -> std::io::Result<()> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "backend not started"))?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(to_io_error)
    }

    fn unwatch(&mut self, path: &Path) -> std::io::Result<()> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };
        match watcher.unwatch(path) {
            Ok(()) => Ok(()),
            // Already gone (e.g. the directory was removed before we got to
            // unwatch it) — not an error worth propagating.
            Err(err) if matches!(err.kind, notify::ErrorKind::WatchNotFound) => Ok(()),
            Err(err) => Err(to_io_error(err)),
        }
    }

    fn stop(&mut self) {
        // Dropping the watcher tears down its platform thread/handle and
        // closes the channel senders the callback holds, which finishes
        // both sequences returned by `start` once drained.
        self.watcher = None;
    }
}

fn to_io_error(err: notify::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

/// Translates one `notify::Event` into zero or more `RawEvent`s. Most map
/// one-to-one; `RenameMode::Both` (a backend that already paired a rename
/// itself) fans out into a `from`+`to` pair sharing a synthesized cookie so
/// the core's `RenameCorrelator` is exercised uniformly regardless of
/// whether the underlying platform needed correlation help.
fn translate(event: notify::Event, cookie_gen: &AtomicU32) -> Vec<RawEvent> {
    let tracker = event.attrs.tracker().map(|t| t as u32);

    match event.kind {
        EventKind::Create(kind) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            let mut flags = RawFlags::CREATED;
            match kind {
                CreateKind::Folder => flags |= RawFlags::IS_DIR,
                CreateKind::File => {}
                _ => {}
            }
            vec![RawEvent::new(path, flags)]
        }
        EventKind::Remove(kind) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            let mut flags = RawFlags::REMOVED;
            if matches!(kind, RemoveKind::Folder) {
                flags |= RawFlags::IS_DIR;
            }
            vec![RawEvent::new(path, flags)]
        }
        EventKind::Modify(ModifyKind::Name(rename_mode)) => translate_rename(rename_mode, event.paths, tracker, cookie_gen),
        EventKind::Modify(ModifyKind::Data(change)) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            let mut flags = RawFlags::MODIFIED | RawFlags::CLOSE_WRITE;
            if matches!(change, DataChange::Any) {
                // Too vague to call it a commit point on its own.
                flags.remove(RawFlags::CLOSE_WRITE);
            }
            vec![RawEvent::new(path, flags)]
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            vec![RawEvent::new(path, RawFlags::MODIFIED | RawFlags::INODE_META_MOD)]
        }
        EventKind::Modify(ModifyKind::Any) | EventKind::Modify(ModifyKind::Other) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            // Bare, uncommitted modify — dropped downstream by the
            // WriteSynthesizer per spec.md §4.6's dispatch table.
            vec![RawEvent::new(path, RawFlags::MODIFIED)]
        }
        EventKind::Other => {
            if event.paths.is_empty() {
                warn!("notify reported an Other event with no attached path; treating as overflow");
                vec![RawEvent::overflow()]
            } else {
                vec![]
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            let Some(path) = event.paths.into_iter().next() else {
                return vec![];
            };
            // Linux's IN_CLOSE_WRITE, the conventional commit point for a
            // write-capable descriptor; inotify itself never reports this as
            // a Modify event, only as a separate Access/Close notification.
            vec![RawEvent::new(path, RawFlags::CLOSE_WRITE)]
        }
        EventKind::Access(_) | EventKind::Any => vec![],
    }
}

fn translate_rename(
    mode: RenameMode,
    mut paths: Vec<PathBuf>,
    tracker: Option<u32>,
    cookie_gen: &AtomicU32,
) -> Vec<RawEvent> {
    match mode {
        RenameMode::Both if paths.len() >= 2 => {
            let new_path = paths.pop().unwrap();
            let old_path = paths.pop().unwrap();
            let cookie = tracker.unwrap_or_else(|| cookie_gen.fetch_add(1, Ordering::Relaxed));
            vec![
                RawEvent::new(old_path, RawFlags::RENAMED_FROM).with_cookie(cookie),
                RawEvent::new(new_path, RawFlags::RENAMED_TO).with_cookie(cookie),
            ]
        }
        RenameMode::From => {
            let Some(path) = paths.into_iter().next() else {
                return vec![];
            };
            match tracker {
                Some(cookie) => vec![RawEvent::new(path, RawFlags::RENAMED_FROM).with_cookie(cookie)],
                None => vec![RawEvent::new(path, RawFlags::RENAMED)],
            }
        }
        RenameMode::To => {
            let Some(path) = paths.into_iter().next() else {
                return vec![];
            };
            match tracker {
                Some(cookie) => vec![RawEvent::new(path, RawFlags::RENAMED_TO).with_cookie(cookie)],
                None => vec![RawEvent::new(path, RawFlags::RENAMED)],
            }
        }
        RenameMode::Any | RenameMode::Other | RenameMode::Both => {
            // `Both` with fewer than 2 paths falls through here too — treat
            // every remaining path as an independent cookieless rename half.
            paths
                .into_iter()
                .map(|path| RawEvent::new(path, RawFlags::RENAMED))
                .collect()
        }
    }
}
