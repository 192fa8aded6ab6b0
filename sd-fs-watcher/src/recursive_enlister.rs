//! Extends the watch set to newly created subdirectories on backends that
//! are not inherently recursive, and filters symlinks that would otherwise
//! create watch cycles or escape the observable universe (`spec.md` §4.4).

use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, warn};

use crate::backend::RawBackend;
use crate::error::WatchError;
use crate::probe::{has_cycle, FsProbe};

/// Maximum ancestor-chain depth walked during symlink cycle detection —
/// defensive cap against a pathological filesystem, not a realistic limit.
const MAX_CYCLE_DEPTH: usize = 256;

pub struct RecursiveEnlister {
    ignored: GlobSet,
}

/// What to do with a symlink encountered during enlistment.
pub enum SymlinkOutcome {
    /// Target is not a directory: report a plain file `Create`, don't enlist.
    File,
    /// Target is a directory outside every watched root, or forms a cycle:
    /// drop silently, emit nothing.
    Drop,
    /// Target is a non-cyclic directory under a watched root: report a
    /// directory `Create` and recurse into it.
    Directory,
}

impl RecursiveEnlister {
    pub fn new(ignored: GlobSet) -> Self {
        Self { ignored }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.is_match(path)
    }

    /// Walks `root`'s initial subtree (or the subtree rooted at a newly
    /// created directory) and registers every non-ignored directory with
    /// the backend. Walk failures are surfaced as [`WatchError::Enlist`]-ish
    /// warnings but never abort the enlistment of the remaining entries.
    pub fn enlist_subtree(&self, backend: &mut dyn RawBackend, probe: &dyn FsProbe, root: &Path, errors: &tokio::sync::mpsc::Sender<WatchError>) {
        for dir in probe.walk_dirs(root) {
            if self.is_ignored(&dir) {
                debug!(path = %dir.display(), "skipping ignored directory during enlistment");
                continue;
            }
            if let Err(err) = backend.watch(&dir) {
                warn!(path = %dir.display(), %err, "failed to register directory with raw backend");
                let _ = errors.try_send(WatchError::Transport(err));
            } else {
                debug!(path = %dir.display(), "enlisted directory");
            }
        }
    }

    /// Decides what a newly created symlink means for the watch set, per
    /// `spec.md` §4.4. `watched_roots` is the full set of roots the watcher
    /// was constructed with.
    pub fn classify_symlink(&self, probe: &dyn FsProbe, path: &Path, watched_roots: &[PathBuf]) -> SymlinkOutcome {
        let Ok(target) = probe.readlink(path) else {
            // Ambiguous filesystem state (link vanished under us) — the
            // caller drops the raw event entirely per §7's recovery policy.
            return SymlinkOutcome::Drop;
        };
        let target = if target.is_absolute() {
            target
        } else {
            path.parent().map(|p| p.join(&target)).unwrap_or(target)
        };

        if !probe.is_dir(&target) {
            return SymlinkOutcome::File;
        }

        if has_cycle(probe, path, &target, MAX_CYCLE_DEPTH) {
            debug!(path = %path.display(), target = %target.display(), "dropping symlink, cycle detected");
            return SymlinkOutcome::Drop;
        }

        let escapes_watched_universe = !watched_roots.iter().any(|root| target.starts_with(root));
        if escapes_watched_universe {
            debug!(path = %path.display(), target = %target.display(), "dropping symlink, target outside watched roots");
            return SymlinkOutcome::Drop;
        }

        SymlinkOutcome::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockRawBackend;
    use crate::backend::{Capabilities, RawBackend};
    use crate::probe::StdFsProbe;
    use globset::{Glob, GlobSetBuilder};

    fn caps() -> Capabilities {
        Capabilities {
            supports_cookies: true,
            implicit_recursion: false,
            emits_close_write: true,
            has_is_dir_flag: true,
        }
    }

    #[tokio::test]
    async fn enlist_subtree_skips_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();

        let mut ignored = GlobSetBuilder::new();
        ignored.add(Glob::new(&format!("{}/**", dir.path().join("target").display())).unwrap());
        let enlister = RecursiveEnlister::new(ignored.build().unwrap());

        let mut backend = MockRawBackend::new(caps());
        backend.start(&[dir.path().to_path_buf()]).unwrap();
        let (errors_tx, _errors_rx) = tokio::sync::mpsc::channel(8);

        enlister.enlist_subtree(&mut backend, &StdFsProbe, dir.path(), &errors_tx);

        let watched = backend.watched_paths();
        assert!(watched.iter().any(|p| p.ends_with("src")));
        assert!(!watched.iter().any(|p| p.ends_with("target")));
    }

    #[cfg(unix)]
    #[test]
    fn classify_symlink_to_file_is_file_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.txt");
        std::fs::write(&target, b"hi").unwrap();
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let enlister = RecursiveEnlister::new(globset::GlobSet::empty());
        let outcome = enlister.classify_symlink(&StdFsProbe, &link, &[dir.path().to_path_buf()]);
        assert!(matches!(outcome, SymlinkOutcome::File));
    }

    #[cfg(unix)]
    #[test]
    fn classify_symlink_escaping_watched_roots_is_dropped() {
        let watched = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let link = watched.path().join("escape");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let enlister = RecursiveEnlister::new(globset::GlobSet::empty());
        let outcome = enlister.classify_symlink(&StdFsProbe, &link, &[watched.path().to_path_buf()]);
        assert!(matches!(outcome, SymlinkOutcome::Drop));
    }

    #[cfg(unix)]
    #[test]
    fn classify_symlink_within_watched_root_is_directory() {
        let watched = tempfile::tempdir().unwrap();
        let real_sub = watched.path().join("real_sub");
        std::fs::create_dir_all(&real_sub).unwrap();
        let link = watched.path().join("link_sub");
        std::os::unix::fs::symlink(&real_sub, &link).unwrap();

        let enlister = RecursiveEnlister::new(globset::GlobSet::empty());
        let outcome = enlister.classify_symlink(&StdFsProbe, &link, &[watched.path().to_path_buf()]);
        assert!(matches!(outcome, SymlinkOutcome::Directory));
    }
}
