//! `FsProbe` — the small filesystem-inspection port the core consumes for
//! symlink resolution, cycle detection, and initial directory enumeration.
//!
//! The production implementation is a thin wrapper over `std::fs` and
//! `walkdir`; tests substitute an in-memory fake so that cycle-detection and
//! ignore-glob logic can be exercised without touching a real filesystem.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem inspection primitives the core needs and nothing more.
pub trait FsProbe: Send + Sync {
    /// Follows symlinks (`stat`).
    fn stat(&self, path: &Path) -> io::Result<Metadata>;

    /// Does not follow symlinks (`lstat`).
    fn lstat(&self, path: &Path) -> io::Result<Metadata>;

    /// Resolves one level of symlink indirection.
    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    /// True if `path`, after following symlinks, names a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Enumerates every directory (not file) under `root`, `root` included,
    /// following symlinks during the walk so newly-linked subtrees are
    /// picked up — callers are responsible for cycle detection via
    /// [`FsProbe::same_file`].
    fn walk_dirs(&self, root: &Path) -> Vec<PathBuf>;

    /// True if `a` and `b` name the same underlying file (inode identity),
    /// used to detect symlink cycles during recursive enlistment.
    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool>;
}

/// Production [`FsProbe`] backed by `std::fs` and `walkdir`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFsProbe;

impl FsProbe for StdFsProbe {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::metadata(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.stat(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn walk_dirs(&self, root: &Path) -> Vec<PathBuf> {
        walkdir::WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.path().to_path_buf())
            .collect()
    }

    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool> {
        same_file::is_same_file(a, b)
    }
}

/// Walks the ancestor chain of `symlink_path` (the directory the symlink
/// itself lives under, and upward from there) and returns `true` if any
/// ancestor is the same underlying file as `target` — i.e. recursing into
/// `target` would re-enter a directory already on the path down to this
/// symlink, the standard `walkdir`-style symlink-loop check. Caps the walk
/// at `max_depth` ancestors so a pathological filesystem can't spin this
/// forever.
pub fn has_cycle(probe: &dyn FsProbe, symlink_path: &Path, target: &Path, max_depth: usize) -> bool {
    let mut current = symlink_path.parent();
    for _ in 0..max_depth {
        let Some(ancestor) = current else {
            return false;
        };
        match probe.same_file(ancestor, target) {
            Ok(true) => return true,
            _ => {}
        }
        current = ancestor.parent();
    }
    false
}
