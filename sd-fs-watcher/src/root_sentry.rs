//! Detects removal of a watched root itself and surfaces
//! [`WatchError::WatchedRootRemoved`] (`spec.md` §4.5).
//!
//! Some backends can only report exact-path equality against a single
//! watched root, others a full-set membership check across several roots
//! covered by one handle. This crate always watches a set of roots through
//! one `RawBackend`, so membership-in-the-set is the generalization that
//! covers both (see `DESIGN.md` §11.2).

use std::path::{Path, PathBuf};

use tracing::error;

/// Read-only set of the directories this watcher was constructed with.
pub struct RootSentry {
    roots: Vec<PathBuf>,
}

impl RootSentry {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// `true` if `path` names a watched root itself (not merely something
    /// under it). FSEvents prefixes the root removal notification with a
    /// `private/` path component on some macOS configurations; normalize
    /// that away before comparing, per `spec.md` §4.5.
    pub fn is_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root == path || strip_private_prefix(path).as_deref() == Some(root.as_path()))
    }

    /// Called when a `Removed` raw event's path matches a watched root.
    /// Always fatal: logs at `error!` and returns the sentinel the
    /// Translator forwards on the error sequence.
    pub fn on_root_removed(&self, root: &Path) -> crate::error::WatchError {
        error!(path = %root.display(), "watched root was removed");
        crate::error::WatchError::WatchedRootRemoved(root.to_path_buf())
    }
}

fn strip_private_prefix(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    let root = match components.next() {
        Some(root @ std::path::Component::RootDir) => root,
        _ => return None,
    };
    match components.next() {
        Some(std::path::Component::Normal(c)) if c == "private" => {
            let mut stripped = PathBuf::from(root.as_os_str());
            stripped.push(components.as_path());
            Some(stripped)
        }
        _ => None,
    }
}
