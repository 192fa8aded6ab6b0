//! The normalized event model downstream consumers see.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The four operations this crate ever emits.
///
/// Bit encoding matches the wire format used when an `Event` is serialized:
/// `Create = 1, Write = 2, Remove = 4, Rename = 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Create,
    Write,
    Remove,
    Rename,
}

impl Op {
    pub fn bits(self) -> u8 {
        match self {
            Op::Create => 1,
            Op::Write => 2,
            Op::Remove => 4,
            Op::Rename => 8,
        }
    }
}

/// A normalized, platform-independent filesystem change.
///
/// `old_path` is populated if and only if `op == Op::Rename`; `path` is
/// always the post-state path (the new name, for a rename).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub path: PathBuf,
    pub old_path: Option<PathBuf>,
    pub op: Op,
    pub is_dir: bool,
}

impl Event {
    pub fn new(path: impl Into<PathBuf>, op: Op, is_dir: bool) -> Self {
        debug_assert!(op != Op::Rename, "use Event::rename for Op::Rename");
        Self {
            path: path.into(),
            old_path: None,
            op,
            is_dir,
        }
    }

    pub fn create(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::new(path, Op::Create, is_dir)
    }

    pub fn write(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::new(path, Op::Write, is_dir)
    }

    pub fn remove(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self::new(path, Op::Remove, is_dir)
    }

    pub fn rename(old_path: impl Into<PathBuf>, new_path: impl Into<PathBuf>, is_dir: bool) -> Self {
        let old_path = old_path.into();
        assert!(!old_path.as_os_str().is_empty(), "rename old_path must be non-empty");
        Self {
            path: new_path.into(),
            old_path: Some(old_path),
            op: Op::Rename,
            is_dir,
        }
    }

    /// The path this event concerns a move into/out of the old location for,
    /// if it is a rename; otherwise `path`.
    pub fn primary_path(&self) -> &Path {
        &self.path
    }
}
