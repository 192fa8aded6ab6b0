//! Construction-time configuration for a watcher.

use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Granularity hint passed to the raw backend; not all backends honor all
/// variants (e.g. FSEvents has no notion of per-file granularity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// Report events for individual files inside watched directories.
    PerFile,
    /// Only report that *something* changed under a watched directory.
    PerDirectory,
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::PerFile
    }
}

/// Knobs accepted by [`crate::Watcher::new`](crate::watcher::Watcher::new).
///
/// This is plain, serializable data — callers may embed it in their own
/// persisted configuration, but this crate does not read or write any config
/// file itself (see `spec.md` Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Latency hint forwarded to the raw backend (FSEvents-style backends
    /// coalesce within this window; others ignore it).
    pub latency: Duration,

    /// Whether subdirectories should be watched. When `false` the
    /// `RecursiveEnlister` never walks or registers new subtrees.
    pub recursive: bool,

    pub granularity: Granularity,

    /// Deadline for pairing a cookie-keyed rename's `from` half with its
    /// `to` half. Defaults to 500ms, per `spec.md` §4.2.
    pub rename_deadline: Duration,

    /// Idle timeout for the cookieless rename FIFO (FSEvents-style
    /// backends). Defaults to 1s, per `spec.md` §4.2.
    pub cookieless_rename_idle: Duration,

    /// Safety timeout ensuring a just-created file still gets its `Create`
    /// even if no close-write ever arrives. Defaults to 3s, per `spec.md`
    /// §4.3.
    pub create_safety_timeout: Duration,

    /// Glob patterns (matched against the absolute path) for directories
    /// that should never be registered or recursed into.
    ignored_patterns: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            recursive: true,
            granularity: Granularity::default(),
            rename_deadline: Duration::from_millis(500),
            cookieless_rename_idle: Duration::from_secs(1),
            create_safety_timeout: Duration::from_secs(3),
            ignored_patterns: Vec::new(),
        }
    }
}

impl WatchOptions {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_rename_deadline(mut self, deadline: Duration) -> Self {
        self.rename_deadline = deadline;
        self
    }

    pub fn with_cookieless_rename_idle(mut self, idle: Duration) -> Self {
        self.cookieless_rename_idle = idle;
        self
    }

    pub fn with_create_safety_timeout(mut self, timeout: Duration) -> Self {
        self.create_safety_timeout = timeout;
        self
    }

    /// Add an ignore glob (e.g. `"**/.git"`), matched against absolute
    /// paths. Invalid patterns are dropped silently — callers that need to
    /// surface glob syntax errors should validate with [`Glob::new`]
    /// themselves before calling this.
    pub fn with_ignored(mut self, pattern: impl Into<String>) -> Self {
        self.ignored_patterns.push(pattern.into());
        self
    }

    pub fn ignored_patterns(&self) -> &[String] {
        &self.ignored_patterns
    }

    /// Compile the ignore patterns into a matchable [`GlobSet`]. Invalid
    /// patterns are dropped; call once at watcher construction and hold the
    /// result rather than recompiling per path.
    pub fn compile_ignored(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignored_patterns {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    }
}
