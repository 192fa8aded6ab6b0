//! Cross-platform filesystem change notifier.
//!
//! Normalizes low-level, temporally-scattered kernel notifications (inotify,
//! FSEvents, ReadDirectoryChangesW) into a uniform, deduplicated,
//! pair-correlated event stream: `Create`, `Write`, `Remove`, `Rename`.
//! Downstream consumers never see which OS primitive produced an event.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use sd_fs_watcher::{Watcher, WatchOptions};
//!
//! let mut watcher = Watcher::new(vec!["/tmp/project".into()], WatchOptions::default())?;
//! while let Some(event) = watcher.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod probe;
pub mod recursive_enlister;
pub mod rename_correlator;
pub mod root_sentry;
pub mod translator;
pub mod watcher;
pub mod write_synthesizer;

pub use config::{Granularity, WatchOptions};
pub use error::{ConstructionError, ConstructionResult, Result, WatchError};
pub use event::{Event, Op};
pub use watcher::{new_watcher, Watcher};
