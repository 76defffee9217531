//! Filesystem watching: debounced, write-stability-aware single-file
//! ingestion triggered by `notify` events (spec §4.7).

pub mod service;
pub mod watcher;

pub use service::{WatcherEvent, WatcherService};
pub use watcher::{FileWatcher, WatchEvent};
