//! File watching for tessera.
//!
//! Watches the site's inputs and reruns the build whenever one of them
//! changes.

pub mod rebuild;
pub mod watcher;

pub use rebuild::rebuild_on_change;
pub use watcher::{FileWatcher, WatchError, WatchEvent};
