//! File watching.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Page description was modified
    PageModified(PathBuf),

    /// Component source was modified
    ComponentModified(PathBuf),

    /// Stylesheet was modified
    StyleModified(PathBuf),

    /// File was created
    Created(PathBuf),

    /// File was deleted
    Deleted(PathBuf),

    /// Generic modification
    Modified(PathBuf),
}

impl WatchEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::PageModified(p)
            | WatchEvent::ComponentModified(p)
            | WatchEvent::StyleModified(p)
            | WatchEvent::Created(p)
            | WatchEvent::Deleted(p)
            | WatchEvent::Modified(p) => p,
        }
    }
}

/// Errors that can occur while setting up a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Directories are watched recursively, files on their own. Paths that do
    /// not exist yet are skipped with a warning. Returns the watcher and a
    /// channel to receive events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), WatchError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(WatchError::Init)?;

        let mut watched = Vec::new();
        for path in paths {
            if !path.exists() {
                tracing::warn!("Not watching {}: path does not exist", path.display());
                continue;
            }

            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(path, mode).map_err(|source| WatchError::Watch {
                path: path.display().to_string(),
                source,
            })?;
            watched.push(path.clone());
        }

        // notify calls back on its own thread; forward into the async channel
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for path in &event.paths {
                    if let Some(e) = classify_event(path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                _watcher: watcher,
                watched,
            },
            async_rx,
        ))
    }

    /// Paths actually being watched.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        EventKind::Modify(_) => match ext {
            "yaml" | "yml" => Some(WatchEvent::PageModified(path.to_path_buf())),
            "tsx" | "jsx" | "ts" | "js" => Some(WatchEvent::ComponentModified(path.to_path_buf())),
            "css" => Some(WatchEvent::StyleModified(path.to_path_buf())),
            _ => Some(WatchEvent::Modified(path.to_path_buf())),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use notify::EventKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_by_extension() {
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert_eq!(
            classify_event(Path::new("pages/home.yaml"), &modify),
            Some(WatchEvent::PageModified(PathBuf::from("pages/home.yaml")))
        );
        assert_eq!(
            classify_event(Path::new("components/card.tsx"), &modify),
            Some(WatchEvent::ComponentModified(PathBuf::from("components/card.tsx")))
        );
        assert_eq!(
            classify_event(Path::new("styles/site.css"), &modify),
            Some(WatchEvent::StyleModified(PathBuf::from("styles/site.css")))
        );
        assert_eq!(
            classify_event(Path::new("new.png"), &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Created(PathBuf::from("new.png")))
        );
        assert_eq!(classify_event(Path::new("x"), &EventKind::Any), None);
    }

    #[test]
    fn skips_missing_paths() {
        let temp = tempdir().unwrap();
        let existing = temp.path().to_path_buf();
        let missing = temp.path().join("nope");

        let (watcher, _rx) = FileWatcher::new(&[existing.clone(), missing]).unwrap();

        assert_eq!(watcher.watched(), &[existing]);
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("home.yaml");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "meta: {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }
}
