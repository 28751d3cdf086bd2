//! Rebuild loop.

use std::fmt::Display;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;

use crate::watcher::WatchEvent;

/// Run `rebuild` for every batch of changes until the event channel closes.
///
/// Events arriving within `quiet` of each other form one batch. Events under
/// an `ignore` path (typically the output directory) are dropped. A failed
/// rebuild is logged and the loop keeps going. Returns the number of
/// rebuilds attempted.
pub async fn rebuild_on_change<F, Fut, E>(
    mut events: Receiver<WatchEvent>,
    ignore: &[PathBuf],
    quiet: Duration,
    mut rebuild: F,
) -> usize
where
    F: FnMut(Vec<WatchEvent>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let ignore: Vec<PathBuf> = ignore
        .iter()
        .flat_map(|p| [p.clone(), fs::canonicalize(p).unwrap_or_else(|_| p.clone())])
        .collect();

    let mut rebuilds = 0;
    let mut open = true;

    while open {
        let Some(first) = events.recv().await else {
            break;
        };

        let mut batch = vec![first];
        loop {
            match tokio::time::timeout(quiet, events.recv()).await {
                Ok(Some(event)) => batch.push(event),
                Ok(None) => {
                    open = false;
                    break;
                }
                Err(_) => break,
            }
        }

        batch.retain(|e| !ignore.iter().any(|dir| e.path().starts_with(dir)));
        let Some(trigger) = batch.first() else {
            continue;
        };

        tracing::info!(
            "Change detected in {} ({} events), rebuilding",
            trigger.path().display(),
            batch.len()
        );

        rebuilds += 1;
        if let Err(e) = rebuild(batch).await {
            tracing::error!("Rebuild failed: {}", e);
        }
    }

    rebuilds
}
