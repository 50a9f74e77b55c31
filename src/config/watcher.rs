//! Keymap file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watches the keymap file and delivers its new contents.
///
/// Validation is left to the receiver, which owns the command tables.
pub struct KeymapWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<String>,
}

impl KeymapWatcher {
    /// Start watching `path`; must be called from within a Tokio runtime
    pub fn new(path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::channel(10);

        // notify callbacks run on their own OS thread, not in Tokio context
        let runtime_handle = tokio::runtime::Handle::current();
        let watched = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        debug!("Keymap file changed: {:?}", event.paths);

                        let path = watched.clone();
                        let tx = tx.clone();

                        runtime_handle.spawn(async move {
                            // Debounce: wait a bit for file writes to complete
                            tokio::time::sleep(Duration::from_millis(100)).await;

                            match tokio::fs::read_to_string(&path).await {
                                Ok(text) => {
                                    if let Err(e) = tx.send(text).await {
                                        error!("Failed to send keymap update: {}", e);
                                    }
                                }
                                Err(e) => {
                                    warn!("Failed to read keymap {} (keeping current): {}", path.display(), e);
                                }
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(Path::new(&path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch keymap file: {}", path.display()))?;

        info!("Keymap watcher started for: {}", path.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next file contents.
    /// Returns None if the watcher has been closed
    pub async fn next_text(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
