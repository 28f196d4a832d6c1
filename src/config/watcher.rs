//! Rule document watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::document::AccessSystem;
use crate::config::loader::load_document;

/// Watches the rule document and emits freshly parsed replacements.
///
/// A document that fails to load or validate is dropped here with an
/// error log; the receiver never sees it and the live snapshot stays
/// authoritative. Expression compilation happens downstream, at snapshot
/// build, with the same fail-closed behavior.
pub struct DocumentWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AccessSystem>,
}

impl DocumentWatcher {
    /// Create a new DocumentWatcher.
    ///
    /// Returns the watcher and a receiver for parsed documents.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AccessSystem>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("rule document change detected, reloading...");
                        match load_document(&path) {
                            Ok(doc) => {
                                let _ = tx.send(doc);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "failed to reload rule document; keeping current snapshot"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("watch error: {e:?}"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "document watcher started");
        Ok(watcher)
    }
}
