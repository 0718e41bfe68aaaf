use crate::authority::{ChangeFeed, PollAuthority};
use crate::models::PollMessage;
use crate::store::PollStore;
use crate::tasks::refetch;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Collapse notifications already queued for the same poll into a single
    /// refetch.
    pub coalesce: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { coalesce: true }
    }
}

// poll id -> message carrying it
type Watched = Arc<Mutex<HashMap<String, PollMessage>>>;

/// Keeps store snapshots in step with changes made by other users and
/// devices.
///
/// Runs a background task that listens to the change feed. Each notification
/// for a watched poll triggers one full refetch followed by a store
/// replacement. Refetch failures are logged and leave the snapshot as it was;
/// the next notification or user action syncs again.
pub struct LiveSyncController {
    watched: Watched,
    task: JoinHandle<()>,
}

fn lock(watched: &Watched) -> MutexGuard<'_, HashMap<String, PollMessage>> {
    watched.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LiveSyncController {
    pub fn spawn(
        authority: Arc<dyn PollAuthority>,
        store: PollStore,
        user_id: String,
        feed: ChangeFeed,
        config: SyncConfig,
    ) -> Self {
        let watched: Watched = Arc::default();
        let task = tokio::spawn(run(
            feed,
            Arc::clone(&watched),
            authority,
            store,
            user_id,
            config,
        ));
        Self { watched, task }
    }

    pub fn watch(&self, message: &PollMessage) {
        lock(&self.watched).insert(message.poll_id.clone(), message.clone());
    }

    pub fn unwatch(&self, poll_id: &str) {
        lock(&self.watched).remove(poll_id);
    }

    pub fn is_watching(&self, poll_id: &str) -> bool {
        lock(&self.watched).contains_key(poll_id)
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for LiveSyncController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut feed: ChangeFeed,
    watched: Watched,
    authority: Arc<dyn PollAuthority>,
    store: PollStore,
    user_id: String,
    config: SyncConfig,
) {
    info!("Starting live poll sync for {}", user_id);

    loop {
        let mut batch: Vec<String> = Vec::new();
        let mut resync_all = false;

        match feed.recv().await {
            Ok(event) => batch.push(event.poll_id),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Missed {} change notification(s), resyncing every watched poll", skipped);
                resync_all = true;
            }
            Err(RecvError::Closed) => {
                info!("Change feed closed, stopping live sync for {}", user_id);
                break;
            }
        }

        if config.coalesce {
            loop {
                match feed.try_recv() {
                    Ok(event) => {
                        if !batch.contains(&event.poll_id) {
                            batch.push(event.poll_id);
                        }
                    }
                    Err(TryRecvError::Lagged(_)) => resync_all = true,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }

        let targets: Vec<PollMessage> = {
            let watched = lock(&watched);
            if resync_all {
                watched.values().cloned().collect()
            } else {
                batch
                    .iter()
                    .filter_map(|poll_id| {
                        let message = watched.get(poll_id).cloned();
                        if message.is_none() {
                            debug!("Ignoring change to unwatched poll {}", poll_id);
                        }
                        message
                    })
                    .collect()
            }
        };

        for message in targets {
            // Read before the fetch starts so an unmount mid-flight wins
            let epoch = store.epoch(&message.poll_id);
            let authority = Arc::clone(&authority);
            let store = store.clone();
            let user_id = user_id.clone();

            // Each refetch runs on its own; results land in resolution order
            tokio::spawn(async move {
                match refetch(authority.as_ref(), &store, &user_id, &message, epoch).await {
                    Ok(Some(snapshot)) => debug!(
                        "Synced poll {} ({} votes)",
                        message.poll_id, snapshot.poll.total_votes
                    ),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Poll {} may be stale, refetch failed: {}",
                        message.poll_id, e
                    ),
                }
            });
        }
    }
}
