use crate::models::PollSnapshot;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub type Callback = Arc<dyn Fn(&Arc<PollSnapshot>) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback,
}

struct Entry {
    snapshot: Option<Arc<PollSnapshot>>,
    subscribers: Vec<Subscriber>,
    // Unique per entry across the whole store, so a result read against a
    // removed entry never matches the entry that replaces it
    epoch: u64,
}

/// Epoch reported for a poll that has no entry yet.
pub const UNMOUNTED: u64 = 0;

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    // Serialises notification rounds so every subscriber sees replacements
    // in the order they were applied
    dispatch: Mutex<()>,
    next_id: AtomicU64,
    last_epoch: AtomicU64,
}

impl Inner {
    fn entry<'a>(&self, entries: &'a mut HashMap<String, Entry>, poll_id: &str) -> &'a mut Entry {
        entries.entry(poll_id.to_string()).or_insert_with(|| Entry {
            snapshot: None,
            subscribers: Vec::new(),
            epoch: self.last_epoch.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }
}

/// Client-side poll snapshots keyed by poll id.
///
/// Writes are whole-snapshot swaps. Readers get an `Arc` to an immutable
/// snapshot, so they can never observe options from one fetch mixed with
/// counts from another. Callbacks run synchronously inside `replace` and must
/// not call `replace` themselves.
#[derive(Clone, Default)]
pub struct PollStore {
    inner: Arc<Inner>,
}

/// Handle returned by [`PollStore::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    store: Weak<Inner>,
    poll_id: String,
    id: u64,
    active: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PollStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, poll_id: &str) -> Option<Arc<PollSnapshot>> {
        lock(&self.inner.entries)
            .get(poll_id)
            .and_then(|entry| entry.snapshot.clone())
    }

    /// Swaps in `snapshot` and notifies every subscriber of `poll_id`.
    pub fn replace(&self, poll_id: &str, snapshot: PollSnapshot) -> Arc<PollSnapshot> {
        let _dispatch = lock(&self.inner.dispatch);
        let (snapshot, subscribers) = {
            let mut entries = lock(&self.inner.entries);
            Self::swap(self.inner.entry(&mut entries, poll_id), snapshot)
        };
        Self::notify(&snapshot, subscribers);
        snapshot
    }

    /// Like [`replace`](Self::replace), but only if the entry has not been
    /// torn down since `epoch` was read. Returns `None` when the result was
    /// discarded.
    ///
    /// An epoch of [`UNMOUNTED`] was read before the poll had an entry, so it
    /// fills whatever entry exists now.
    pub fn replace_if_current(
        &self,
        poll_id: &str,
        epoch: u64,
        snapshot: PollSnapshot,
    ) -> Option<Arc<PollSnapshot>> {
        let _dispatch = lock(&self.inner.dispatch);
        let (snapshot, subscribers) = {
            let mut entries = lock(&self.inner.entries);
            let current = entries.get(poll_id).map(|entry| entry.epoch);
            if epoch != UNMOUNTED && current != Some(epoch) {
                debug!(
                    "Discarding stale snapshot for poll {} (epoch {}, now {:?})",
                    poll_id, epoch, current
                );
                return None;
            }
            Self::swap(self.inner.entry(&mut entries, poll_id), snapshot)
        };
        Self::notify(&snapshot, subscribers);
        Some(snapshot)
    }

    /// Current epoch of `poll_id`. Capture it before starting async work whose
    /// result will be applied with [`replace_if_current`](Self::replace_if_current).
    pub fn epoch(&self, poll_id: &str) -> u64 {
        lock(&self.inner.entries)
            .get(poll_id)
            .map(|entry| entry.epoch)
            .unwrap_or(UNMOUNTED)
    }

    /// Drops the snapshot of `poll_id` unless someone is still subscribed.
    /// Returns whether the entry was removed.
    pub fn discard(&self, poll_id: &str) -> bool {
        let mut entries = lock(&self.inner.entries);
        match entries.get(poll_id) {
            Some(entry) if entry.subscribers.is_empty() => {
                entries.remove(poll_id);
                debug!("Discarded unwatched snapshot of poll {}", poll_id);
                true
            }
            _ => false,
        }
    }

    pub fn subscribe<F>(&self, poll_id: &str, callback: F) -> Subscription
    where
        F: Fn(&Arc<PollSnapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        let mut entries = lock(&self.inner.entries);
        self.inner
            .entry(&mut entries, poll_id)
            .subscribers
            .push(Subscriber {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });

        Subscription {
            store: Arc::downgrade(&self.inner),
            poll_id: poll_id.to_string(),
            id,
            active,
        }
    }

    pub fn subscriber_count(&self, poll_id: &str) -> usize {
        lock(&self.inner.entries)
            .get(poll_id)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    fn swap(entry: &mut Entry, snapshot: PollSnapshot) -> (Arc<PollSnapshot>, Vec<Subscriber>) {
        let snapshot = Arc::new(snapshot);
        entry.snapshot = Some(Arc::clone(&snapshot));
        let subscribers = entry
            .subscribers
            .iter()
            .map(|subscriber| Subscriber {
                id: subscriber.id,
                active: Arc::clone(&subscriber.active),
                callback: Arc::clone(&subscriber.callback),
            })
            .collect();
        (snapshot, subscribers)
    }

    fn notify(snapshot: &Arc<PollSnapshot>, subscribers: Vec<Subscriber>) {
        for subscriber in subscribers {
            // A subscriber may have been dropped after the swap, never call it
            if subscriber.active.load(Ordering::Acquire) {
                (subscriber.callback)(snapshot);
            }
        }
    }
}

impl Inner {
    fn unsubscribe(&self, poll_id: &str, id: u64) {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get_mut(poll_id) else {
            return;
        };
        entry.subscribers.retain(|subscriber| subscriber.id != id);
        if entry.subscribers.is_empty() {
            entries.remove(poll_id);
            debug!("Last subscriber left poll {}, snapshot discarded", poll_id);
        }
    }
}

impl Subscription {
    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            inner.unsubscribe(&self.poll_id, self.id);
        }
    }
}
