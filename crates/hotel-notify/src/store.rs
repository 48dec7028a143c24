//! Notification store.
//!
//! The store is the single source of truth for what the dashboard shows. Two
//! producers write into it: push dispatch via [`NotificationStore::merge`] and the
//! fallback poller via [`NotificationStore::reconcile`]. [`SharedStore`] serializes
//! both behind one mutex so the invariants below hold under interleaving:
//!
//! - at most one entry per id;
//! - list order is newest-known-first;
//! - an entry read locally never reverts to unread because of a fetch.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::model::Notification;

/// Position in the store's mutation sequence, captured when a fetch starts.
///
/// Pushes and deletes that happen after the mark win over the fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncMark(u64);

/// Counts published after every store mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub total: usize,
    pub unread: usize,
    /// Bumped on every change, including ones that leave the counts unchanged.
    pub version: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    notification: Notification,
    /// Sequence number of the push that inserted the entry; 0 for fetched entries.
    seq: u64,
}

/// Ordered, deduplicated notification list with read state.
#[derive(Debug, Default)]
pub struct NotificationStore {
    entries: VecDeque<Entry>,
    index: HashSet<String>,
    /// Ids removed locally, keyed by the sequence number of the removal.
    tombstones: HashMap<String, u64>,
    seq: u64,
    version: u64,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pushed notification at the front. Returns `false` if the id is
    /// already present, in which case nothing changes.
    pub fn merge(&mut self, notification: Notification) -> bool {
        if self.index.contains(&notification.id) {
            return false;
        }
        let seq = self.next_seq();
        self.index.insert(notification.id.clone());
        self.entries.push_front(Entry { notification, seq });
        self.version += 1;
        true
    }

    /// Replace the whole list with an authoritative server list.
    pub fn replace_all(&mut self, list: Vec<Notification>) {
        let mark = self.begin_sync();
        self.reconcile(list, mark);
    }

    /// Capture the current position before starting a fetch.
    pub fn begin_sync(&self) -> SyncMark {
        SyncMark(self.seq)
    }

    /// Apply a fetched list that was requested at `mark`.
    ///
    /// The list replaces the current contents except that entries pushed after the
    /// mark are kept, and ids removed locally after the mark stay removed. Local
    /// `read = true` flags carry forward for ids present on both sides. The result is
    /// sorted by timestamp, newest first; equal timestamps keep server order.
    pub fn reconcile(&mut self, list: Vec<Notification>, mark: SyncMark) {
        let read_ids: HashSet<String> = self
            .entries
            .iter()
            .filter(|e| e.notification.read)
            .map(|e| e.notification.id.clone())
            .collect();

        let mut seen: HashSet<String> = HashSet::with_capacity(list.len());
        let mut next: Vec<Entry> = Vec::with_capacity(list.len());

        for mut notification in list {
            if !seen.insert(notification.id.clone()) {
                continue;
            }
            let deleted_after_mark = self
                .tombstones
                .get(&notification.id)
                .is_some_and(|seq| *seq > mark.0);
            if deleted_after_mark {
                continue;
            }
            if read_ids.contains(&notification.id) {
                notification.read = true;
            }
            next.push(Entry {
                notification,
                seq: 0,
            });
        }

        for entry in self.entries.drain(..) {
            if entry.seq > mark.0 && !seen.contains(&entry.notification.id) {
                next.push(entry);
            }
        }

        next.sort_by(|a, b| b.notification.timestamp.cmp(&a.notification.timestamp));

        self.index = next.iter().map(|e| e.notification.id.clone()).collect();
        self.entries = next.into();
        self.tombstones.retain(|_, seq| *seq > mark.0);
        self.version += 1;
    }

    /// Flip one entry to read. Returns `true` if it was unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let changed = match self.entries.iter_mut().find(|e| e.notification.id == id) {
            Some(entry) if !entry.notification.read => {
                entry.notification.read = true;
                true
            }
            _ => false,
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Flip every entry to read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.notification.read) {
            entry.notification.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.version += 1;
        }
        changed
    }

    /// Remove an entry and remember the removal so in-flight fetches cannot bring
    /// it back.
    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        if !self.index.remove(id) {
            return None;
        }
        let pos = self.entries.iter().position(|e| e.notification.id == id)?;
        let entry = self.entries.remove(pos)?;
        let seq = self.next_seq();
        self.tombstones.insert(id.to_string(), seq);
        self.version += 1;
        Some(entry.notification)
    }

    /// Re-insert a removed notification at its timestamp position.
    pub fn restore(&mut self, notification: Notification) -> bool {
        self.tombstones.remove(&notification.id);
        if self.index.contains(&notification.id) {
            return false;
        }
        let pos = self
            .entries
            .iter()
            .position(|e| e.notification.timestamp <= notification.timestamp)
            .unwrap_or(self.entries.len());
        self.index.insert(notification.id.clone());
        self.entries.insert(
            pos,
            Entry {
                notification,
                seq: 0,
            },
        );
        self.version += 1;
        true
    }

    /// Forget a removal so the next fetch may bring the id back.
    pub fn clear_tombstone(&mut self, id: &str) {
        self.tombstones.remove(id);
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.notification.read).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.iter().find(|n| n.id == id)
    }

    /// Notifications in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter().map(|e| &e.notification)
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.iter().cloned().collect()
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            total: self.len(),
            unread: self.unread_count(),
            version: self.version,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Cloneable handle that serializes access to a [`NotificationStore`] and publishes
/// a [`StoreSummary`] after each change.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<NotificationStore>>,
    summary_tx: Arc<watch::Sender<StoreSummary>>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        let (summary_tx, _) = watch::channel(StoreSummary::default());
        Self {
            inner: Arc::new(Mutex::new(NotificationStore::new())),
            summary_tx: Arc::new(summary_tx),
        }
    }

    /// Run a mutation under the store lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut NotificationStore) -> R) -> R {
        let mut store = self.inner.lock();
        let result = f(&mut store);
        let summary = store.summary();
        self.summary_tx.send_if_modified(|current| {
            if *current == summary {
                false
            } else {
                *current = summary;
                true
            }
        });
        result
    }

    /// Run a read-only closure under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&NotificationStore) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn watch(&self) -> watch::Receiver<StoreSummary> {
        self.summary_tx.subscribe()
    }

    pub fn merge(&self, notification: Notification) -> bool {
        self.update(|s| s.merge(notification))
    }

    pub fn replace_all(&self, list: Vec<Notification>) {
        self.update(|s| s.replace_all(list))
    }

    pub fn begin_sync(&self) -> SyncMark {
        self.read(|s| s.begin_sync())
    }

    pub fn reconcile(&self, list: Vec<Notification>, mark: SyncMark) {
        self.update(|s| s.reconcile(list, mark))
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.read(|s| s.snapshot())
    }

    pub fn unread_count(&self) -> usize {
        self.read(|s| s.unread_count())
    }

    pub fn len(&self) -> usize {
        self.read(|s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|s| s.is_empty())
    }
}
