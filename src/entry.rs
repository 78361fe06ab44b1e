//! Cache entry: one entity's cached value, staleness flags and subscribers.
//!
//! An entry is a cheap handle over shared single-threaded state. The store
//! keeps one handle per canonical key and hands clones to callers, so a load
//! that completes is always applied to the same instance every caller holds.
//! Entries never perform I/O.

use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::strategy::EntryStatus;
use crate::subscription::{
    same_subscriber, Change, ChangeKind, Subscriber, SubscriberList, Subscription,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tokio::time::Instant;

struct EntryState<E> {
    key: String,
    data: Option<E>,
    loading: bool,
    fetch_timestamp: Option<Instant>,
    invalidated: bool,
    version: u64,
    age: Option<Instant>,
    generation: u64,
    optimistic_snapshot: Option<Option<E>>,
}

/// Handle to a cached entity.
///
/// Cloning the handle shares the underlying entry.
///
/// # Example
///
/// ```
/// use entity_store::{CacheEntry, subscription::subscriber};
/// use serde_json::json;
///
/// let entry: CacheEntry<serde_json::Value> = CacheEntry::stub("1");
/// assert!(entry.is_loading());
///
/// let _sub = entry.subscribe(subscriber(|change| {
///     println!("changed={} new={:?}", change.changed, change.new);
/// }));
/// entry.update(json!({"v": 1}));
/// assert_eq!(entry.version(), 1);
/// ```
pub struct CacheEntry<E: CacheEntity> {
    state: Rc<RefCell<EntryState<E>>>,
    subscribers: Rc<SubscriberList<E>>,
}

impl<E: CacheEntity> Clone for CacheEntry<E> {
    fn clone(&self) -> Self {
        CacheEntry {
            state: Rc::clone(&self.state),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<E: CacheEntity> CacheEntry<E> {
    /// Create a stub entry: no data, loading since now.
    pub fn stub(key: impl Into<String>) -> Self {
        CacheEntry {
            state: Rc::new(RefCell::new(EntryState {
                key: key.into(),
                data: None,
                loading: true,
                fetch_timestamp: Some(Instant::now()),
                invalidated: false,
                version: 0,
                age: None,
                generation: 0,
                optimistic_snapshot: None,
            })),
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Create an entry that is already settled with `data` (version 1).
    pub fn with_initial(key: impl Into<String>, data: E) -> Self {
        let entry = Self::stub(key);
        entry.update(data);
        entry
    }

    pub fn key(&self) -> String {
        self.state.borrow().key.clone()
    }

    /// Clone of the current data, if any has arrived.
    pub fn data(&self) -> Option<E> {
        self.state.borrow().data.clone()
    }

    /// Borrow the current data without cloning it.
    ///
    /// The closure must not mutate this entry.
    pub fn read<R>(&self, f: impl FnOnce(Option<&E>) -> R) -> R {
        f(self.state.borrow().data.as_ref())
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_invalidated(&self) -> bool {
        self.state.borrow().invalidated
    }

    /// Start time of the in-flight load; `None` when not loading.
    pub fn fetch_timestamp(&self) -> Option<Instant> {
        self.state.borrow().fetch_timestamp
    }

    /// Number of confirmed updates applied to this entry.
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Time of the most recent confirmed update.
    pub fn age(&self) -> Option<Instant> {
        self.state.borrow().age
    }

    /// Staleness flags as one snapshot.
    pub fn status(&self) -> EntryStatus {
        let st = self.state.borrow();
        EntryStatus {
            loading: st.loading,
            fetch_timestamp: st.fetch_timestamp,
            invalidated: st.invalidated,
            age: st.age,
        }
    }

    pub fn has_optimistic_snapshot(&self) -> bool {
        self.state.borrow().optimistic_snapshot.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Whether both handles point at the same entry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Append a change callback. Returns the handle that removes it again.
    pub fn subscribe(&self, callback: Subscriber<E>) -> Subscription<E> {
        self.subscribers.borrow_mut().push(Rc::clone(&callback));
        Subscription::new(Rc::downgrade(&self.subscribers), callback)
    }

    /// Remove the first registration of `callback`; no-op if absent.
    pub fn unsubscribe(&self, callback: &Subscriber<E>) {
        let mut list = self.subscribers.borrow_mut();
        if let Some(pos) = list.iter().position(|s| same_subscriber(s, callback)) {
            list.remove(pos);
        }
    }

    /// Apply confirmed data.
    ///
    /// Settles the entry (not loading, not invalidated), drops any pending
    /// optimistic snapshot, bumps the version and age, then notifies every
    /// subscriber with `changed` set from deep equality against the previous
    /// value.
    pub fn update(&self, data: E) {
        let old = {
            let mut st = self.state.borrow_mut();
            let old = st.data.replace(data.clone());
            st.loading = false;
            st.fetch_timestamp = None;
            st.invalidated = false;
            st.optimistic_snapshot = None;
            st.version += 1;
            st.age = Some(Instant::now());
            old
        };
        let changed = old.as_ref() != Some(&data);
        self.notify(ChangeKind::Confirmed, changed, old.as_ref(), Some(&data));
    }

    /// Apply a provisional change without touching version or age.
    ///
    /// The previous data is kept so [`revert_optimistic`](Self::revert_optimistic)
    /// can restore it. Subscribers are only told if the value differs.
    pub fn update_optimistic(&self, data: E) {
        let snapshot = {
            let mut st = self.state.borrow_mut();
            let snapshot = st.data.replace(data.clone());
            st.optimistic_snapshot = Some(snapshot.clone());
            snapshot
        };
        if snapshot.as_ref() != Some(&data) {
            self.notify(ChangeKind::Optimistic, true, snapshot.as_ref(), Some(&data));
        }
    }

    /// Restore the data saved by the last optimistic update.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if no optimistic update is pending.
    pub fn revert_optimistic(&self) -> Result<()> {
        let (before, after) = {
            let mut st = self.state.borrow_mut();
            let snapshot = st.optimistic_snapshot.take().ok_or_else(|| {
                Error::InvalidState(format!(
                    "no optimistic update to revert for item {}",
                    st.key
                ))
            })?;
            let before = std::mem::replace(&mut st.data, snapshot);
            (before, st.data.clone())
        };
        if before != after {
            self.notify(ChangeKind::Reverted, true, before.as_ref(), after.as_ref());
        }
        Ok(())
    }

    pub(crate) fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Record that a load was triggered.
    pub(crate) fn begin_load(&self, generation: u64, now: Instant) {
        let mut st = self.state.borrow_mut();
        st.loading = true;
        st.fetch_timestamp = Some(now);
        st.generation = generation;
    }

    pub(crate) fn invalidate(&self) {
        self.state.borrow_mut().invalidated = true;
    }

    fn notify(&self, kind: ChangeKind, changed: bool, old: Option<&E>, new: Option<&E>) {
        // Callbacks added while notifying wait for the next change.
        let snapshot: Vec<Subscriber<E>> = self.subscribers.borrow().clone();
        if snapshot.is_empty() {
            return;
        }
        let change = Change {
            kind,
            changed,
            old,
            new,
        };
        for callback in snapshot {
            callback(&change);
        }
    }
}

impl<E: CacheEntity + fmt::Debug> fmt::Debug for CacheEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("CacheEntry")
            .field("key", &st.key)
            .field("data", &st.data)
            .field("loading", &st.loading)
            .field("invalidated", &st.invalidated)
            .field("version", &st.version)
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}
