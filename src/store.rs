//! Store - owns the entries of one entity type and decides when to load.

use crate::config::StoreConfig;
use crate::entity::CacheEntity;
use crate::entry::CacheEntry;
use crate::error::{Capability, Error, Result};
use crate::key::{qualified, EntityKey};
use crate::options::{FetchOptions, MutationOptions};
use crate::remote::{DeleteCompletion, LoadRequest, MutationCompletion, RawIngest};
use crate::strategy::LoadReason;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

struct StoreInner<E: CacheEntity> {
    name: RefCell<String>,
    config: StoreConfig<E>,
    entries: RefCell<HashMap<String, CacheEntry<E>>>,
    generations: Cell<u64>,
}

/// Client-side cache for one entity type.
///
/// `Store` is a cheap handle (`Clone` shares the same entries) meant for a
/// single-threaded, cooperatively scheduled environment. Remote functions
/// receive a `&Store` and may keep a clone to call back later.
///
/// Every id is canonicalized through [`EntityKey`] before any lookup, so
/// exactly one entry exists per canonical key.
///
/// # Example
///
/// ```
/// use entity_store::{Store, StoreConfig};
/// use serde_json::{json, Value};
///
/// let store = Store::new(
///     StoreConfig::<Value>::new("notes").with_raw_ingest_fn(|raw, store| {
///         store.update(&raw["id"], raw.clone());
///         Ok(())
///     }),
/// )
/// .unwrap();
///
/// store.update_from_raw_data(json!({"id": 1, "text": "hi"})).unwrap();
/// let entry = store.fetch(&1u32);
/// assert!(!entry.is_loading());
/// assert_eq!(entry.version(), 1);
/// ```
pub struct Store<E: CacheEntity> {
    inner: Rc<StoreInner<E>>,
}

impl<E: CacheEntity> Clone for Store<E> {
    fn clone(&self) -> Self {
        Store {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: CacheEntity> Store<E> {
    /// Create a store and ingest the configured initial state.
    ///
    /// # Errors
    ///
    /// - `Error::NotImplemented`: initial state given without a raw-data transform
    /// - any error the transform returns for an initial payload
    pub fn new(mut config: StoreConfig<E>) -> Result<Self> {
        let initial_state = std::mem::take(&mut config.initial_state);
        let name = config.name.take().unwrap_or_default();
        let store = Store {
            inner: Rc::new(StoreInner {
                name: RefCell::new(name),
                config,
                entries: RefCell::new(HashMap::new()),
                generations: Cell::new(0),
            }),
        };

        if !initial_state.is_empty() {
            store.log_debug(format!("Seeding {} initial payloads", initial_state.len()));
        }
        for raw in initial_state {
            store.update_from_raw_data(raw)?;
        }
        Ok(store)
    }

    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.inner.name.borrow_mut() = name.to_string();
    }

    /// How long an in-flight load suppresses duplicate loads.
    pub fn load_timeout(&self) -> Duration {
        self.inner.config.load_timeout
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Fetch with default options.
    pub fn fetch<K: EntityKey + ?Sized>(&self, id: &K) -> CacheEntry<E> {
        self.fetch_with(id, &FetchOptions::default())
    }

    /// Return the entry for `id`, loading it when missing or stale.
    ///
    /// Never blocks and never fails. A missing entry is created as a loading
    /// stub; an existing entry is reloaded according to
    /// [`EntryStatus::needs_load`](crate::strategy::EntryStatus::needs_load).
    /// A load hands control to the configured loader and returns
    /// immediately. When the entry is settled and no load is needed,
    /// `options.on_data` receives the cached data synchronously; an entry that
    /// is still loading is returned as-is.
    ///
    /// Without a loader, missing entries become stubs that stay loading until
    /// data is pushed in through `update` or `update_from_raw_data`.
    pub fn fetch_with<K: EntityKey + ?Sized>(
        &self,
        id: &K,
        options: &FetchOptions<E>,
    ) -> CacheEntry<E> {
        let key = id.canonical_key();
        let config = &self.inner.config;
        let existing = self.inner.entries.borrow().get(&key).cloned();

        let entry = match existing {
            None => {
                let entry = CacheEntry::stub(key.clone());
                self.inner
                    .entries
                    .borrow_mut()
                    .insert(key.clone(), entry.clone());
                config.metrics.record_miss(&self.qualified(&key));
                if config.loader.is_some() {
                    self.log_debug(format!("Creating stub and fetching entity for item {}", key));
                    self.trigger_load(&entry, &key, LoadReason::Missing, options);
                } else {
                    self.log_debug(format!("Creating stub for item {} (no loader)", key));
                }
                entry
            }
            Some(entry) => {
                let max_age = options.max_age.or(config.default_max_age);
                let reason = if config.loader.is_some() {
                    entry
                        .status()
                        .needs_load(Instant::now(), config.load_timeout, max_age)
                } else {
                    None
                };

                match reason {
                    Some(reason) => {
                        self.log_debug(format!("Refreshing item {} ({})", key, reason));
                        self.trigger_load(&entry, &key, reason, options);
                    }
                    None if entry.is_loading() => {
                        self.log_debug(format!("Load already in flight for item {}", key));
                    }
                    None => {
                        config.metrics.record_hit(&self.qualified(&key));
                        if let Some(on_data) = &options.on_data {
                            let data = entry.data();
                            on_data(data.as_ref());
                        }
                    }
                }
                entry
            }
        };

        self.log_debug(format!(
            "Returning {} entity for {} with {}",
            if entry.is_loading() { "unloaded" } else { "loaded" },
            key,
            if entry.read(|d| d.is_some()) { "data" } else { "no data" }
        ));
        entry
    }

    /// Fetch every id in order, with the same options for each.
    pub fn fetch_range<I>(&self, ids: I, options: &FetchOptions<E>) -> Vec<CacheEntry<E>>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        ids.into_iter()
            .map(|id| self.fetch_with(&id, options))
            .collect()
    }

    /// Peek at the entry for `id` without creating or loading it.
    pub fn get<K: EntityKey + ?Sized>(&self, id: &K) -> Option<CacheEntry<E>> {
        self.inner.entries.borrow().get(&id.canonical_key()).cloned()
    }

    pub fn contains<K: EntityKey + ?Sized>(&self, id: &K) -> bool {
        self.inner
            .entries
            .borrow()
            .contains_key(&id.canonical_key())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Canonical keys of all entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Soft invalidation: the data stays readable, the next fetch reloads.
    pub fn invalidate<K: EntityKey + ?Sized>(&self, id: &K) {
        let key = id.canonical_key();
        if let Some(entry) = self.get(key.as_str()) {
            self.log_debug(format!("Invalidating item {}", key));
            entry.invalidate();
        }
    }

    /// Hard invalidation of every entry.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.inner.entries.borrow_mut());
        warn!(
            "Store [{}]: CLEAR executed - {} entries discarded",
            self.name(),
            dropped.len()
        );
    }

    /// Clear the slot for `id`; the next fetch starts from a fresh stub.
    pub fn remove<K: EntityKey + ?Sized>(&self, id: &K) -> Option<CacheEntry<E>> {
        let key = id.canonical_key();
        let removed = self.inner.entries.borrow_mut().remove(&key);
        if removed.is_some() {
            self.log_debug(format!("Removed item {}", key));
        }
        removed
    }

    // ========================================================================
    // Local mutation
    // ========================================================================

    /// Create a settled entry with `item`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyConflict` if an entry already exists for `id`.
    pub fn add<K: EntityKey + ?Sized>(&self, id: &K, item: E) -> Result<CacheEntry<E>> {
        let key = id.canonical_key();
        if self.contains(key.as_str()) {
            let err = Error::KeyConflict {
                store: self.name(),
                key,
            };
            self.report(&err);
            return Err(err);
        }
        Ok(self.insert_settled(key, item))
    }

    /// Apply confirmed data, creating the entry if absent.
    pub fn update<K: EntityKey + ?Sized>(&self, id: &K, item: E) -> CacheEntry<E> {
        let key = id.canonical_key();
        match self.get(key.as_str()) {
            Some(entry) => {
                entry.update(item);
                entry
            }
            None => self.insert_settled(key, item),
        }
    }

    /// Apply a provisional change, creating the entry if absent.
    pub fn update_optimistic<K: EntityKey + ?Sized>(&self, id: &K, item: E) -> CacheEntry<E> {
        let key = id.canonical_key();
        match self.get(key.as_str()) {
            Some(entry) => {
                entry.update_optimistic(item);
                entry
            }
            None => self.insert_settled(key, item),
        }
    }

    /// Roll back the last optimistic change of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if there is no entry or no pending
    /// optimistic change.
    pub fn revert_optimistic<K: EntityKey + ?Sized>(&self, id: &K) -> Result<()> {
        let key = id.canonical_key();
        match self.get(key.as_str()) {
            Some(entry) => entry.revert_optimistic(),
            None => Err(Error::InvalidState(format!(
                "Store [{}]: no item {} to revert",
                self.name(),
                key
            ))),
        }
    }

    // ========================================================================
    // Remote data
    // ========================================================================

    /// Hand a server payload to the configured raw-data transform.
    ///
    /// # Errors
    ///
    /// - `Error::NotImplemented`: no transform is configured
    /// - whatever the transform returns
    pub fn update_from_raw_data(&self, raw: E::Raw) -> Result<()> {
        let ingest = self.require_ingest()?;
        ingest.ingest(raw, self)
    }

    /// Apply the payload of a triggered load.
    ///
    /// The payload is ingested only if the entry for `request.key()` still
    /// exists and no newer load was triggered for it since. Returns whether
    /// the payload was applied.
    ///
    /// # Errors
    ///
    /// Same as [`update_from_raw_data`](Self::update_from_raw_data).
    pub fn complete_load(&self, request: &LoadRequest, raw: E::Raw) -> Result<bool> {
        let ingest = self.require_ingest()?;
        let current = match self.get(request.key()) {
            Some(entry) => entry.generation(),
            None => {
                self.log_debug(format!(
                    "Dropping load {}: item was removed",
                    request
                ));
                return Ok(false);
            }
        };
        if current != request.generation() {
            self.inner.config.metrics.record_stale_discard(
                &self.qualified(request.key()),
                request.generation(),
                current,
            );
            self.log_debug(format!(
                "Dropping load {}: superseded by #{}",
                request, current
            ));
            return Ok(false);
        }
        ingest.ingest(raw, self)?;
        Ok(true)
    }

    /// Send an updated entity to the remote side.
    ///
    /// With `update_without_confirmation` the payload is applied locally
    /// first. The confirmed payload, if the remote returns one, is applied
    /// again on completion.
    ///
    /// # Errors
    ///
    /// - `Error::MissingCapability`: no updater configured
    /// - `Error::NotImplemented`: no raw-data transform configured
    pub fn update_remote(&self, item: E::Raw, options: &MutationOptions<E>) -> Result<()> {
        let updater = match &self.inner.config.updater {
            Some(updater) => Rc::clone(updater),
            None => return Err(self.missing(Capability::Update)),
        };
        self.require_ingest()?;

        if self.inner.config.update_without_confirmation {
            self.update_from_raw_data(item.clone())?;
        }
        let completion = MutationCompletion::new(self.clone(), options.clone(), "update");
        updater.update(item, self, completion, options);
        Ok(())
    }

    /// Send a new entity to the remote side.
    ///
    /// Mirrors [`update_remote`](Self::update_remote) with the create
    /// function and `create_without_confirmation`.
    ///
    /// # Errors
    ///
    /// - `Error::MissingCapability`: no creator configured
    /// - `Error::NotImplemented`: no raw-data transform configured
    pub fn create_remote(&self, item: E::Raw, options: &MutationOptions<E>) -> Result<()> {
        let creator = match &self.inner.config.creator {
            Some(creator) => Rc::clone(creator),
            None => return Err(self.missing(Capability::Create)),
        };
        self.require_ingest()?;

        if self.inner.config.create_without_confirmation {
            self.update_from_raw_data(item.clone())?;
        }
        let completion = MutationCompletion::new(self.clone(), options.clone(), "create");
        creator.create(item, self, completion, options);
        Ok(())
    }

    /// Delete an entity on the remote side.
    ///
    /// With `delete_without_confirmation` the entry is removed immediately,
    /// otherwise when the deleter completes.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingCapability` if no deleter is configured.
    pub fn delete_remote<K: EntityKey + ?Sized>(
        &self,
        id: &K,
        options: &MutationOptions<E>,
    ) -> Result<()> {
        let deleter = match &self.inner.config.deleter {
            Some(deleter) => Rc::clone(deleter),
            None => return Err(self.missing(Capability::Delete)),
        };
        let key = id.canonical_key();
        let unconfirmed = self.inner.config.delete_without_confirmation;

        if unconfirmed {
            self.remove(key.as_str());
        }
        let completion = DeleteCompletion::new(self.clone(), key.clone(), !unconfirmed, options.clone());
        deleter.delete(key, self, completion, options);
        Ok(())
    }

    /// Map a client entity to its server payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingCapability` if no model mapper is configured.
    pub fn to_server_model(&self, entity: &E) -> Result<E::Raw> {
        match &self.inner.config.model_mapper {
            Some(mapper) => mapper.to_server_model(entity),
            None => Err(self.missing(Capability::ToServerModel)),
        }
    }

    /// Map a server payload to the client entity.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingCapability` if no model mapper is configured.
    pub fn to_client_model(&self, raw: &E::Raw) -> Result<E> {
        match &self.inner.config.model_mapper {
            Some(mapper) => mapper.to_client_model(raw),
            None => Err(self.missing(Capability::ToClientModel)),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn trigger_load(
        &self,
        entry: &CacheEntry<E>,
        key: &str,
        reason: LoadReason,
        options: &FetchOptions<E>,
    ) {
        let Some(loader) = self.inner.config.loader.clone() else {
            return;
        };
        let generation = self.inner.generations.get() + 1;
        self.inner.generations.set(generation);
        entry.begin_load(generation, Instant::now());

        self.inner
            .config
            .metrics
            .record_load(&self.qualified(key), reason);
        loader.load(LoadRequest::new(key.to_string(), generation), self, options);
    }

    fn insert_settled(&self, key: String, item: E) -> CacheEntry<E> {
        let entry = CacheEntry::with_initial(key.clone(), item);
        self.inner
            .entries
            .borrow_mut()
            .insert(key, entry.clone());
        entry
    }

    fn require_ingest(&self) -> Result<Rc<dyn RawIngest<E>>> {
        match &self.inner.config.raw_ingest {
            Some(ingest) => Ok(Rc::clone(ingest)),
            None => {
                let err = Error::NotImplemented(format!(
                    "Store [{}]: updateFromRawData is not implemented",
                    self.name()
                ));
                self.report(&err);
                Err(err)
            }
        }
    }

    fn missing(&self, capability: Capability) -> Error {
        let err = Error::MissingCapability {
            store: self.name(),
            capability,
        };
        self.report(&err);
        err
    }

    fn report(&self, err: &Error) {
        self.inner
            .config
            .metrics
            .record_error(&self.name(), &err.to_string());
        warn!("{}", err);
    }

    fn qualified(&self, key: &str) -> String {
        qualified(&self.inner.name.borrow(), key)
    }

    fn log_debug(&self, message: String) {
        debug!("Store [{}]: {}", self.inner.name.borrow(), message);
    }
}

impl<E: CacheEntity> fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &*self.inner.name.borrow())
            .field("entries", &self.inner.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{subscriber, Change};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn ingest_by_id(raw: Value, store: &Store<Value>) -> Result<()> {
        if !raw.is_null() {
            store.update(&raw["id"], raw.clone());
        }
        Ok(())
    }

    /// Store whose loader records requests and answers nothing.
    fn recording_store() -> (Store<Value>, Rc<RefCell<Vec<LoadRequest>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&requests);
        let store = Store::new(
            StoreConfig::<Value>::new("recording")
                .with_raw_ingest_fn(ingest_by_id)
                .with_load_fn(move |request, _, _| sink.borrow_mut().push(request)),
        )
        .unwrap();
        (store, requests)
    }

    #[test]
    fn test_fetch_without_loader_returns_stub() {
        let store: Store<Value> = Store::new(StoreConfig::<Value>::new("plain")).unwrap();
        let entry = store.fetch("x");
        assert!(entry.data().is_none());
        assert!(entry.is_loading());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fetch_synchronous_loader() {
        let store = Store::new(
            StoreConfig::<Value>::new("sync")
                .with_raw_ingest_fn(ingest_by_id)
                .with_load_fn(|request, store: &Store<Value>, _| {
                    store
                        .update_from_raw_data(json!({"id": request.key(), "text": "hi"}))
                        .unwrap();
                }),
        )
        .unwrap();

        let entry = store.fetch("x");
        assert_eq!(entry.data(), Some(json!({"id": "x", "text": "hi"})));
        assert!(!entry.is_loading());
    }

    #[test]
    fn test_second_fetch_is_deduplicated() {
        let (store, requests) = recording_store();
        let first = store.fetch("a");
        let second = store.fetch("a");

        assert!(first.ptr_eq(&second));
        assert_eq!(requests.borrow().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_canonical_keys_share_entry() {
        let (store, requests) = recording_store();
        let a = store.fetch(&json!({"a": 1, "b": 2}));
        let b = store.fetch(&serde_json::from_str::<Value>(r#"{"b":2,"a":1}"#).unwrap());
        let c = store.fetch(&5u32);
        let d = store.fetch("5");

        assert!(a.ptr_eq(&b));
        assert!(c.ptr_eq(&d));
        assert_eq!(requests.borrow().len(), 2);
    }

    #[test]
    fn test_invalidate_triggers_reload() {
        let (store, requests) = recording_store();
        store.update("a", json!({"id": "a"}));

        store.fetch("a");
        assert!(requests.borrow().is_empty());

        store.invalidate("a");
        let entry = store.fetch("a");
        assert_eq!(requests.borrow().len(), 1);
        assert!(entry.is_loading());
        assert!(entry.is_invalidated());
        assert_eq!(entry.data(), Some(json!({"id": "a"})));
    }

    #[test]
    fn test_invalidate_missing_is_noop() {
        let (store, _) = recording_store();
        store.invalidate("nothing");
        assert!(store.is_empty());
    }

    #[test]
    fn test_on_data_for_fresh_entry() {
        let (store, _) = recording_store();
        store.update("a", json!({"id": "a", "v": 1}));

        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        store.fetch_with(
            "a",
            &FetchOptions::default().with_on_data(move |d| *sink.borrow_mut() = d.cloned()),
        );
        assert_eq!(*seen.borrow(), Some(json!({"id": "a", "v": 1})));
    }

    #[test]
    fn test_on_data_not_called_when_loading() {
        let (store, _) = recording_store();
        let called = Rc::new(Cell::new(false));
        let sink = Rc::clone(&called);
        let options = FetchOptions::default().with_on_data(move |_| sink.set(true));

        store.fetch_with("a", &options);
        assert!(!called.get());
    }

    #[test]
    fn test_fetch_while_loading_skips_on_data() {
        let metrics = Rc::new(RefCell::new(Vec::new()));

        struct Hits(Rc<RefCell<Vec<String>>>);

        impl crate::observability::StoreMetrics for Hits {
            fn record_hit(&self, key: &str) {
                self.0.borrow_mut().push(key.to_string());
            }
        }

        let requests = Rc::new(Cell::new(0));
        let sink = Rc::clone(&requests);
        let store: Store<Value> = Store::new(
            StoreConfig::<Value>::new("inflight")
                .with_metrics(Box::new(Hits(Rc::clone(&metrics))))
                .with_load_fn(move |_, _, _| sink.set(sink.get() + 1)),
        )
        .unwrap();

        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let options = FetchOptions::default().with_on_data(move |_| flag.set(true));

        store.fetch("a");
        let entry = store.fetch_with("a", &options);

        assert!(entry.is_loading());
        assert!(!called.get());
        assert_eq!(requests.get(), 1);
        assert!(metrics.borrow().is_empty());
    }

    #[test]
    fn test_fetch_range_preserves_order() {
        let (store, requests) = recording_store();
        store.update("b", json!({"id": "b"}));

        let entries = store.fetch_range(["c", "b", "a"], &FetchOptions::default());
        let keys: Vec<String> = entries.iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
        assert_eq!(requests.borrow().len(), 2);
    }

    #[test]
    fn test_add_conflict() {
        let (store, _) = recording_store();
        store.add("a", json!({"v": 1})).unwrap();
        let err = store.add("a", json!({"v": 2})).unwrap_err();
        assert!(matches!(err, Error::KeyConflict { ref key, .. } if key == "a"));
        assert_eq!(store.get("a").unwrap().data(), Some(json!({"v": 1})));
    }

    #[test]
    fn test_add_creates_settled_entry() {
        let (store, requests) = recording_store();
        let entry = store.add(&7u8, json!({"v": 1})).unwrap();
        assert!(!entry.is_loading());
        assert_eq!(entry.version(), 1);

        store.fetch("7");
        assert!(requests.borrow().is_empty());
    }

    #[test]
    fn test_update_reuses_entry() {
        let (store, _) = recording_store();
        let stub = store.fetch("a");
        let updated = store.update("a", json!({"v": 1}));
        assert!(stub.ptr_eq(&updated));
        assert_eq!(stub.version(), 1);
    }

    #[test]
    fn test_remove_restarts_version() {
        let (store, requests) = recording_store();
        store.update("a", json!({"v": 1}));
        store.update("a", json!({"v": 2}));
        assert_eq!(store.get("a").unwrap().version(), 2);

        assert!(store.remove("a").is_some());
        assert!(store.get("a").is_none());

        let fresh = store.fetch("a");
        assert_eq!(fresh.version(), 0);
        assert!(fresh.data().is_none());
        assert_eq!(requests.borrow().len(), 1);
    }

    #[test]
    fn test_clear_discards_everything() {
        let (store, _) = recording_store();
        store.update("a", json!({}));
        store.update("b", json!({}));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_from_raw_data_not_implemented() {
        let store: Store<Value> = Store::new(StoreConfig::<Value>::new("bare")).unwrap();
        let err = store.update_from_raw_data(json!({"id": 1})).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn test_initial_state_seeded() {
        let store = Store::new(
            StoreConfig::<Value>::new("seeded")
                .with_raw_ingest_fn(ingest_by_id)
                .with_initial_state(vec![json!({"id": 5, "text": "seed"})]),
        )
        .unwrap();
        let entry = store.get(&5u32).unwrap();
        assert_eq!(entry.data(), Some(json!({"id": 5, "text": "seed"})));
    }

    #[test]
    fn test_initial_state_requires_ingest() {
        let result = Store::new(StoreConfig::<Value>::new("seeded").with_initial_state(vec![json!({})]));
        assert!(matches!(result, Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_complete_load_applies_current_generation() {
        let (store, requests) = recording_store();
        store.fetch("a");
        let request = requests.borrow()[0].clone();

        assert!(store
            .complete_load(&request, json!({"id": "a", "v": 1}))
            .unwrap());
        assert_eq!(store.get("a").unwrap().data(), Some(json!({"id": "a", "v": 1})));
    }

    #[test]
    fn test_complete_load_discards_superseded_generation() {
        let (store, requests) = recording_store();
        store.update("a", json!({"id": "a", "v": 0}));
        store.invalidate("a");
        store.fetch("a");
        let first = requests.borrow()[0].clone();

        // A second load is triggered by a new invalidation after data arrived.
        store.complete_load(&first, json!({"id": "a", "v": 1})).unwrap();
        store.invalidate("a");
        store.fetch("a");
        let second = requests.borrow()[1].clone();

        assert!(!store.complete_load(&first, json!({"id": "a", "v": 99})).unwrap());
        assert_eq!(store.get("a").unwrap().data(), Some(json!({"id": "a", "v": 1})));

        assert!(store.complete_load(&second, json!({"id": "a", "v": 2})).unwrap());
        assert_eq!(store.get("a").unwrap().data(), Some(json!({"id": "a", "v": 2})));
    }

    #[test]
    fn test_complete_load_after_remove_is_dropped() {
        let (store, requests) = recording_store();
        store.fetch("a");
        let request = requests.borrow()[0].clone();
        store.remove("a");
        assert!(!store.complete_load(&request, json!({"id": "a"})).unwrap());
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_generations_unique_across_recreated_entries() {
        let (store, requests) = recording_store();
        store.fetch("a");
        store.remove("a");
        store.fetch("a");
        let reqs = requests.borrow();
        assert_ne!(reqs[0].generation(), reqs[1].generation());
        assert!(!store.complete_load(&reqs[0], json!({"id": "a"})).unwrap());
    }

    #[test]
    fn test_optimistic_and_revert_via_store() {
        let (store, _) = recording_store();
        store.update("a", json!({"v": 1}));
        let transitions = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&transitions);
        let entry = store.get("a").unwrap();
        let _sub = entry.subscribe(subscriber(move |c: &Change<'_, Value>| {
            sink.borrow_mut().push((c.old.cloned(), c.new.cloned()));
        }));

        store.update_optimistic("a", json!({"v": 2}));
        store.revert_optimistic("a").unwrap();

        assert_eq!(store.get("a").unwrap().data(), Some(json!({"v": 1})));
        assert_eq!(
            *transitions.borrow(),
            vec![
                (Some(json!({"v": 1})), Some(json!({"v": 2}))),
                (Some(json!({"v": 2})), Some(json!({"v": 1}))),
            ]
        );
    }

    #[test]
    fn test_update_optimistic_creates_missing_entry() {
        let (store, _) = recording_store();
        let entry = store.update_optimistic("new", json!({"v": 1}));
        assert_eq!(entry.version(), 1);
        assert!(store.revert_optimistic("missing").is_err());
    }

    #[test]
    fn test_missing_capabilities() {
        let store: Store<Value> = Store::new(StoreConfig::<Value>::new("bare")).unwrap();
        let options = MutationOptions::default();

        assert!(matches!(
            store.update_remote(json!({}), &options),
            Err(Error::MissingCapability {
                capability: Capability::Update,
                ..
            })
        ));
        assert!(matches!(
            store.create_remote(json!({}), &options),
            Err(Error::MissingCapability {
                capability: Capability::Create,
                ..
            })
        ));
        assert!(matches!(
            store.delete_remote("a", &options),
            Err(Error::MissingCapability {
                capability: Capability::Delete,
                ..
            })
        ));
        assert!(matches!(
            store.to_server_model(&json!({})),
            Err(Error::MissingCapability {
                capability: Capability::ToServerModel,
                ..
            })
        ));
    }

    #[test]
    fn test_update_remote_requires_ingest_up_front() {
        let store: Store<Value> =
            Store::new(StoreConfig::<Value>::new("no-ingest").with_update_fn(|_, _, _, _| {})).unwrap();
        assert!(matches!(
            store.update_remote(json!({}), &MutationOptions::default()),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_custom_load_timeout() {
        let requests = Rc::new(Cell::new(0));
        let sink = Rc::clone(&requests);
        let store: Store<Value> = Store::new(
            StoreConfig::<Value>::new("fast")
                .with_load_timeout(Duration::ZERO)
                .with_load_fn(move |_, _, _| sink.set(sink.get() + 1)),
        )
        .unwrap();

        store.fetch("a");
        store.fetch("a");
        assert_eq!(requests.get(), 2);
        assert_eq!(store.load_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_keys_sorted() {
        let (store, _) = recording_store();
        store.update("b", json!({}));
        store.update("a", json!({}));
        assert_eq!(store.keys(), vec!["a", "b"]);
        assert!(store.contains("a"));
        assert!(!store.contains("c"));
    }
}
