//! Registry of named stores.
//!
//! An explicit object rather than process-wide state: create one, hand it to
//! the code that needs store lookup, and tear it down with
//! [`purge_all`](Registry::purge_all).
//!
//! Stores of different entity types live side by side; typed handles are
//! recovered with [`Registry::get`].

use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::store::Store;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Minimal contract a registered store satisfies.
///
/// Having a fetch operation is guaranteed by the type: only [`Store`]
/// implements this trait.
pub trait RegisteredStore {
    fn store_name(&self) -> String;

    /// Give the store `name` if it was built without one.
    fn adopt_name(&self, name: &str);

    fn entry_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

impl<E: CacheEntity> RegisteredStore for Store<E> {
    fn store_name(&self) -> String {
        self.name()
    }

    fn adopt_name(&self, name: &str) {
        if self.name().is_empty() {
            self.set_name(name);
        }
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Name to store mapping.
///
/// # Example
///
/// ```
/// use entity_store::{Registry, Store, StoreConfig};
/// use serde_json::Value;
///
/// let mut registry = Registry::new();
/// let store: Store<Value> = Store::new(StoreConfig::default()).unwrap();
/// registry.register("notes", store).unwrap();
///
/// let notes = registry.get::<Value>("notes").unwrap();
/// assert_eq!(notes.name(), "notes");
/// assert!(registry.register("notes", notes).is_err());
/// ```
#[derive(Default)]
pub struct Registry {
    stores: BTreeMap<String, Box<dyn RegisteredStore>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            stores: BTreeMap::new(),
        }
    }

    /// Register `store` under `name`.
    ///
    /// An unnamed store takes `name` as its own name.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateStore` if `name` is already registered.
    pub fn register<S>(&mut self, name: &str, store: S) -> Result<()>
    where
        S: RegisteredStore + 'static,
    {
        if self.stores.contains_key(name) {
            warn!("store with name {} already registered", name);
            return Err(Error::DuplicateStore(name.to_string()));
        }
        store.adopt_name(name);
        debug!(
            "Registered store {} ({} entries)",
            name,
            store.entry_count()
        );
        self.stores.insert(name.to_string(), Box::new(store));
        Ok(())
    }

    /// Typed handle to the store registered under `name`.
    ///
    /// Returns `None` if nothing is registered under `name` or the store
    /// holds a different entity type.
    pub fn get<E: CacheEntity>(&self, name: &str) -> Option<Store<E>> {
        self.stores
            .get(name)
            .and_then(|store| store.as_any().downcast_ref::<Store<E>>())
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Remove one registration.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.stores.remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Drop every registration.
    pub fn purge_all(&mut self) {
        let count = self.stores.len();
        self.stores.clear();
        warn!("Registry PURGE_ALL executed - {} stores dropped", count);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("stores", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::Value;

    #[derive(Clone, Debug, PartialEq)]
    struct Product {
        sku: String,
    }

    impl CacheEntity for Product {
        type Raw = Product;
    }

    fn value_store(name: Option<&str>) -> Store<Value> {
        let config = match name {
            Some(name) => StoreConfig::<Value>::new(name),
            None => StoreConfig::<Value>::default(),
        };
        Store::new(config).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = Registry::new();
        let store = value_store(Some("users"));
        registry.register("users", store.clone()).unwrap();

        let found = registry.get::<Value>("users").unwrap();
        assert!(found.ptr_eq(&store));
        assert!(registry.contains("users"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = Registry::new();
        registry.register("users", value_store(None)).unwrap();
        let err = registry.register("users", value_store(None)).unwrap_err();
        assert_eq!(err, Error::DuplicateStore("users".to_string()));
    }

    #[test]
    fn test_unnamed_store_adopts_name() {
        let mut registry = Registry::new();
        let store = value_store(None);
        registry.register("dummy", store.clone()).unwrap();
        assert_eq!(store.name(), "dummy");
    }

    #[test]
    fn test_named_store_keeps_name() {
        let mut registry = Registry::new();
        let store = value_store(Some("people"));
        registry.register("users", store.clone()).unwrap();
        assert_eq!(store.name(), "people");
    }

    #[test]
    fn test_get_wrong_type_is_none() {
        let mut registry = Registry::new();
        registry.register("users", value_store(None)).unwrap();
        let products: Store<Product> = Store::new(StoreConfig::default()).unwrap();
        registry.register("products", products).unwrap();

        assert!(registry.get::<Product>("users").is_none());
        assert!(registry.get::<Product>("products").is_some());
        assert!(registry.get::<Value>("missing").is_none());
        assert_eq!(registry.names(), vec!["products", "users"]);
    }

    #[test]
    fn test_purge_all() {
        let mut registry = Registry::new();
        registry.register("a", value_store(None)).unwrap();
        registry.register("b", value_store(None)).unwrap();
        registry.purge_all();
        assert!(registry.is_empty());
        registry.register("a", value_store(None)).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = Registry::new();
        registry.register("a", value_store(None)).unwrap();
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
    }
}
