//! Store configuration.
//!
//! A store is configured once, at construction. Remote functions are
//! optional capabilities; the confirmation flags decide whether mutations are
//! applied locally before the remote side answers.
//!
//! # Example
//!
//! ```
//! use entity_store::StoreConfig;
//! use std::time::Duration;
//!
//! let config = StoreConfig::<serde_json::Value>::new("users")
//!     .update_without_confirmation(true)
//!     .with_load_timeout(Duration::from_secs(10))
//!     .with_default_max_age(Duration::from_secs(300));
//! assert_eq!(config.name(), Some("users"));
//! ```

use crate::entity::CacheEntity;
use crate::error::{Capability, Result};
use crate::observability::{NoOpMetrics, StoreMetrics};
use crate::options::{FetchOptions, MutationOptions};
use crate::remote::{
    Creator, DeleteCompletion, Deleter, LoadRequest, Loader, ModelMapper, MutationCompletion,
    RawIngest, Updater,
};
use crate::store::Store;
use crate::strategy::DEFAULT_LOAD_TIMEOUT;
use std::rc::Rc;
use std::time::Duration;

/// Configuration for a [`Store`].
pub struct StoreConfig<E: CacheEntity> {
    pub(crate) name: Option<String>,
    pub(crate) loader: Option<Rc<dyn Loader<E>>>,
    pub(crate) creator: Option<Rc<dyn Creator<E>>>,
    pub(crate) updater: Option<Rc<dyn Updater<E>>>,
    pub(crate) deleter: Option<Rc<dyn Deleter<E>>>,
    pub(crate) raw_ingest: Option<Rc<dyn RawIngest<E>>>,
    pub(crate) model_mapper: Option<Rc<dyn ModelMapper<E>>>,
    pub(crate) update_without_confirmation: bool,
    pub(crate) create_without_confirmation: bool,
    pub(crate) delete_without_confirmation: bool,
    pub(crate) initial_state: Vec<E::Raw>,
    pub(crate) load_timeout: Duration,
    pub(crate) default_max_age: Option<Duration>,
    pub(crate) metrics: Box<dyn StoreMetrics>,
}

impl<E: CacheEntity> Default for StoreConfig<E> {
    /// Unnamed configuration; a registry assigns the name on registration.
    fn default() -> Self {
        StoreConfig {
            name: None,
            loader: None,
            creator: None,
            updater: None,
            deleter: None,
            raw_ingest: None,
            model_mapper: None,
            update_without_confirmation: false,
            create_without_confirmation: false,
            delete_without_confirmation: false,
            initial_state: Vec::new(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            default_max_age: None,
            metrics: Box::new(NoOpMetrics),
        }
    }
}

impl<E: CacheEntity> StoreConfig<E> {
    pub fn new(name: impl Into<String>) -> Self {
        StoreConfig {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the given capability is configured.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Load => self.loader.is_some(),
            Capability::Create => self.creator.is_some(),
            Capability::Update => self.updater.is_some(),
            Capability::Delete => self.deleter.is_some(),
            Capability::ToServerModel | Capability::ToClientModel => {
                self.model_mapper.is_some()
            }
        }
    }

    pub fn with_loader(mut self, loader: impl Loader<E> + 'static) -> Self {
        self.loader = Some(Rc::new(loader));
        self
    }

    /// Closure form of [`with_loader`](Self::with_loader).
    pub fn with_load_fn<F>(self, f: F) -> Self
    where
        F: Fn(LoadRequest, &Store<E>, &FetchOptions<E>) + 'static,
    {
        self.with_loader(f)
    }

    pub fn with_creator(mut self, creator: impl Creator<E> + 'static) -> Self {
        self.creator = Some(Rc::new(creator));
        self
    }

    pub fn with_create_fn<F>(self, f: F) -> Self
    where
        F: Fn(E::Raw, &Store<E>, MutationCompletion<E>, &MutationOptions<E>) + 'static,
    {
        self.with_creator(f)
    }

    pub fn with_updater(mut self, updater: impl Updater<E> + 'static) -> Self {
        self.updater = Some(Rc::new(updater));
        self
    }

    pub fn with_update_fn<F>(self, f: F) -> Self
    where
        F: Fn(E::Raw, &Store<E>, MutationCompletion<E>, &MutationOptions<E>) + 'static,
    {
        self.with_updater(f)
    }

    pub fn with_deleter(mut self, deleter: impl Deleter<E> + 'static) -> Self {
        self.deleter = Some(Rc::new(deleter));
        self
    }

    pub fn with_delete_fn<F>(self, f: F) -> Self
    where
        F: Fn(String, &Store<E>, DeleteCompletion<E>, &MutationOptions<E>) + 'static,
    {
        self.with_deleter(f)
    }

    pub fn with_raw_ingest(mut self, ingest: impl RawIngest<E> + 'static) -> Self {
        self.raw_ingest = Some(Rc::new(ingest));
        self
    }

    pub fn with_raw_ingest_fn<F>(self, f: F) -> Self
    where
        F: Fn(E::Raw, &Store<E>) -> Result<()> + 'static,
    {
        self.with_raw_ingest(f)
    }

    pub fn with_model_mapper(mut self, mapper: impl ModelMapper<E> + 'static) -> Self {
        self.model_mapper = Some(Rc::new(mapper));
        self
    }

    /// Apply `update_remote` payloads locally before the remote call resolves.
    pub fn update_without_confirmation(mut self, enabled: bool) -> Self {
        self.update_without_confirmation = enabled;
        self
    }

    /// Apply `create_remote` payloads locally before the remote call resolves.
    pub fn create_without_confirmation(mut self, enabled: bool) -> Self {
        self.create_without_confirmation = enabled;
        self
    }

    /// Remove entries on `delete_remote` before the remote call resolves.
    pub fn delete_without_confirmation(mut self, enabled: bool) -> Self {
        self.delete_without_confirmation = enabled;
        self
    }

    /// Raw payloads ingested when the store is constructed.
    pub fn with_initial_state(mut self, payloads: impl IntoIterator<Item = E::Raw>) -> Self {
        self.initial_state.extend(payloads);
        self
    }

    /// How long an in-flight load suppresses duplicate loads.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Max age applied to fetches that do not pass their own.
    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = Some(max_age);
        self
    }

    pub fn with_metrics(mut self, metrics: Box<dyn StoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_default_config() {
        let config: StoreConfig<Value> = StoreConfig::default();
        assert_eq!(config.name(), None);
        assert_eq!(config.load_timeout, DEFAULT_LOAD_TIMEOUT);
        assert!(config.default_max_age.is_none());
        assert!(!config.has(Capability::Load));
        assert!(!config.update_without_confirmation);
    }

    #[test]
    fn test_builder_sets_capabilities() {
        let config = StoreConfig::<Value>::new("notes")
            .with_load_fn(|_, _, _| {})
            .with_delete_fn(|_, _, done, _| done.complete())
            .with_raw_ingest_fn(|_, _| Ok(()))
            .delete_without_confirmation(true)
            .with_initial_state(vec![Value::Null, Value::Bool(true)]);

        assert_eq!(config.name(), Some("notes"));
        assert!(config.has(Capability::Load));
        assert!(config.has(Capability::Delete));
        assert!(!config.has(Capability::Update));
        assert!(!config.has(Capability::Create));
        assert!(!config.has(Capability::ToServerModel));
        assert!(config.raw_ingest.is_some());
        assert!(config.delete_without_confirmation);
        assert_eq!(config.initial_state.len(), 2);
    }

    #[test]
    fn test_timeouts() {
        let config = StoreConfig::<Value>::new("notes")
            .with_load_timeout(Duration::from_secs(1))
            .with_default_max_age(Duration::from_secs(60));
        assert_eq!(config.load_timeout, Duration::from_secs(1));
        assert_eq!(config.default_max_age, Some(Duration::from_secs(60)));
    }
}
