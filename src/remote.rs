//! Remote capability traits.
//!
//! The store never talks to a network itself. It hands control to
//! caller-supplied functions through the narrow traits below and is called
//! back later, at an arbitrary turn of the scheduler, through the handles
//! passed along ([`LoadRequest`], [`MutationCompletion`], [`DeleteCompletion`]).
//!
//! Each capability is optional. An operation that needs one the store was not
//! configured with fails with `Error::MissingCapability` at the call site.
//!
//! Every trait has a blanket impl for closures of the matching shape, so a
//! plain closure can be configured wherever a capability is expected.
//!
//! # Example
//!
//! ```
//! use entity_store::{Store, StoreConfig};
//! use serde_json::{json, Value};
//!
//! let config = StoreConfig::<Value>::new("notes")
//!     .with_raw_ingest_fn(|raw, store| {
//!         store.update(&raw["id"], raw.clone());
//!         Ok(())
//!     })
//!     .with_load_fn(|request, store, _options| {
//!         // A real loader would start a request here and call
//!         // `store.complete_load(&request, payload)` once it resolves.
//!         let payload = json!({"id": request.key(), "text": "hi"});
//!         store.complete_load(&request, payload).ok();
//!     });
//!
//! let store = Store::new(config).unwrap();
//! assert_eq!(store.fetch("x").data(), Some(json!({"id": "x", "text": "hi"})));
//! ```

use crate::entity::CacheEntity;
use crate::error::Result;
use crate::options::{FetchOptions, MutationOptions};
use crate::store::Store;
use std::fmt;
use std::future::Future;

/// Ticket identifying one triggered load.
///
/// Hand it back to [`Store::complete_load`] with the payload. A ticket whose
/// generation has been superseded by a newer load of the same key is
/// discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    key: String,
    generation: u64,
}

impl LoadRequest {
    pub(crate) fn new(key: String, generation: u64) -> Self {
        LoadRequest { key, generation }
    }

    /// Canonical key of the entity to load.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.generation)
    }
}

/// Starts loading one entity.
///
/// Fire-and-forget: the store does not wait for anything. The implementation
/// is expected to eventually call back into the store, typically through
/// [`Store::complete_load`] or [`Store::update_from_raw_data`].
pub trait Loader<E: CacheEntity> {
    fn load(&self, request: LoadRequest, store: &Store<E>, options: &FetchOptions<E>);
}

impl<E, F> Loader<E> for F
where
    E: CacheEntity,
    F: Fn(LoadRequest, &Store<E>, &FetchOptions<E>),
{
    fn load(&self, request: LoadRequest, store: &Store<E>, options: &FetchOptions<E>) {
        self(request, store, options)
    }
}

/// Turns a raw server payload into one or more store updates.
pub trait RawIngest<E: CacheEntity> {
    /// # Errors
    ///
    /// Propagates whatever the store calls made by the transform return
    /// (e.g. `Error::KeyConflict` from `Store::add`).
    fn ingest(&self, raw: E::Raw, store: &Store<E>) -> Result<()>;
}

impl<E, F> RawIngest<E> for F
where
    E: CacheEntity,
    F: Fn(E::Raw, &Store<E>) -> Result<()>,
{
    fn ingest(&self, raw: E::Raw, store: &Store<E>) -> Result<()> {
        self(raw, store)
    }
}

/// Sends a new entity to the remote side.
pub trait Creator<E: CacheEntity> {
    fn create(
        &self,
        item: E::Raw,
        store: &Store<E>,
        on_complete: MutationCompletion<E>,
        options: &MutationOptions<E>,
    );
}

impl<E, F> Creator<E> for F
where
    E: CacheEntity,
    F: Fn(E::Raw, &Store<E>, MutationCompletion<E>, &MutationOptions<E>),
{
    fn create(
        &self,
        item: E::Raw,
        store: &Store<E>,
        on_complete: MutationCompletion<E>,
        options: &MutationOptions<E>,
    ) {
        self(item, store, on_complete, options)
    }
}

/// Sends a modified entity to the remote side.
pub trait Updater<E: CacheEntity> {
    fn update(
        &self,
        item: E::Raw,
        store: &Store<E>,
        on_complete: MutationCompletion<E>,
        options: &MutationOptions<E>,
    );
}

impl<E, F> Updater<E> for F
where
    E: CacheEntity,
    F: Fn(E::Raw, &Store<E>, MutationCompletion<E>, &MutationOptions<E>),
{
    fn update(
        &self,
        item: E::Raw,
        store: &Store<E>,
        on_complete: MutationCompletion<E>,
        options: &MutationOptions<E>,
    ) {
        self(item, store, on_complete, options)
    }
}

/// Deletes an entity on the remote side.
pub trait Deleter<E: CacheEntity> {
    fn delete(
        &self,
        key: String,
        store: &Store<E>,
        on_complete: DeleteCompletion<E>,
        options: &MutationOptions<E>,
    );
}

impl<E, F> Deleter<E> for F
where
    E: CacheEntity,
    F: Fn(String, &Store<E>, DeleteCompletion<E>, &MutationOptions<E>),
{
    fn delete(
        &self,
        key: String,
        store: &Store<E>,
        on_complete: DeleteCompletion<E>,
        options: &MutationOptions<E>,
    ) {
        self(key, store, on_complete, options)
    }
}

/// Converts between the client model and the server payload.
pub trait ModelMapper<E: CacheEntity> {
    fn to_server_model(&self, entity: &E) -> Result<E::Raw>;
    fn to_client_model(&self, raw: &E::Raw) -> Result<E>;
}

/// One-shot completion handle for `create_remote` / `update_remote`.
///
/// Consumed by [`complete`](Self::complete); dropping it without completing
/// leaves the store untouched.
pub struct MutationCompletion<E: CacheEntity> {
    store: Store<E>,
    options: MutationOptions<E>,
    operation: &'static str,
}

impl<E: CacheEntity> MutationCompletion<E> {
    pub(crate) fn new(store: Store<E>, options: MutationOptions<E>, operation: &'static str) -> Self {
        MutationCompletion {
            store,
            options,
            operation,
        }
    }

    /// Signal that the remote call finished.
    ///
    /// A confirmed payload is applied through the raw-data transform before
    /// the caller's `on_complete` runs.
    ///
    /// # Errors
    ///
    /// Returns the transform's error; `on_complete` is not called then.
    pub fn complete(self, payload: Option<E::Raw>) -> Result<()> {
        debug!(
            "Store [{}]: remote {} completed ({})",
            self.store.name(),
            self.operation,
            if payload.is_some() { "confirmed" } else { "no payload" }
        );
        if let Some(raw) = &payload {
            self.store.update_from_raw_data(raw.clone())?;
        }
        if let Some(on_complete) = &self.options.on_complete {
            on_complete(payload.as_ref());
        }
        Ok(())
    }
}

/// One-shot completion handle for `delete_remote`.
pub struct DeleteCompletion<E: CacheEntity> {
    store: Store<E>,
    key: String,
    remove_on_complete: bool,
    options: MutationOptions<E>,
}

impl<E: CacheEntity> DeleteCompletion<E> {
    pub(crate) fn new(
        store: Store<E>,
        key: String,
        remove_on_complete: bool,
        options: MutationOptions<E>,
    ) -> Self {
        DeleteCompletion {
            store,
            key,
            remove_on_complete,
            options,
        }
    }

    /// Signal that the remote delete finished.
    pub fn complete(self) {
        if self.remove_on_complete {
            self.store.remove(self.key.as_str());
        }
        debug!(
            "Store [{}]: remote delete of {} completed",
            self.store.name(),
            self.key
        );
        if let Some(on_complete) = &self.options.on_complete {
            on_complete(None);
        }
    }
}

/// Drive a future-based load on the current `LocalSet`.
///
/// The future's payload is routed through [`Store::complete_load`], so a
/// result that was overtaken by a newer load of the same key is dropped.
/// A failed load is logged and leaves the entry loading; the next fetch after
/// the load timeout triggers it again.
///
/// Must be called from within a `tokio::task::LocalSet`.
pub fn spawn_load<E, Fut>(
    store: &Store<E>,
    request: LoadRequest,
    future: Fut,
) -> tokio::task::JoinHandle<()>
where
    E: CacheEntity,
    Fut: Future<Output = Result<E::Raw>> + 'static,
{
    let store = store.clone();
    tokio::task::spawn_local(async move {
        match future.await {
            Ok(raw) => {
                if let Err(e) = store.complete_load(&request, raw) {
                    warn!("Store [{}]: applying load {} failed: {}", store.name(), request, e);
                }
            }
            Err(e) => {
                warn!("Store [{}]: load {} failed: {}", store.name(), request, e);
            }
        }
    })
}
