//! Per-call options for fetch and remote mutations.
//!
//! These are the per-operation counterpart of [`StoreConfig`](crate::StoreConfig):
//! the store configuration is fixed at construction, options only affect one call.

use crate::entity::CacheEntity;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Callback receiving the current data of a fresh entry.
pub type DataCallback<E> = Rc<dyn Fn(Option<&E>)>;

/// Callback invoked once a remote mutation completed.
///
/// Receives the payload the remote side confirmed with, if any.
pub type CompleteCallback<R> = Rc<dyn Fn(Option<&R>)>;

/// Options for `Store::fetch` and `Store::fetch_range`.
///
/// # Example
///
/// ```
/// use entity_store::FetchOptions;
/// use std::time::Duration;
///
/// let options: FetchOptions<serde_json::Value> = FetchOptions::default()
///     .with_max_age(Duration::from_secs(30))
///     .with_on_data(|data| println!("cached: {:?}", data));
/// assert_eq!(options.max_age, Some(Duration::from_secs(30)));
/// ```
pub struct FetchOptions<E: CacheEntity> {
    /// Called synchronously with the cached data when the entry is settled and
    /// no load is needed.
    pub on_data: Option<DataCallback<E>>,

    /// Reload when the last confirmed update is older than this.
    ///
    /// # Precedence
    ///
    /// - **If `Some(duration)`**: used for this call
    /// - **If `None`**: falls back to the store's default max age, if configured
    pub max_age: Option<Duration>,
}

impl<E: CacheEntity> FetchOptions<E> {
    /// Set the maximum acceptable age for this fetch.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Deliver cached data to `f` when the entry is fresh.
    pub fn with_on_data<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&E>) + 'static,
    {
        self.on_data = Some(Rc::new(f));
        self
    }
}

impl<E: CacheEntity> Default for FetchOptions<E> {
    fn default() -> Self {
        FetchOptions {
            on_data: None,
            max_age: None,
        }
    }
}

impl<E: CacheEntity> Clone for FetchOptions<E> {
    fn clone(&self) -> Self {
        FetchOptions {
            on_data: self.on_data.clone(),
            max_age: self.max_age,
        }
    }
}

impl<E: CacheEntity> fmt::Debug for FetchOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("on_data", &self.on_data.is_some())
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Options for `create_remote`, `update_remote` and `delete_remote`.
pub struct MutationOptions<E: CacheEntity> {
    /// Called after the remote side signalled completion and the confirmed
    /// payload (if any) was applied.
    pub on_complete: Option<CompleteCallback<E::Raw>>,
}

impl<E: CacheEntity> MutationOptions<E> {
    pub fn with_on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&E::Raw>) + 'static,
    {
        self.on_complete = Some(Rc::new(f));
        self
    }
}

impl<E: CacheEntity> Default for MutationOptions<E> {
    fn default() -> Self {
        MutationOptions { on_complete: None }
    }
}

impl<E: CacheEntity> Clone for MutationOptions<E> {
    fn clone(&self) -> Self {
        MutationOptions {
            on_complete: self.on_complete.clone(),
        }
    }
}

impl<E: CacheEntity> fmt::Debug for MutationOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationOptions")
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
