//! # entity-store
//!
//! A client-side entity cache with staleness control and change notification.
//!
//! UI code asks a [`Store`] for entities by id and gets a [`CacheEntry`] back
//! immediately. The store decides whether the entry must be (re)loaded from
//! the remote source, suppresses duplicate loads while one is in flight,
//! applies and reverts optimistic local mutations, and notifies subscribers
//! with change detection.
//!
//! ## Features
//!
//! - **Never blocks:** `fetch` returns a stub right away and loads in the background
//! - **Load de-duplication:** one in-flight load per entry, re-triggered after a timeout
//! - **Staleness control:** soft invalidation, hard clear, per-fetch `max_age`
//! - **Stale-result protection:** load generations drop results overtaken by a newer load
//! - **Optimistic updates:** provisional changes with revert
//! - **Capability-checked remotes:** missing remote functions fail at the call site
//!
//! ## Quick Start
//!
//! ```
//! use entity_store::{subscription::subscriber, Registry, Store, StoreConfig};
//! use serde_json::{json, Value};
//!
//! // 1. Configure how payloads become cache updates and how to load
//! let config = StoreConfig::<Value>::new("notes")
//!     .with_raw_ingest_fn(|raw, store| {
//!         store.update(&raw["id"], raw.clone());
//!         Ok(())
//!     })
//!     .with_load_fn(|request, store, _options| {
//!         // Usually: start a request, keep `store.clone()` and call
//!         // `complete_load` when it resolves.
//!         let payload = json!({"id": request.key(), "text": "hello"});
//!         store.complete_load(&request, payload).ok();
//!     });
//!
//! // 2. Create and register the store
//! let mut registry = Registry::new();
//! registry.register("notes", Store::new(config).unwrap()).unwrap();
//! let notes = registry.get::<Value>("notes").unwrap();
//!
//! // 3. Fetch and subscribe
//! let entry = notes.fetch("1");
//! let _subscription = entry.subscribe(subscriber(|change| {
//!     println!("note changed: {:?}", change.new);
//! }));
//! assert_eq!(entry.data(), Some(json!({"id": "1", "text": "hello"})));
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod entity;
pub mod entry;
pub mod error;
pub mod key;
pub mod observability;
pub mod options;
pub mod registry;
pub mod remote;
pub mod store;
pub mod strategy;
pub mod subscription;

// Re-exports for convenience
pub use config::StoreConfig;
pub use entity::CacheEntity;
pub use entry::CacheEntry;
pub use error::{Capability, Error, Result};
pub use key::EntityKey;
pub use options::{FetchOptions, MutationOptions};
pub use registry::Registry;
pub use store::Store;
pub use strategy::LoadReason;
pub use subscription::{Change, ChangeKind, Subscriber, Subscription};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
