//! Core entity trait that all cached entities must implement.

/// Trait that all entities held by a [`Store`](crate::Store) must implement.
///
/// Change detection uses `PartialEq` as the deep-equality primitive, so derive
/// it structurally rather than comparing ids.
///
/// # Example
///
/// ```
/// use entity_store::CacheEntity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// pub struct Employment {
///     pub id: String,
///     pub employer_name: String,
/// }
///
/// impl CacheEntity for Employment {
///     type Raw = serde_json::Value;
/// }
/// ```
pub trait CacheEntity: Clone + PartialEq + 'static {
    /// Payload type as delivered by the remote side.
    ///
    /// Raw payloads are turned into cache updates by the store's
    /// [`RawIngest`](crate::remote::RawIngest) transform. Use `Self` when the
    /// server already speaks the client model. Payloads are cloned when an
    /// unconfirmed mutation is applied locally and also sent to the remote.
    type Raw: Clone + 'static;
}

impl CacheEntity for serde_json::Value {
    type Raw = serde_json::Value;
}
