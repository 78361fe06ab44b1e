//! Canonical key derivation for entity identifiers.
//!
//! Every store operation canonicalizes its id to a string before touching the
//! entry map, so structurally-equal identifiers collapse onto one entry.
//! Primitive ids map to their plain textual form; composite ids map to a
//! deterministic JSON rendering.

use crate::error::Result;
use serde::Serialize;

/// Identifier that can be turned into a canonical store key.
///
/// # Example
///
/// ```
/// use entity_store::key::{structural_key, EntityKey};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct SeatId {
///     flight: String,
///     seat: u32,
/// }
///
/// impl EntityKey for SeatId {
///     fn canonical_key(&self) -> String {
///         structural_key(self).unwrap_or_else(|_| format!("{}/{}", self.flight, self.seat))
///     }
/// }
///
/// let id = SeatId { flight: "BA117".into(), seat: 12 };
/// assert_eq!(id.canonical_key(), r#"{"flight":"BA117","seat":12}"#);
/// ```
pub trait EntityKey {
    /// Return the canonical string form of this identifier.
    fn canonical_key(&self) -> String;
}

impl EntityKey for str {
    fn canonical_key(&self) -> String {
        self.to_string()
    }
}

impl EntityKey for String {
    fn canonical_key(&self) -> String {
        self.clone()
    }
}

impl<K: EntityKey + ?Sized> EntityKey for &K {
    fn canonical_key(&self) -> String {
        (**self).canonical_key()
    }
}

macro_rules! display_key {
    ($($t:ty),*) => {
        $(
            impl EntityKey for $t {
                fn canonical_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char);

/// JSON ids: strings and numbers keep their plain form so `"5"`, `5` and
/// `json!(5)` address the same entry; arrays and objects are rendered
/// structurally with sorted object keys.
impl EntityKey for serde_json::Value {
    fn canonical_key(&self) -> String {
        match self {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => other.to_string(),
        }
    }
}

/// Render any serializable id as deterministic JSON.
///
/// The value is routed through `serde_json::Value`, whose object maps are
/// ordered by key, so two ids that differ only in map insertion order yield
/// the same key.
///
/// # Errors
///
/// Returns `Err` if the value cannot be represented as JSON
/// (e.g. a map with non-string keys).
pub fn structural_key<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(value.to_string())
}

/// Build a namespaced key for logging and metrics.
pub fn qualified(store: &str, key: &str) -> String {
    format!("{}:{}", store, key)
}
