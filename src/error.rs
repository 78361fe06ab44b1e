//! Error types for the entity store.

use std::fmt;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Optional capability a store may be configured with.
///
/// Used to report which piece of configuration an operation needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Load,
    Create,
    Update,
    Delete,
    ToServerModel,
    ToClientModel,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Load => write!(f, "load"),
            Capability::Create => write!(f, "create"),
            Capability::Update => write!(f, "update"),
            Capability::Delete => write!(f, "delete"),
            Capability::ToServerModel => write!(f, "to_server_model"),
            Capability::ToClientModel => write!(f, "to_client_model"),
        }
    }
}

/// Error types for the entity store.
///
/// All configuration-shape errors are raised synchronously at the call that
/// needed the missing piece; none are deferred to a remote completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An entry already exists for this key.
    ///
    /// Raised by `Store::add`. Use `Store::update` (or the entry's `update`)
    /// to replace the data of an existing entry.
    KeyConflict {
        /// Name of the store that rejected the add
        store: String,
        /// Canonical key that was already present
        key: String,
    },

    /// The operation requires a remote function the store was not configured with.
    ///
    /// Common causes:
    /// - `update_remote` without an updater
    /// - `create_remote` without a creator
    /// - `delete_remote` without a deleter
    MissingCapability {
        /// Name of the store
        store: String,
        /// The capability that was needed
        capability: Capability,
    },

    /// No raw-data transform is configured.
    ///
    /// Every path that ingests a server payload (`update_from_raw_data`,
    /// `complete_load`, initial state, remote mutations) needs one.
    NotImplemented(String),

    /// Operation called in a state it does not support.
    ///
    /// Raised when reverting an optimistic update that was never applied.
    InvalidState(String),

    /// A store with this name is already registered.
    DuplicateStore(String),

    /// Generic error with custom message.
    ///
    /// Typically raised by user supplied transforms.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyConflict { store, key } => write!(
                f,
                "Store [{}]: KeyConflict: an item with id {} already exists, use update to replace it",
                store, key
            ),
            Error::MissingCapability { store, capability } => write!(
                f,
                "Store [{}]: missing capability: no {} function configured",
                store, capability
            ),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::DuplicateStore(name) => {
                write!(f, "store with name {} already registered", name)
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
