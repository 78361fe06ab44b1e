//! Staleness decision logic for fetch operations.
//!
//! `Store::fetch` asks one question of an existing entry: does it need to go
//! back to the remote source? The answer is an explicit [`LoadReason`] rather
//! than a boolean so it can be logged and fed to metrics.
//!
//! # Decision Table
//!
//! | Entry state | Result |
//! |-------------|--------|
//! | loading, load started less than `timeout` ago | `None` (de-duplicated) |
//! | loading, load started `timeout` or more ago | `TimedOut` |
//! | invalidated | `Invalidated` |
//! | `max_age` given and last update older than it | `Expired` |
//! | otherwise | `None` |
//!
//! `Missing` is never produced here; it is the reason recorded when the store
//! creates a stub for an unknown key.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// How long an in-flight load suppresses duplicate loads.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a load was triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadReason {
    /// No entry existed; a stub was created.
    Missing,
    /// The previous load is older than the load timeout.
    TimedOut,
    /// The entry was soft-invalidated.
    Invalidated,
    /// The data is older than the caller's `max_age`.
    Expired,
}

impl fmt::Display for LoadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadReason::Missing => write!(f, "Missing"),
            LoadReason::TimedOut => write!(f, "TimedOut"),
            LoadReason::Invalidated => write!(f, "Invalidated"),
            LoadReason::Expired => write!(f, "Expired"),
        }
    }
}

/// Point-in-time view of the staleness flags of an entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntryStatus {
    pub loading: bool,
    pub fetch_timestamp: Option<Instant>,
    pub invalidated: bool,
    pub age: Option<Instant>,
}

impl EntryStatus {
    /// Decide whether the entry must be reloaded at `now`.
    pub fn needs_load(
        &self,
        now: Instant,
        timeout: Duration,
        max_age: Option<Duration>,
    ) -> Option<LoadReason> {
        if self.loading {
            return match self.fetch_timestamp {
                Some(started) if now.saturating_duration_since(started) < timeout => None,
                _ => Some(LoadReason::TimedOut),
            };
        }

        if self.invalidated {
            return Some(LoadReason::Invalidated);
        }

        match (max_age, self.age) {
            (Some(max_age), Some(age)) if now.saturating_duration_since(age) > max_age => {
                Some(LoadReason::Expired)
            }
            _ => None,
        }
    }
}
