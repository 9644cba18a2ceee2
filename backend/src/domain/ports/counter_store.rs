//! Port abstraction for the expiring counter store.
//!
//! A flat key/value namespace with per-entry TTLs, backing fixed-window rate
//! limit counters, dedupe entries, staff lockout state, and day-bucketed
//! telemetry counters. Values are opaque strings; callers own the encoding.

use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;

use super::define_port_error;

define_port_error! {
    /// Errors raised by counter store adapters.
    pub enum CounterStoreError {
        /// The store could not be reached.
        Connection { message: String } => "counter store connection failed: {message}",
        /// The store rejected the request.
        Request { status: u16, message: String } => "counter store request failed ({status}): {message}",
    }
}

/// Port for the expiring counter store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the value stored at `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CounterStoreError>;

    /// Store `value` at `key` with the given time-to-live.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CounterStoreError>;

    /// Remove the value at `key`.
    async fn delete(&self, key: &str) -> Result<(), CounterStoreError>;
}

type Entry = (String, chrono::DateTime<chrono::Utc>);

/// In-memory implementation honouring TTLs against an injected clock.
///
/// Used by tests in place of the REST adapter; expiry is evaluated lazily on
/// read so a fixed test clock observes deterministic behaviour.
pub struct MemoryCounterStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, Entry>>,
    clock: std::sync::Arc<dyn Clock>,
}

impl MemoryCounterStore {
    /// Create an empty store reading time from the system clock.
    pub fn new() -> Self {
        Self::with_clock(std::sync::Arc::new(mockable::DefaultClock))
    }

    /// Create an empty store reading time from the supplied clock.
    pub fn with_clock(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CounterStoreError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = self.clock.utc();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CounterStoreError> {
        let expires_at = self.clock.utc()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), (value.to_owned(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CounterStoreError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
