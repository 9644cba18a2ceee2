//! Failed-attempt tracking and temporary lockout for staff PIN entry.
//!
//! Lockout state is keyed per client and stored as JSON in the counter store
//! with a retention TTL that outlives the lockout window itself, so a client
//! cannot shed its failure history by waiting out a single lock. Once
//! `locked_until` is set it blocks every attempt until it elapses; a failure
//! after expiry continues counting from the persisted total rather than
//! starting over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::ports::{CounterStore, CounterStoreError};
use crate::domain::Error;

/// How long lockout state is retained, independent of the lockout window.
const RETENTION_TTL: Duration = Duration::from_secs(3600);

/// Threshold and window for one lockout scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock.
    pub max_attempts: u32,
    /// How long a triggered lock lasts.
    pub lockout_window: Duration,
}

/// Policy applied to staff PIN attempts.
pub const STAFF_PIN_LOCKOUT: LockoutPolicy = LockoutPolicy {
    max_attempts: 5,
    lockout_window: Duration::from_secs(15 * 60),
};

/// Persisted failure counters for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockoutState {
    /// Failures recorded inside the retention window.
    pub failed_attempts: u32,
    /// Until when attempts are rejected outright.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub locked_until: Option<DateTime<Utc>>,
    /// When the most recent failure happened.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_failed_at: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// Attempts left before a lock fires.
    pub fn attempts_remaining(&self, policy: &LockoutPolicy) -> u32 {
        policy.max_attempts.saturating_sub(self.failed_attempts)
    }

    /// Constant-shape failure payload disclosed to clients.
    ///
    /// Always carries the counters and the lock deadline so UIs can render a
    /// countdown; never discloses why a credential was wrong.
    pub fn failure_details(&self, policy: &LockoutPolicy) -> serde_json::Value {
        json!({
            "failedAttempts": self.failed_attempts,
            "attemptsRemaining": self.attempts_remaining(policy),
            "lockedUntil": self.locked_until.map(|at| at.timestamp_millis()),
        })
    }
}

/// Result of a lockout check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutCheck {
    /// Whether attempts are currently rejected.
    pub locked: bool,
    /// The persisted state backing the decision.
    pub state: LockoutState,
}

fn lockout_key(client_key: &str) -> String {
    format!("staff-pin:lockout:{client_key}")
}

fn map_counter_error(error: CounterStoreError) -> Error {
    match error {
        CounterStoreError::Connection { message } => {
            Error::service_unavailable(format!("lockout store unavailable: {message}"))
        }
        CounterStoreError::Request { status, message } => {
            Error::internal(format!("lockout store request failed ({status}): {message}"))
        }
    }
}

/// Lockout guard over the counter store.
#[derive(Clone)]
pub struct LockoutGuard<C> {
    counters: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C> LockoutGuard<C> {
    /// Create a guard over the given counter store.
    pub fn new(counters: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }
}

impl<C> LockoutGuard<C>
where
    C: CounterStore,
{
    async fn load_state(&self, client_key: &str) -> Result<LockoutState, Error> {
        let raw = self
            .counters
            .get(&lockout_key(client_key))
            .await
            .map_err(map_counter_error)?;
        // Unparsable state reads as fresh, matching the limiter's lenient
        // counter parsing.
        Ok(raw
            .and_then(|value| serde_json::from_str(&value).ok())
            .unwrap_or_default())
    }

    async fn store_state(&self, client_key: &str, state: &LockoutState) -> Result<(), Error> {
        let encoded = serde_json::to_string(state)
            .map_err(|error| Error::internal(format!("failed to encode lockout state: {error}")))?;
        self.counters
            .put(&lockout_key(client_key), &encoded, RETENTION_TTL)
            .await
            .map_err(map_counter_error)
    }

    /// Report whether attempts from `client_key` are currently rejected.
    ///
    /// Pure read; never mutates the stored state.
    pub async fn check(&self, client_key: &str) -> Result<LockoutCheck, Error> {
        let state = self.load_state(client_key).await?;
        let locked = state
            .locked_until
            .is_some_and(|until| until > self.clock.utc());
        Ok(LockoutCheck { locked, state })
    }

    /// Record one failed attempt, locking when the threshold is reached.
    pub async fn record_failure(
        &self,
        client_key: &str,
        policy: &LockoutPolicy,
    ) -> Result<LockoutState, Error> {
        let now = self.clock.utc();
        let mut state = self.load_state(client_key).await?;
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        state.last_failed_at = Some(now);

        let lock_elapsed = state.locked_until.is_none_or(|until| until <= now);
        if lock_elapsed && state.failed_attempts >= policy.max_attempts {
            let window = chrono::Duration::from_std(policy.lockout_window)
                .unwrap_or_else(|_| chrono::Duration::minutes(15));
            state.locked_until = Some(now + window);
        }

        self.store_state(client_key, &state).await?;
        Ok(state)
    }

    /// Clear all recorded state after a successful authentication.
    pub async fn record_success(&self, client_key: &str) -> Result<(), Error> {
        self.counters
            .delete(&lockout_key(client_key))
            .await
            .map_err(map_counter_error)
    }
}
