//! Domain types and services of the guest-portal request backbone.
//!
//! Everything in this module is transport agnostic. Services are generic
//! over the port traits in [`ports`] and receive collaborators as `Arc`s;
//! wall-clock access goes through `mockable::Clock` so tests can inject
//! fixed time. Inbound adapters map the [`Error`] payload to HTTP.

pub mod direct_message;
pub mod error;
pub mod lockout;
pub mod pin_auth;
pub mod ports;
pub mod queue;
pub mod rate_limit;
pub mod requests;
pub mod session;
pub mod staff_gate;
pub mod staff_role;
pub mod staff_token;
pub mod telemetry;

pub use self::error::{Error, ErrorCode};
pub use self::ports::{CounterStore, RecordStore};
pub use self::session::GuestSession;
pub use self::staff_role::StaffRole;

/// Convenient result alias for fallible domain operations.
pub type ApiResult<T> = Result<T, Error>;
