//! Inbound HTTP adapter: handlers, DTOs, and error mapping.

pub mod direct_messages;
pub mod error;
pub mod guest_sessions;
pub mod headers;
pub mod health;
pub mod prime_requests;
pub mod queue;
pub mod staff;
pub mod state;
pub mod telemetry;

pub use error::ApiResult;
pub use state::HttpState;
