//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    DirectMessageCommand, GuestSessionCommand, GuestSessionQuery, PinAuthenticator,
    PrimeRequestCommand, QueueProcessing, StaffAccessGate, TelemetryReporting,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Session minting after booking lookup.
    pub sessions: Arc<dyn GuestSessionCommand>,
    /// Session token validation.
    pub sessions_query: Arc<dyn GuestSessionQuery>,
    /// Staff PIN authentication.
    pub pin_auth: Arc<dyn PinAuthenticator>,
    /// Staff token gate for protected routes.
    pub staff_gate: Arc<dyn StaffAccessGate>,
    /// Guest operational requests.
    pub requests: Arc<dyn PrimeRequestCommand>,
    /// Guest direct messages.
    pub direct_messages: Arc<dyn DirectMessageCommand>,
    /// Messaging queue creation and processing.
    pub queue: Arc<dyn QueueProcessing>,
    /// Telemetry reporting.
    pub telemetry: Arc<dyn TelemetryReporting>,
}
