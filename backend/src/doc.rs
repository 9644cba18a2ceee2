//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] aggregate used by Swagger UI in debug builds and
//! exported for external tooling. Registers every portal endpoint and the
//! wire-visible schemas.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the staff bearer security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "StaffBearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

/// OpenAPI document for the guest-portal REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Prime guest-portal backend API",
        description = "Guest sessions, operational requests, direct messages, \
                       staff authentication, and the messaging queue."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::guest_sessions::issue_session,
        crate::inbound::http::guest_sessions::current_session,
        crate::inbound::http::direct_messages::send_direct_message,
        crate::inbound::http::direct_messages::list_direct_messages,
        crate::inbound::http::prime_requests::submit_request,
        crate::inbound::http::prime_requests::update_request_status,
        crate::inbound::http::staff::staff_login,
        crate::inbound::http::telemetry::direct_telemetry,
        crate::inbound::http::queue::enqueue_event,
        crate::inbound::http::queue::process_event,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        crate::domain::error::Error,
        crate::domain::error::ErrorCode,
        crate::domain::session::GuestSession,
        crate::domain::direct_message::DirectMessage,
        crate::domain::requests::PrimeRequestRecord,
        crate::domain::requests::PrimeRequestType,
        crate::domain::requests::PrimeRequestStatus,
        crate::domain::queue::MessagingQueueRecord,
        crate::domain::queue::QueueStatus,
        crate::domain::queue::ProcessOutcome,
        crate::domain::queue::BookingConfirmedPayload,
        crate::domain::queue::RequestResolvedPayload,
        crate::domain::telemetry::TelemetryReport,
        crate::domain::staff_role::StaffRole,
        crate::domain::ports::PinLoginResponse,
        crate::inbound::http::guest_sessions::IssueSessionBody,
        crate::inbound::http::guest_sessions::IssuedSessionBody,
        crate::inbound::http::direct_messages::SendDirectMessageBody,
        crate::inbound::http::direct_messages::SendDirectMessageResponse,
        crate::inbound::http::direct_messages::ListMessagesResponse,
        crate::inbound::http::prime_requests::SubmitRequestBody,
        crate::inbound::http::prime_requests::SubmitRequestResponse,
        crate::inbound::http::prime_requests::UpdateStatusBody,
        crate::inbound::http::staff::PinLoginBody,
        crate::inbound::http::queue::EnqueueBody,
        crate::inbound::http::queue::ProcessBody,
    )),
    tags(
        (name = "sessions", description = "Guest session issue and validation"),
        (name = "direct-messages", description = "Guest-to-guest messaging"),
        (name = "requests", description = "Operational request records"),
        (name = "staff", description = "Staff authentication and reporting"),
        (name = "queue", description = "Messaging queue operations"),
        (name = "health", description = "Health probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_registers_every_portal_path() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for expected in [
            "/api/guest-session",
            "/api/direct-message",
            "/api/requests/{kind}",
            "/api/requests/{request_id}/status",
            "/api/staff/login",
            "/api/direct-telemetry",
            "/api/queue/events",
            "/api/queue/process",
            "/health/ready",
            "/health/live",
        ] {
            assert!(paths.contains_key(expected), "missing path {expected}");
        }
    }

    #[test]
    fn error_schema_is_registered() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        assert!(schemas.keys().any(|name| name.contains("Error")));
    }
}
