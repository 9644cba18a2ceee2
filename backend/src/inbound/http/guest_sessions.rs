//! Guest session endpoints.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::IssueSessionRequest;
use crate::domain::GuestSession;

use super::headers::{client_key, header_string, GUEST_TOKEN_HEADER};
use super::state::HttpState;
use super::ApiResult;

/// Request body for minting a session after a booking lookup.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueSessionBody {
    /// Booking to scope the session to.
    pub booking_id: String,
    /// Guest identity resolved by the lookup, when known.
    pub guest_uuid: Option<String>,
    /// Checkout date (`YYYY-MM-DD`) driving the session expiry.
    pub checkout_date: Option<String>,
}

/// Response body carrying the minted token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSessionBody {
    /// Opaque bearer token for subsequent portal calls.
    pub token: String,
    /// The stored session.
    pub session: GuestSession,
}

/// Mint a guest session for a verified booking.
#[utoipa::path(
    post,
    path = "/api/guest-session",
    request_body = IssueSessionBody,
    responses(
        (status = 201, description = "Session minted", body = IssuedSessionBody),
        (status = 400, description = "Missing booking id"),
        (status = 403, description = "Guest not part of the booking"),
        (status = 404, description = "Unknown booking"),
        (status = 429, description = "Lookup quota exceeded")
    ),
    tags = ["sessions"],
    operation_id = "issueGuestSession"
)]
#[post("/api/guest-session")]
pub async fn issue_session(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<IssueSessionBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let issued = state
        .sessions
        .issue(IssueSessionRequest {
            booking_id: body.booking_id,
            guest_uuid: body.guest_uuid,
            checkout_date: body.checkout_date,
            client_key: client_key(&req),
        })
        .await?;
    Ok(HttpResponse::Created().json(IssuedSessionBody {
        token: issued.token,
        session: issued.session,
    }))
}

/// Validate the presented session token and return its session.
#[utoipa::path(
    get,
    path = "/api/guest-session",
    responses(
        (status = 200, description = "Live session", body = GuestSession),
        (status = 400, description = "Missing session token"),
        (status = 404, description = "Unknown session token"),
        (status = 410, description = "Session expired")
    ),
    tags = ["sessions"],
    operation_id = "currentGuestSession"
)]
#[get("/api/guest-session")]
pub async fn current_session(
    state: web::Data<HttpState>,
    req: HttpRequest,
) -> ApiResult<web::Json<GuestSession>> {
    let token = header_string(&req, GUEST_TOKEN_HEADER);
    let session = state.sessions_query.validate(token.as_deref()).await?;
    Ok(web::Json(session))
}
