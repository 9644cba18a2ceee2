//! Staff authentication endpoint and gate helper.

use actix_web::{post, web, HttpRequest};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::ports::{PinLoginRequest, PinLoginResponse, StaffIdentity};
use crate::domain::Error;

use super::headers::{client_key, gate_request_from};
use super::state::HttpState;
use super::ApiResult;

/// Run the staff token gate for the current request.
///
/// Handlers for staff-only routes call this before touching any state.
pub(crate) async fn require_staff(
    state: &HttpState,
    req: &HttpRequest,
) -> Result<StaffIdentity, Error> {
    state.staff_gate.authorize(gate_request_from(req)).await
}

/// Request body for a PIN login.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PinLoginBody {
    /// The staff PIN.
    pub pin: String,
}

/// Exchange the staff PIN for a signed identity token.
#[utoipa::path(
    post,
    path = "/api/staff/login",
    request_body = PinLoginBody,
    responses(
        (status = 200, description = "Signed staff token", body = PinLoginResponse),
        (status = 400, description = "Empty PIN"),
        (status = 401, description = "Wrong PIN"),
        (status = 429, description = "Locked out after repeated failures"),
        (status = 503, description = "PIN hash or signer not configured")
    ),
    tags = ["staff"],
    operation_id = "staffPinLogin"
)]
#[post("/api/staff/login")]
pub async fn staff_login(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<PinLoginBody>,
) -> ApiResult<web::Json<PinLoginResponse>> {
    let response = state
        .pin_auth
        .authenticate(PinLoginRequest {
            pin: body.into_inner().pin,
            client_key: client_key(&req),
        })
        .await?;
    Ok(web::Json(response))
}
