//! Guest operational request endpoints.

use actix_web::{patch, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::ports::{SubmitOutcome, SubmitPrimeRequest, UpdateStatusRequest};
use crate::domain::requests::{PrimeRequestRecord, PrimeRequestStatus, PrimeRequestType};
use crate::domain::Error;

use super::headers::{header_string, GUEST_BOOKING_HEADER, GUEST_TOKEN_HEADER};
use super::staff::require_staff;
use super::state::HttpState;
use super::ApiResult;

fn parse_kind(slug: &str) -> Option<PrimeRequestType> {
    match slug {
        "extension" => Some(PrimeRequestType::Extension),
        "bag-drop" => Some(PrimeRequestType::BagDrop),
        "meal-change" => Some(PrimeRequestType::MealChangeException),
        _ => None,
    }
}

/// Request body for a guest submission.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestBody {
    /// Free-form note from the guest.
    pub note: Option<String>,
    /// Kind-specific fields (e.g. `requestedCheckoutDate`, `bags`).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Map<String, Value>,
}

/// Response body for a submission.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestResponse {
    /// Whether an earlier equivalent submission was replayed.
    pub deduplicated: bool,
    /// Id of the stored (or replayed) request.
    pub request_id: String,
    /// The stored record; absent on replays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<PrimeRequestRecord>,
}

/// Request body for a staff decision.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusBody {
    /// New lifecycle state.
    pub status: PrimeRequestStatus,
    /// Optional staff note recorded with the decision.
    pub resolution: Option<String>,
}

/// Submit an operational request (`extension`, `bag-drop`, `meal-change`).
#[utoipa::path(
    post,
    path = "/api/requests/{kind}",
    request_body = SubmitRequestBody,
    params(("kind" = String, Path, description = "Request kind slug")),
    responses(
        (status = 201, description = "Request stored", body = SubmitRequestResponse),
        (status = 200, description = "Duplicate submission replayed", body = SubmitRequestResponse),
        (status = 400, description = "Unknown kind or invalid payload"),
        (status = 403, description = "Session/booking checks failed"),
        (status = 409, description = "Policy conflict"),
        (status = 429, description = "Request quota exceeded")
    ),
    tags = ["requests"],
    operation_id = "submitPrimeRequest"
)]
#[post("/api/requests/{kind}")]
pub async fn submit_request(
    state: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SubmitRequestBody>,
) -> ApiResult<HttpResponse> {
    let kind = parse_kind(&path.into_inner())
        .ok_or_else(|| Error::invalid_request("Unknown request kind"))?;
    let body = body.into_inner();

    let outcome = state
        .requests
        .submit(SubmitPrimeRequest {
            token: header_string(&req, GUEST_TOKEN_HEADER),
            claimed_booking_id: header_string(&req, GUEST_BOOKING_HEADER),
            request_type: kind,
            note: body.note,
            payload: body.payload,
        })
        .await?;

    Ok(match outcome {
        SubmitOutcome::Created { record } => HttpResponse::Created().json(SubmitRequestResponse {
            deduplicated: false,
            request_id: record.request_id.clone(),
            request: Some(record),
        }),
        SubmitOutcome::Deduplicated { request_id } => {
            HttpResponse::Ok().json(SubmitRequestResponse {
                deduplicated: true,
                request_id,
                request: None,
            })
        }
    })
}

/// Record a staff decision on a request.
#[utoipa::path(
    patch,
    path = "/api/requests/{request_id}/status",
    request_body = UpdateStatusBody,
    params(("request_id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Updated record", body = PrimeRequestRecord),
        (status = 401, description = "Missing or invalid staff token"),
        (status = 403, description = "Staff access disabled or role missing"),
        (status = 404, description = "Unknown request id"),
        (status = 409, description = "Illegal status transition")
    ),
    tags = ["requests"],
    operation_id = "updatePrimeRequestStatus"
)]
#[patch("/api/requests/{request_id}/status")]
pub async fn update_request_status(
    state: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateStatusBody>,
) -> ApiResult<web::Json<PrimeRequestRecord>> {
    let _staff = require_staff(&state, &req).await?;
    let body = body.into_inner();

    let record = state
        .requests
        .update_status(UpdateStatusRequest {
            request_id: path.into_inner(),
            new_status: body.status,
            resolution: body.resolution,
        })
        .await?;
    Ok(web::Json(record))
}
