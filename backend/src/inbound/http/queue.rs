//! Messaging queue endpoints for trusted callers.
//!
//! Both routes sit behind the staff token gate; the scheduler and booking
//! pipeline authenticate the same way staff dashboards do.

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::queue::{
    BookingConfirmedPayload, ProcessOutcome, RequestResolvedPayload, BOOKING_CONFIRMED_EVENT,
};
use crate::domain::ports::QueueEvent;
use crate::domain::Error;

use super::staff::require_staff;
use super::state::HttpState;
use super::ApiResult;

/// Request body for enqueueing a notification event.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueBody {
    /// Event discriminator.
    pub event_type: String,
    /// Event-type-specific payload.
    pub payload: Value,
}

/// Request body for processing one queued event.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessBody {
    /// Event to process.
    pub event_id: String,
}

fn parse_event(body: EnqueueBody) -> Result<QueueEvent, Error> {
    match body.event_type.as_str() {
        BOOKING_CONFIRMED_EVENT => {
            let payload: BookingConfirmedPayload = serde_json::from_value(body.payload)
                .map_err(|error| {
                    Error::invalid_request(format!("Invalid booking.confirmed payload: {error}"))
                })?;
            Ok(QueueEvent::BookingConfirmed(payload))
        }
        "request.resolved" => {
            let payload: RequestResolvedPayload = serde_json::from_value(body.payload)
                .map_err(|error| {
                    Error::invalid_request(format!("Invalid request.resolved payload: {error}"))
                })?;
            Ok(QueueEvent::RequestResolved(payload))
        }
        other => Err(Error::invalid_request(format!(
            "Unknown event type '{other}'"
        ))),
    }
}

/// Enqueue a notification event.
#[utoipa::path(
    post,
    path = "/api/queue/events",
    request_body = EnqueueBody,
    responses(
        (status = 202, description = "Event stored (or an existing deduplicated record)"),
        (status = 400, description = "Unknown event type or invalid payload"),
        (status = 401, description = "Missing or invalid staff token"),
        (status = 403, description = "Staff access disabled or role missing")
    ),
    tags = ["queue"],
    operation_id = "enqueueMessagingEvent"
)]
#[post("/api/queue/events")]
pub async fn enqueue_event(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<EnqueueBody>,
) -> ApiResult<HttpResponse> {
    let _staff = require_staff(&state, &req).await?;
    let event = parse_event(body.into_inner())?;
    let record = state.queue.enqueue(event).await?;
    Ok(HttpResponse::Accepted().json(record))
}

/// Run the dispatch state machine for one event id.
#[utoipa::path(
    post,
    path = "/api/queue/process",
    request_body = ProcessBody,
    responses(
        (status = 200, description = "Processing outcome", body = ProcessOutcome),
        (status = 400, description = "Missing event id"),
        (status = 401, description = "Missing or invalid staff token"),
        (status = 403, description = "Staff access disabled or role missing")
    ),
    tags = ["queue"],
    operation_id = "processMessagingEvent"
)]
#[post("/api/queue/process")]
pub async fn process_event(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<ProcessBody>,
) -> ApiResult<web::Json<ProcessOutcome>> {
    let _staff = require_staff(&state, &req).await?;
    let body = body.into_inner();
    let event_id = body.event_id.trim();
    if event_id.is_empty() {
        return Err(Error::invalid_request("Event id is required"));
    }
    let outcome = state.queue.process(event_id).await?;
    Ok(web::Json(outcome))
}
