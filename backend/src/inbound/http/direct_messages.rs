//! Guest direct-message endpoints.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::direct_message::DirectMessage;
use crate::domain::ports::{ListDirectMessagesRequest, SendDirectMessageRequest};

use super::headers::{header_string, GUEST_BOOKING_HEADER, GUEST_TOKEN_HEADER};
use super::state::HttpState;
use super::ApiResult;

/// Request body for a direct-message write.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendDirectMessageBody {
    /// Booking both guests belong to.
    pub booking_id: String,
    /// Recipient guest uuid.
    pub peer_uuid: String,
    /// Deterministic pair channel id.
    pub channel_id: String,
    /// Message body.
    pub content: String,
}

/// Acknowledgement for a stored message.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendDirectMessageResponse {
    /// Always `true` on 200.
    pub success: bool,
    /// Stored message id.
    pub message_id: String,
    /// Write instant, epoch milliseconds.
    pub created_at: i64,
}

/// Query parameters for an inbox read.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    /// Channel to read.
    pub channel_id: String,
}

/// Response body for an inbox read.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListMessagesResponse {
    /// Messages in chronological order.
    pub messages: Vec<DirectMessage>,
}

/// Send a direct message to another guest on the same booking.
#[utoipa::path(
    post,
    path = "/api/direct-message",
    request_body = SendDirectMessageBody,
    responses(
        (status = 200, description = "Message stored", body = SendDirectMessageResponse),
        (status = 400, description = "Missing token or invalid content"),
        (status = 403, description = "Booking, channel, or membership check failed"),
        (status = 429, description = "Write quota exceeded")
    ),
    tags = ["direct-messages"],
    operation_id = "sendDirectMessage"
)]
#[post("/api/direct-message")]
pub async fn send_direct_message(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<SendDirectMessageBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let receipt = state
        .direct_messages
        .send(SendDirectMessageRequest {
            token: header_string(&req, GUEST_TOKEN_HEADER),
            claimed_booking_id: header_string(&req, GUEST_BOOKING_HEADER),
            booking_id: body.booking_id,
            peer_uuid: body.peer_uuid,
            channel_id: body.channel_id,
            content: body.content,
        })
        .await?;
    Ok(HttpResponse::Ok().json(SendDirectMessageResponse {
        success: true,
        message_id: receipt.message_id,
        created_at: receipt.created_at,
    }))
}

/// Read a direct-message channel.
#[utoipa::path(
    get,
    path = "/api/direct-message",
    params(ListMessagesQuery),
    responses(
        (status = 200, description = "Channel messages", body = ListMessagesResponse),
        (status = 403, description = "Not a member of the channel"),
        (status = 404, description = "Unknown channel"),
        (status = 429, description = "Read quota exceeded")
    ),
    tags = ["direct-messages"],
    operation_id = "listDirectMessages"
)]
#[get("/api/direct-message")]
pub async fn list_direct_messages(
    state: web::Data<HttpState>,
    req: HttpRequest,
    query: web::Query<ListMessagesQuery>,
) -> ApiResult<web::Json<ListMessagesResponse>> {
    let messages = state
        .direct_messages
        .list(ListDirectMessagesRequest {
            token: header_string(&req, GUEST_TOKEN_HEADER),
            claimed_booking_id: header_string(&req, GUEST_BOOKING_HEADER),
            channel_id: query.into_inner().channel_id,
        })
        .await?;
    Ok(web::Json(ListMessagesResponse { messages }))
}
