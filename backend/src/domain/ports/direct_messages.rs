//! Driving port for guest direct messages.

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::direct_message::DirectMessage;
use crate::domain::Error;

/// A direct-message write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDirectMessageRequest {
    /// Guest session token.
    pub token: Option<String>,
    /// Booking id claimed in the request headers.
    pub claimed_booking_id: Option<String>,
    /// Booking id claimed in the request body.
    pub booking_id: String,
    /// Recipient guest uuid.
    pub peer_uuid: String,
    /// Channel the client believes it is writing to; must match the
    /// deterministic pair id.
    pub channel_id: String,
    /// Message body.
    pub content: String,
}

/// Acknowledgement of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageReceipt {
    /// Stored message id.
    pub message_id: String,
    /// Write instant, epoch milliseconds.
    pub created_at: i64,
}

/// A direct-message inbox read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDirectMessagesRequest {
    /// Guest session token.
    pub token: Option<String>,
    /// Booking id claimed in the request headers.
    pub claimed_booking_id: Option<String>,
    /// Channel to read.
    pub channel_id: String,
}

/// Port for direct-message writes and reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectMessageCommand: Send + Sync {
    /// Validate, rate-limit, and store one message.
    async fn send(&self, request: SendDirectMessageRequest)
        -> Result<DirectMessageReceipt, Error>;

    /// Read a channel's messages in chronological order.
    async fn list(&self, request: ListDirectMessagesRequest)
        -> Result<Vec<DirectMessage>, Error>;
}
