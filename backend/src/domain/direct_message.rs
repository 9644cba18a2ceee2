//! Guest-to-guest direct messages within one booking.
//!
//! Channels are deterministic pairs (`dm_<a>_<b>` with the member uuids in
//! lexical order), so a client cannot mint arbitrary channel names. Both
//! members must be confirmed guests of the booking and have chat enabled on
//! their profiles. Writes and reads are rate limited per guest and feed the
//! day-bucketed telemetry counters.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::domain::ports::{
    CounterStore, DirectMessageCommand, DirectMessageReceipt, ListDirectMessagesRequest,
    RecordStore, SendDirectMessageRequest, TelemetryMetric, TelemetryRecorder,
};
use crate::domain::rate_limit::{quotas, RateLimitDecision, RateLimiter};
use crate::domain::session::{ensure_booking_scope, load_session, map_record_store_error};
use crate::domain::telemetry::record_best_effort;
use crate::domain::Error;

/// Longest accepted message body.
const MAX_CONTENT_CHARS: usize = 2000;

/// One stored direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    /// Message id within the channel.
    pub id: String,
    /// Message body.
    pub content: String,
    /// Sending guest's uuid.
    pub sender_id: String,
    /// Sender kind; always `guest` for portal-written messages.
    pub sender_role: String,
    /// Sender display name snapshot.
    pub sender_name: String,
    /// Write instant, epoch milliseconds.
    pub created_at: i64,
}

/// Deterministic channel id for a pair of guests.
pub fn direct_channel_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("dm_{a}_{b}")
    } else {
        format!("dm_{b}_{a}")
    }
}

fn channel_meta_path(channel_id: &str) -> String {
    format!("messaging/channels/{channel_id}/meta")
}

fn message_path(channel_id: &str, message_id: &str) -> String {
    format!("messaging/channels/{channel_id}/messages/{message_id}")
}

fn generate_message_id(now_millis: i64) -> String {
    let millis = u64::try_from(now_millis).unwrap_or(0);
    let mut value = millis;
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut encoded = Vec::new();
    loop {
        let digit = usize::try_from(value % 36).unwrap_or(0);
        encoded.push(DIGITS[digit]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    encoded.reverse();
    let time_part = String::from_utf8(encoded).unwrap_or_default();

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| char::from(DIGITS[rng.gen_range(0..DIGITS.len())]))
        .collect();
    format!("msg_{time_part}_{suffix}")
}

/// The profile fields gating chat participation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileChatGate {
    chat_opt_in: bool,
    blocked_users: Vec<String>,
}

/// Direct message service.
pub struct DirectMessageService<S, C> {
    records: Arc<S>,
    limiter: RateLimiter<C>,
    telemetry: Arc<dyn TelemetryRecorder>,
    clock: Arc<dyn Clock>,
}

impl<S, C> DirectMessageService<S, C> {
    /// Create the service.
    pub fn new(
        records: Arc<S>,
        limiter: RateLimiter<C>,
        telemetry: Arc<dyn TelemetryRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            limiter,
            telemetry,
            clock,
        }
    }
}

impl<S, C> DirectMessageService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn profile_gate(&self, guest_uuid: &str) -> Result<ProfileChatGate, Error> {
        let profile = self
            .records
            .get(&format!("guestProfiles/{guest_uuid}"))
            .await
            .map_err(map_record_store_error)?;
        Ok(profile
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default())
    }

    async fn confirmed_guest_name(
        &self,
        booking_id: &str,
        guest_uuid: &str,
    ) -> Result<Option<String>, Error> {
        let guest = self
            .records
            .get(&format!("bookings/{booking_id}/{guest_uuid}"))
            .await
            .map_err(map_record_store_error)?;
        Ok(guest.map(|value| {
            value
                .get("firstName")
                .and_then(Value::as_str)
                .unwrap_or("Guest")
                .to_owned()
        }))
    }
}

#[async_trait]
impl<S, C> DirectMessageCommand for DirectMessageService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn send(&self, request: SendDirectMessageRequest) -> Result<DirectMessageReceipt, Error> {
        let now = self.clock.utc();
        let session = load_session(self.records.as_ref(), request.token.as_deref(), now).await?;
        ensure_booking_scope(&session, request.claimed_booking_id.as_deref())?;
        if request.booking_id != session.booking_id {
            return Err(Error::forbidden("Booking does not match session"));
        }

        let sender_uuid = session
            .guest_uuid
            .clone()
            .ok_or_else(|| Error::forbidden("Guest identity required"))?;

        let content = request.content.trim();
        if content.is_empty() {
            return Err(Error::invalid_request("Message content is required"));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(Error::invalid_request("Message content is too long"));
        }

        let expected_channel = direct_channel_id(&sender_uuid, &request.peer_uuid);
        if request.channel_id != expected_channel {
            return Err(Error::forbidden("Channel does not match participants"));
        }

        let key = format!("direct-message:write:{sender_uuid}");
        if let RateLimitDecision::Blocked(block) = self
            .limiter
            .enforce(&key, quotas::DIRECT_MESSAGE_WRITE, Some(TelemetryMetric::WriteRateLimited))
            .await
        {
            return Err(block.to_error());
        }

        let sender_name = self
            .confirmed_guest_name(&session.booking_id, &sender_uuid)
            .await?;
        let peer_name = self
            .confirmed_guest_name(&session.booking_id, &request.peer_uuid)
            .await?;
        let (Some(sender_name), Some(_)) = (sender_name, peer_name) else {
            record_best_effort(
                self.telemetry.as_ref(),
                TelemetryMetric::WriteDeniedNotConfirmedGuests,
            )
            .await;
            return Err(Error::forbidden(
                "Both guests must be confirmed on this booking",
            ));
        };

        let sender_gate = self.profile_gate(&sender_uuid).await?;
        let peer_gate = self.profile_gate(&request.peer_uuid).await?;
        if !sender_gate.chat_opt_in || !peer_gate.chat_opt_in {
            return Err(Error::forbidden("Direct messages are disabled for this guest"));
        }
        if peer_gate.blocked_users.iter().any(|uuid| uuid == &sender_uuid)
            || sender_gate
                .blocked_users
                .iter()
                .any(|uuid| uuid == &request.peer_uuid)
        {
            return Err(Error::forbidden("Direct messages are disabled for this guest"));
        }

        let now_millis = now.timestamp_millis();
        let meta_path = channel_meta_path(&request.channel_id);
        let meta = self
            .records
            .get(&meta_path)
            .await
            .map_err(map_record_store_error)?;
        if meta.is_none() {
            self.records
                .set(
                    &meta_path,
                    &json!({
                        "channelType": "direct",
                        "bookingId": session.booking_id,
                        "memberUids": {
                            (sender_uuid.as_str()): true,
                            (request.peer_uuid.as_str()): true,
                        },
                        "createdAt": now_millis,
                    }),
                )
                .await
                .map_err(map_record_store_error)?;
        }

        let message_id = generate_message_id(now_millis);
        self.records
            .set(
                &message_path(&request.channel_id, &message_id),
                &json!({
                    "content": content,
                    "senderId": sender_uuid,
                    "senderRole": "guest",
                    "senderName": sender_name,
                    "createdAt": now_millis,
                }),
            )
            .await
            .map_err(map_record_store_error)?;

        record_best_effort(self.telemetry.as_ref(), TelemetryMetric::WriteSuccess).await;

        Ok(DirectMessageReceipt {
            message_id,
            created_at: now_millis,
        })
    }

    async fn list(
        &self,
        request: ListDirectMessagesRequest,
    ) -> Result<Vec<DirectMessage>, Error> {
        let now = self.clock.utc();
        let session = load_session(self.records.as_ref(), request.token.as_deref(), now).await?;
        ensure_booking_scope(&session, request.claimed_booking_id.as_deref())?;

        let reader_uuid = session
            .guest_uuid
            .clone()
            .ok_or_else(|| Error::forbidden("Guest identity required"))?;

        let key = format!("direct-message:read:{reader_uuid}");
        if let RateLimitDecision::Blocked(block) = self
            .limiter
            .enforce(&key, quotas::DIRECT_MESSAGE_READ, Some(TelemetryMetric::ReadRateLimited))
            .await
        {
            return Err(block.to_error());
        }

        let meta = self
            .records
            .get(&channel_meta_path(&request.channel_id))
            .await
            .map_err(map_record_store_error)?
            .ok_or_else(|| Error::not_found("Channel not found"))?;
        let is_member = meta
            .get("memberUids")
            .and_then(|members| members.get(&reader_uuid))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !is_member {
            return Err(Error::forbidden("Not a member of this channel"));
        }

        let raw = self
            .records
            .get(&format!("messaging/channels/{}/messages", request.channel_id))
            .await
            .map_err(map_record_store_error)?;

        let mut messages: Vec<DirectMessage> = raw
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .map(|map| {
                map.into_iter()
                    .filter_map(|(id, value)| {
                        let content = value.get("content")?.as_str()?.to_owned();
                        Some(DirectMessage {
                            id,
                            content,
                            sender_id: value
                                .get("senderId")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_owned(),
                            sender_role: value
                                .get("senderRole")
                                .and_then(Value::as_str)
                                .unwrap_or("guest")
                                .to_owned(),
                            sender_name: value
                                .get("senderName")
                                .and_then(Value::as_str)
                                .unwrap_or("Guest")
                                .to_owned(),
                            created_at: value
                                .get("createdAt")
                                .and_then(Value::as_i64)
                                .unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|message| message.created_at);

        record_best_effort(self.telemetry.as_ref(), TelemetryMetric::ReadSuccess).await;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MemoryCounterStore, MemoryRecordStore, NoOpTelemetryRecorder};
    use crate::domain::ErrorCode;
    use mockable::DefaultClock;
    use std::time::Duration;

    fn service(
        records: Arc<MemoryRecordStore>,
        counters: Arc<MemoryCounterStore>,
    ) -> DirectMessageService<MemoryRecordStore, MemoryCounterStore> {
        DirectMessageService::new(
            records,
            RateLimiter::new(
                counters,
                Arc::new(NoOpTelemetryRecorder),
                Arc::new(DefaultClock),
            ),
            Arc::new(NoOpTelemetryRecorder),
            Arc::new(DefaultClock),
        )
    }

    async fn seed_booking(records: &MemoryRecordStore) {
        records
            .set(
                "guestSessionsByToken/token-1",
                &json!({
                    "bookingId": "BOOK123",
                    "guestUuid": "occ_aaa",
                    "createdAt": "2026-02-01T00:00:00Z",
                    "expiresAt": "2099-02-01T00:00:00Z",
                }),
            )
            .await
            .expect("seed session");
        records
            .set("bookings/BOOK123/occ_aaa", &json!({ "firstName": "Jane" }))
            .await
            .expect("seed sender");
        records
            .set("bookings/BOOK123/occ_bbb", &json!({ "firstName": "Alex" }))
            .await
            .expect("seed peer");
        for uuid in ["occ_aaa", "occ_bbb"] {
            records
                .set(
                    &format!("guestProfiles/{uuid}"),
                    &json!({ "chatOptIn": true, "blockedUsers": [] }),
                )
                .await
                .expect("seed profile");
        }
    }

    fn send_request(channel_id: &str) -> SendDirectMessageRequest {
        SendDirectMessageRequest {
            token: Some("token-1".to_owned()),
            claimed_booking_id: Some("BOOK123".to_owned()),
            booking_id: "BOOK123".to_owned(),
            peer_uuid: "occ_bbb".to_owned(),
            channel_id: channel_id.to_owned(),
            content: "Hello from backend".to_owned(),
        }
    }

    #[test]
    fn channel_ids_are_order_independent() {
        assert_eq!(
            direct_channel_id("occ_aaa", "occ_bbb"),
            direct_channel_id("occ_bbb", "occ_aaa")
        );
        assert_eq!(direct_channel_id("occ_aaa", "occ_bbb"), "dm_occ_aaa_occ_bbb");
    }

    #[tokio::test]
    async fn send_creates_channel_meta_and_message() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        let service = service(Arc::clone(&records), counters);

        let receipt = service
            .send(send_request("dm_occ_aaa_occ_bbb"))
            .await
            .expect("send succeeds");
        assert!(receipt.message_id.starts_with("msg_"));

        let meta = records
            .peek("messaging/channels/dm_occ_aaa_occ_bbb/meta")
            .expect("meta created");
        assert_eq!(meta["channelType"], json!("direct"));
        assert_eq!(meta["bookingId"], json!("BOOK123"));
        assert_eq!(meta["memberUids"]["occ_aaa"], json!(true));
        assert_eq!(meta["memberUids"]["occ_bbb"], json!(true));

        let message = records
            .peek(&format!(
                "messaging/channels/dm_occ_aaa_occ_bbb/messages/{}",
                receipt.message_id
            ))
            .expect("message written");
        assert_eq!(message["content"], json!("Hello from backend"));
        assert_eq!(message["senderId"], json!("occ_aaa"));
        assert_eq!(message["senderRole"], json!("guest"));
        assert_eq!(message["senderName"], json!("Jane"));
    }

    #[tokio::test]
    async fn send_rejects_mismatched_channel_ids() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        let service = service(Arc::clone(&records), counters);

        let writes = records.write_count();
        let error = service
            .send(send_request("dm_wrong"))
            .await
            .expect_err("bad channel");
        assert_eq!(error.code(), ErrorCode::Forbidden);
        assert_eq!(records.write_count(), writes);
    }

    #[tokio::test]
    async fn send_rejects_unconfirmed_peers() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        records
            .delete("bookings/BOOK123/occ_bbb")
            .await
            .expect("remove peer");
        let service = service(Arc::clone(&records), counters);

        let error = service
            .send(send_request("dm_occ_aaa_occ_bbb"))
            .await
            .expect_err("unconfirmed peer");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn send_rejects_booking_header_mismatch() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        let service = service(Arc::clone(&records), counters);

        let mut request = send_request("dm_occ_aaa_occ_bbb");
        request.claimed_booking_id = Some("BOOK999".to_owned());
        let error = service.send(request).await.expect_err("booking mismatch");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn send_is_rate_limited_at_the_write_quota() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        counters
            .put("direct-message:write:occ_aaa", "40", Duration::from_secs(60))
            .await
            .expect("seed counter");
        let service = service(Arc::clone(&records), counters);

        let error = service
            .send(send_request("dm_occ_aaa_occ_bbb"))
            .await
            .expect_err("over quota");
        assert_eq!(error.code(), ErrorCode::RateLimited);
        let details = error.details().expect("details");
        assert_eq!(details["limit"], json!(40));
        assert_eq!(details["windowSeconds"], json!(60));
    }

    #[tokio::test]
    async fn send_respects_chat_opt_out() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        records
            .set(
                "guestProfiles/occ_bbb",
                &json!({ "chatOptIn": false, "blockedUsers": [] }),
            )
            .await
            .expect("opt out peer");
        let service = service(Arc::clone(&records), counters);

        let error = service
            .send(send_request("dm_occ_aaa_occ_bbb"))
            .await
            .expect_err("peer opted out");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn send_respects_block_lists() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        records
            .set(
                "guestProfiles/occ_bbb",
                &json!({ "chatOptIn": true, "blockedUsers": ["occ_aaa"] }),
            )
            .await
            .expect("block sender");
        let service = service(Arc::clone(&records), counters);

        let error = service
            .send(send_request("dm_occ_aaa_occ_bbb"))
            .await
            .expect_err("blocked");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn list_returns_messages_in_chronological_order() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        records
            .set(
                "messaging/channels/dm_occ_aaa_occ_bbb/meta",
                &json!({
                    "channelType": "direct",
                    "bookingId": "BOOK123",
                    "memberUids": { "occ_aaa": true, "occ_bbb": true },
                    "createdAt": 1,
                }),
            )
            .await
            .expect("seed meta");
        for (id, at) in [("msg_b", 200), ("msg_a", 100)] {
            records
                .set(
                    &format!("messaging/channels/dm_occ_aaa_occ_bbb/messages/{id}"),
                    &json!({
                        "content": id,
                        "senderId": "occ_bbb",
                        "senderRole": "guest",
                        "senderName": "Alex",
                        "createdAt": at,
                    }),
                )
                .await
                .expect("seed message");
        }
        let service = service(Arc::clone(&records), counters);

        let messages = service
            .list(ListDirectMessagesRequest {
                token: Some("token-1".to_owned()),
                claimed_booking_id: Some("BOOK123".to_owned()),
                channel_id: "dm_occ_aaa_occ_bbb".to_owned(),
            })
            .await
            .expect("list succeeds");
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["msg_a", "msg_b"]);
    }

    #[tokio::test]
    async fn list_rejects_non_members() {
        let records = Arc::new(MemoryRecordStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        seed_booking(&records).await;
        records
            .set(
                "messaging/channels/dm_occ_xxx_occ_yyy/meta",
                &json!({
                    "channelType": "direct",
                    "bookingId": "BOOK123",
                    "memberUids": { "occ_xxx": true, "occ_yyy": true },
                    "createdAt": 1,
                }),
            )
            .await
            .expect("seed meta");
        let service = service(Arc::clone(&records), counters);

        let error = service
            .list(ListDirectMessagesRequest {
                token: Some("token-1".to_owned()),
                claimed_booking_id: Some("BOOK123".to_owned()),
                channel_id: "dm_occ_xxx_occ_yyy".to_owned(),
            })
            .await
            .expect_err("not a member");
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }
}
