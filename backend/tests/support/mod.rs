//! Shared test doubles and portal assembly for HTTP integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mockable::{Clock, DefaultClock};

use prime_backend::domain::direct_message::DirectMessageService;
use prime_backend::domain::lockout::LockoutGuard;
use prime_backend::domain::pin_auth::{PinAuthConfig, PinAuthService};
use prime_backend::domain::ports::{
    DispatchError, DispatchReceipt, IdentityLookup, IdentityLookupError, IdentityRecord,
    MemoryCounterStore, MemoryRecordStore, MessageDispatcher, OutboundMessage, RecordStore,
    TelemetryRecorder,
};
use prime_backend::domain::queue::MessagingQueueService;
use prime_backend::domain::rate_limit::RateLimiter;
use prime_backend::domain::requests::PrimeRequestService;
use prime_backend::domain::session::GuestSessionService;
use prime_backend::domain::staff_gate::{StaffGateConfig, StaffGateService};
use prime_backend::domain::staff_role::StaffRole;
use prime_backend::domain::staff_token::CustomTokenSigner;
use prime_backend::domain::telemetry::DirectTelemetryService;
use prime_backend::inbound::http::HttpState;

/// Bearer token the test identity provider recognizes as an admin.
pub const STAFF_BEARER: &str = "staff-test-token";

/// Dispatcher double that records sends and replays a scripted outcome.
///
/// An empty script delivers successfully.
#[derive(Default)]
pub struct ScriptedDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
    script: Mutex<VecDeque<Result<DispatchReceipt, DispatchError>>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next send.
    pub fn push_outcome(&self, outcome: Result<DispatchReceipt, DispatchError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Number of messages handed to the dispatcher so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Snapshot of the messages handed to the dispatcher.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MessageDispatcher for ScriptedDispatcher {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(DispatchReceipt::Delivered { provider_id: None }))
    }
}

/// Identity provider double recognizing exactly one bearer token.
pub struct StaticIdentityLookup {
    token: String,
    record: IdentityRecord,
}

#[async_trait]
impl IdentityLookup for StaticIdentityLookup {
    async fn lookup(
        &self,
        bearer_token: &str,
    ) -> Result<Option<IdentityRecord>, IdentityLookupError> {
        Ok((bearer_token == self.token).then(|| self.record.clone()))
    }
}

/// Encode an unsigned three-segment token carrying the given claim payload.
pub fn encode_claims_token(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

/// The assembled in-memory portal with handles onto its doubles.
pub struct TestPortal {
    pub records: Arc<MemoryRecordStore>,
    pub counters: Arc<MemoryCounterStore>,
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub state: HttpState,
}

/// Assemble a portal over in-memory stores.
///
/// `pin_hash`/`signer` configure the staff login endpoint; the staff gate
/// runs in a non-production environment and accepts [`STAFF_BEARER`] as an
/// admin token (the bearer sent on the wire is the claims token built from
/// that constant).
pub fn test_portal(pin_hash: Option<String>, signer: Option<CustomTokenSigner>) -> TestPortal {
    let records = Arc::new(MemoryRecordStore::new());
    let counters = Arc::new(MemoryCounterStore::new());
    let dispatcher = Arc::new(ScriptedDispatcher::new());
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let telemetry = Arc::new(DirectTelemetryService::new(
        Arc::clone(&counters),
        Arc::clone(&clock),
    ));
    let telemetry_recorder: Arc<dyn TelemetryRecorder> = telemetry.clone();
    let limiter = RateLimiter::new(
        Arc::clone(&counters),
        Arc::clone(&telemetry_recorder),
        Arc::clone(&clock),
    );

    let sessions = Arc::new(GuestSessionService::new(
        Arc::clone(&records),
        limiter.clone(),
        Arc::clone(&clock),
    ));

    let identity = Arc::new(StaticIdentityLookup {
        token: staff_bearer_token(),
        record: IdentityRecord {
            uid: "staff-1".to_owned(),
            email: Some("admin@example.com".to_owned()),
            custom_attributes: Some(r#"{"role":"admin"}"#.to_owned()),
        },
    });

    let state = HttpState {
        sessions: sessions.clone(),
        sessions_query: sessions,
        pin_auth: Arc::new(PinAuthService::new(
            LockoutGuard::new(Arc::clone(&counters), Arc::clone(&clock)),
            signer,
            PinAuthConfig {
                pin_hash,
                role: StaffRole::Staff,
                hostel_id: "prime".to_owned(),
            },
            Arc::clone(&clock),
        )),
        staff_gate: Arc::new(StaffGateService::new(
            identity,
            StaffGateConfig {
                environment: "test".to_owned(),
                enabled: false,
                shared_secret: None,
            },
        )),
        requests: Arc::new(PrimeRequestService::new(
            Arc::clone(&records),
            Arc::clone(&counters),
            limiter.clone(),
            Arc::clone(&clock),
        )),
        direct_messages: Arc::new(DirectMessageService::new(
            Arc::clone(&records),
            limiter,
            telemetry_recorder,
            Arc::clone(&clock),
        )),
        queue: Arc::new(MessagingQueueService::new(
            Arc::clone(&records),
            Arc::clone(&dispatcher),
            clock,
        )),
        telemetry,
    };

    TestPortal {
        records,
        counters,
        dispatcher,
        state,
    }
}

/// The wire-format bearer the test identity provider recognizes.
///
/// The gate decodes the token's claims segment locally, so the bearer must
/// be a well-formed three-segment token; the identity double matches it
/// verbatim.
pub fn staff_bearer_token() -> String {
    encode_claims_token(serde_json::json!({ "sub": STAFF_BEARER, "uid": "staff-1" }))
}

/// Authorization header value for staff requests.
pub fn staff_auth_header() -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", staff_bearer_token()))
}

/// Seed a live guest session plus its booking records.
pub async fn seed_guest_session(records: &MemoryRecordStore) {
    records
        .set(
            "guestSessionsByToken/token-1",
            &serde_json::json!({
                "bookingId": "BOOK123",
                "guestUuid": "occ_aaa",
                "createdAt": "2026-02-01T00:00:00Z",
                "expiresAt": "2099-02-01T00:00:00Z",
            }),
        )
        .await
        .expect("seed session");
    records
        .set(
            "bookings/BOOK123/occ_aaa",
            &serde_json::json!({ "firstName": "Jane" }),
        )
        .await
        .expect("seed sender");
    records
        .set(
            "bookings/BOOK123/occ_bbb",
            &serde_json::json!({ "firstName": "Alex" }),
        )
        .await
        .expect("seed peer");
    for uuid in ["occ_aaa", "occ_bbb"] {
        records
            .set(
                &format!("guestProfiles/{uuid}"),
                &serde_json::json!({ "chatOptIn": true, "blockedUsers": [] }),
            )
            .await
            .expect("seed profile");
    }
}
