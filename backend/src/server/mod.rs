//! Server assembly: adapter construction, state wiring, and route setup.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use mockable::{Clock, DefaultClock};
use tracing::warn;

use crate::domain::lockout::LockoutGuard;
use crate::domain::pin_auth::{PinAuthConfig, PinAuthService};
use crate::domain::ports::{
    CounterStore, IdentityLookup, MemoryCounterStore, MemoryRecordStore, NullIdentityLookup,
    RecordStore, TelemetryRecorder,
};
use crate::domain::queue::MessagingQueueService;
use crate::domain::rate_limit::RateLimiter;
use crate::domain::requests::PrimeRequestService;
use crate::domain::session::GuestSessionService;
use crate::domain::staff_gate::StaffGateService;
use crate::domain::staff_token::CustomTokenSigner;
use crate::domain::telemetry::DirectTelemetryService;
use crate::domain::direct_message::DirectMessageService;
use crate::inbound::http::{
    direct_messages, guest_sessions, prime_requests, queue, staff, telemetry, HttpState,
};
use crate::outbound::firebase::FirebaseRestStore;
use crate::outbound::identity::FirebaseIdentityLookup;
use crate::outbound::kv::RestCounterStore;
use crate::outbound::mailer::HttpMailDispatcher;

use self::config::{PortalConfig, StorageMode};

/// Timeout applied to every outbound collaborator call.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while assembling the server state.
#[derive(thiserror::Error, Debug)]
pub enum ServerBuildError {
    /// An outbound HTTP client could not be constructed.
    #[error("failed to build outbound client: {0}")]
    Client(#[from] reqwest::Error),
}

fn build_signer(config: &PortalConfig) -> Option<CustomTokenSigner> {
    let (email, key) = (
        config.service_account_email.as_deref()?,
        config.service_account_private_key.as_deref()?,
    );
    match CustomTokenSigner::new(email, key) {
        Ok(signer) => Some(signer),
        Err(error) => {
            warn!(%error, "service account key rejected; staff login disabled");
            None
        }
    }
}

fn assemble<S, C, I>(
    records: Arc<S>,
    counters: Arc<C>,
    identity: Arc<I>,
    dispatcher: Arc<HttpMailDispatcher>,
    config: &PortalConfig,
) -> HttpState
where
    S: RecordStore + 'static,
    C: CounterStore + 'static,
    I: IdentityLookup + 'static,
{
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

    HttpState {
        sessions: sessions.clone(),
        sessions_query: sessions,
        pin_auth: Arc::new(PinAuthService::new(
            LockoutGuard::new(Arc::clone(&counters), Arc::clone(&clock)),
            build_signer(config),
            PinAuthConfig {
                pin_hash: config.pin_hash.clone(),
                role: config.staff_role,
                hostel_id: config.hostel_id.clone(),
            },
            Arc::clone(&clock),
        )),
        staff_gate: Arc::new(StaffGateService::new(identity, config.gate.clone())),
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
        queue: Arc::new(MessagingQueueService::new(records, dispatcher, clock)),
        telemetry,
    }
}

/// Build the HTTP state from validated configuration.
pub fn build_state(config: &PortalConfig) -> Result<HttpState, ServerBuildError> {
    let dispatcher = Arc::new(HttpMailDispatcher::new(
        config.mail.endpoint.clone(),
        config.mail.api_key.clone(),
        config.mail.from.clone(),
        OUTBOUND_TIMEOUT,
    )?);

    let state = match (&config.storage, &config.identity_lookup_url) {
        (StorageMode::Rest { records, counters }, identity_url) => {
            let records = Arc::new(FirebaseRestStore::new(
                records.url.clone(),
                records.token.clone(),
                OUTBOUND_TIMEOUT,
            )?);
            let counters = Arc::new(RestCounterStore::new(
                counters.url.clone(),
                counters.token.clone(),
                OUTBOUND_TIMEOUT,
            )?);
            match identity_url {
                Some(url) => assemble(
                    records,
                    counters,
                    Arc::new(FirebaseIdentityLookup::new(url.clone(), OUTBOUND_TIMEOUT)?),
                    dispatcher,
                    config,
                ),
                None => {
                    warn!("identity lookup not configured; staff tokens cannot verify");
                    assemble(records, counters, Arc::new(NullIdentityLookup), dispatcher, config)
                }
            }
        }
        (StorageMode::InMemory, identity_url) => {
            let records = Arc::new(MemoryRecordStore::new());
            let counters = Arc::new(MemoryCounterStore::new());
            match identity_url {
                Some(url) => assemble(
                    records,
                    counters,
                    Arc::new(FirebaseIdentityLookup::new(url.clone(), OUTBOUND_TIMEOUT)?),
                    dispatcher,
                    config,
                ),
                None => assemble(records, counters, Arc::new(NullIdentityLookup), dispatcher, config),
            }
        }
    };

    Ok(state)
}

/// Register every portal route and the shared state on a service config.
///
/// Used by both the binary and the HTTP integration tests so they exercise
/// the same routing table.
pub fn configure(state: HttpState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state))
            .service(guest_sessions::issue_session)
            .service(guest_sessions::current_session)
            .service(direct_messages::send_direct_message)
            .service(direct_messages::list_direct_messages)
            .service(prime_requests::submit_request)
            .service(prime_requests::update_request_status)
            .service(staff::staff_login)
            .service(telemetry::direct_telemetry)
            .service(queue::enqueue_event)
            .service(queue::process_event);
    }
}
