//! Staff PIN authentication: lockout, hash comparison, token minting.
//!
//! Composes the lockout guard with the custom token signer. The stored
//! credential is a bcrypt hash; comparison goes through bcrypt's
//! constant-time verify so response timing does not leak how close a guess
//! was. Every failure response carries the same payload shape (counters and
//! lock deadline), never the reason a PIN was wrong.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::domain::lockout::{LockoutGuard, STAFF_PIN_LOCKOUT};
use crate::domain::ports::{
    CounterStore, PinAuthenticator, PinLoginRequest, PinLoginResponse,
};
use crate::domain::staff_role::StaffRole;
use crate::domain::staff_token::CustomTokenSigner;
use crate::domain::Error;

/// Static PIN endpoint configuration.
pub struct PinAuthConfig {
    /// bcrypt hash of the staff PIN; endpoint is unavailable without it.
    pub pin_hash: Option<String>,
    /// Role asserted in minted tokens.
    pub role: StaffRole,
    /// Property identifier carried in claims and the staff uid.
    pub hostel_id: String,
}

/// PIN authentication service.
pub struct PinAuthService<C> {
    lockout: LockoutGuard<C>,
    signer: Option<CustomTokenSigner>,
    config: PinAuthConfig,
    clock: Arc<dyn Clock>,
}

impl<C> PinAuthService<C> {
    /// Create the service; `signer` is `None` when no key is configured.
    pub fn new(
        lockout: LockoutGuard<C>,
        signer: Option<CustomTokenSigner>,
        config: PinAuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lockout,
            signer,
            config,
            clock,
        }
    }

    fn staff_uid(&self) -> String {
        format!("staff_{}", self.config.hostel_id)
    }

    fn staff_claims(&self) -> Map<String, Value> {
        let role = self.config.role.as_str();
        let mut claims = Map::new();
        claims.insert("role".to_owned(), json!(role));
        claims.insert("roles".to_owned(), json!([role]));
        claims.insert("staff".to_owned(), json!(true));
        claims.insert("hostelId".to_owned(), json!(self.config.hostel_id));
        claims
    }
}

#[async_trait]
impl<C> PinAuthenticator for PinAuthService<C>
where
    C: CounterStore,
{
    async fn authenticate(&self, request: PinLoginRequest) -> Result<PinLoginResponse, Error> {
        let (Some(pin_hash), Some(signer)) = (self.config.pin_hash.as_deref(), &self.signer)
        else {
            return Err(Error::service_unavailable(
                "Staff authentication is not configured",
            ));
        };

        if request.pin.trim().is_empty() {
            return Err(Error::invalid_request("PIN is required"));
        }

        let check = self.lockout.check(&request.client_key).await?;
        if check.locked {
            return Err(Error::rate_limited("Too many failed attempts")
                .with_details(check.state.failure_details(&STAFF_PIN_LOCKOUT)));
        }

        let matches = bcrypt::verify(&request.pin, pin_hash).map_err(|error| {
            warn!(%error, "configured staff PIN hash is not a valid bcrypt hash");
            Error::service_unavailable("Staff authentication is not configured")
        })?;

        if !matches {
            let state = self
                .lockout
                .record_failure(&request.client_key, &STAFF_PIN_LOCKOUT)
                .await?;
            return Err(Error::unauthorized("Invalid PIN")
                .with_details(state.failure_details(&STAFF_PIN_LOCKOUT)));
        }

        self.lockout.record_success(&request.client_key).await?;

        let claims = self.staff_claims();
        let uid = self.staff_uid();
        let custom_token = signer
            .sign(&uid, &claims, self.clock.utc())
            .map_err(|error| Error::internal(format!("failed to mint staff token: {error}")))?;

        Ok(PinLoginResponse {
            custom_token,
            uid,
            role: self.config.role,
            claims: Value::Object(claims),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MemoryCounterStore;
    use crate::domain::ErrorCode;
    use mockable::DefaultClock;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn signer() -> CustomTokenSigner {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("generate test key");
        let pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode test key")
            .to_string();
        CustomTokenSigner::new("svc@example.com", &pem).expect("valid key")
    }

    fn service(pin_hash: Option<String>, with_signer: bool) -> PinAuthService<MemoryCounterStore> {
        PinAuthService::new(
            LockoutGuard::new(Arc::new(MemoryCounterStore::new()), Arc::new(DefaultClock)),
            with_signer.then(signer),
            PinAuthConfig {
                pin_hash,
                role: StaffRole::Staff,
                hostel_id: "prime".to_owned(),
            },
            Arc::new(DefaultClock),
        )
    }

    fn login(pin: &str) -> PinLoginRequest {
        PinLoginRequest {
            pin: pin.to_owned(),
            client_key: "1.2.3.4".to_owned(),
        }
    }

    fn hash(pin: &str) -> String {
        bcrypt::hash(pin, 4).expect("hash pin")
    }

    #[tokio::test]
    async fn missing_configuration_is_service_unavailable() {
        let no_hash = service(None, true);
        let error = no_hash.authenticate(login("2468")).await.expect_err("no hash");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);

        let no_signer = service(Some(hash("2468")), false);
        let error = no_signer
            .authenticate(login("2468"))
            .await
            .expect_err("no signer");
        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn empty_pin_is_invalid_request() {
        let service = service(Some(hash("2468")), true);
        let error = service.authenticate(login("  ")).await.expect_err("empty pin");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn correct_pin_mints_a_three_segment_token() {
        let service = service(Some(hash("2468")), true);
        let response = service
            .authenticate(login("2468"))
            .await
            .expect("authentication succeeds");

        assert_eq!(response.uid, "staff_prime");
        assert_eq!(response.role, StaffRole::Staff);
        assert_eq!(response.custom_token.split('.').count(), 3);
        assert_eq!(response.claims["staff"], serde_json::json!(true));
        assert_eq!(response.claims["roles"], serde_json::json!(["staff"]));
        assert_eq!(response.claims["hostelId"], serde_json::json!("prime"));
    }

    #[tokio::test]
    async fn wrong_pin_counts_failures_with_constant_payload_shape() {
        let service = service(Some(hash("2468")), true);

        let first = service.authenticate(login("0000")).await.expect_err("wrong pin");
        assert_eq!(first.code(), ErrorCode::Unauthorized);
        let details = first.details().expect("failure details");
        assert_eq!(details["failedAttempts"], 1);
        assert!(details["lockedUntil"].is_null());

        let second = service.authenticate(login("0000")).await.expect_err("wrong pin");
        let details = second.details().expect("failure details");
        assert_eq!(details["failedAttempts"], 2);
        assert!(details["lockedUntil"].is_null());
    }

    #[tokio::test]
    async fn lockout_rejects_before_comparing_the_pin() {
        let service = service(Some(hash("2468")), true);
        for _ in 0..STAFF_PIN_LOCKOUT.max_attempts {
            let _ = service.authenticate(login("0000")).await;
        }

        // Even the correct PIN is rejected while locked.
        let error = service
            .authenticate(login("2468"))
            .await
            .expect_err("locked out");
        assert_eq!(error.code(), ErrorCode::RateLimited);
        let details = error.details().expect("failure details");
        assert!(details["lockedUntil"].is_i64());
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let service = service(Some(hash("2468")), true);
        let _ = service.authenticate(login("0000")).await;
        let _ = service.authenticate(login("2468")).await.expect("success");

        let error = service.authenticate(login("0000")).await.expect_err("wrong pin");
        let details = error.details().expect("failure details");
        assert_eq!(details["failedAttempts"], 1);
    }
}
