//! RS256-signed custom identity tokens for verified staff.
//!
//! The signer produces exactly one token shape: the compact assertion the
//! identity provider exchanges for a native session. Header `{alg: RS256,
//! typ: JWT}`, payload carrying issuer/subject (the service account email),
//! the fixed identity-toolkit audience, a one-hour validity window, the
//! staff uid, and the custom claims map.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{Map, Value};

/// Fixed audience the identity provider expects on custom tokens.
pub const IDENTITY_TOOLKIT_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Custom token validity in seconds.
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Errors raised while building or signing a custom token.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The configured private key could not be parsed as PEM-encoded RSA.
    #[error("invalid service account private key: {message}")]
    InvalidKey {
        /// Parser diagnostic.
        message: String,
    },
    /// Signing the assembled payload failed.
    #[error("failed to sign custom token: {message}")]
    Signing {
        /// Underlying diagnostic.
        message: String,
    },
}

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    uid: &'a str,
    claims: &'a Map<String, Value>,
}

/// Secrets managers and env files often deliver PEM keys with literal `\n`
/// escape sequences; normalize those before parsing.
fn normalize_pem(pem: &str) -> String {
    pem.replace("\\n", "\n")
}

/// Signs custom identity tokens with a service account key.
pub struct CustomTokenSigner {
    service_account_email: String,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for CustomTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTokenSigner")
            .field("service_account_email", &self.service_account_email)
            .field("encoding_key", &"<redacted>")
            .finish()
    }
}

impl CustomTokenSigner {
    /// Parse the service account key and build a signer.
    ///
    /// The key must be PKCS#8 PEM; literal `\n` sequences are normalized
    /// before parsing.
    pub fn new(
        service_account_email: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, SignerError> {
        let normalized = normalize_pem(private_key_pem);
        let encoding_key =
            EncodingKey::from_rsa_pem(normalized.as_bytes()).map_err(|error| {
                SignerError::InvalidKey {
                    message: error.to_string(),
                }
            })?;
        Ok(Self {
            service_account_email: service_account_email.into(),
            encoding_key,
        })
    }

    /// Sign a custom token asserting `uid` with the given claims.
    pub fn sign(
        &self,
        uid: &str,
        claims: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<String, SignerError> {
        let issued_at = now.timestamp();
        let payload = CustomTokenClaims {
            iss: &self.service_account_email,
            sub: &self.service_account_email,
            aud: IDENTITY_TOOLKIT_AUDIENCE,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
            uid,
            claims,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &payload, &self.encoding_key)
            .map_err(|error| SignerError::Signing {
                message: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use serde_json::json;

    fn test_key_pem() -> String {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).expect("generate test key");
        key.to_pkcs8_pem(LineEnding::LF)
            .expect("encode test key")
            .to_string()
    }

    #[test]
    fn rejects_garbage_keys() {
        let error = CustomTokenSigner::new("svc@example.com", "not a pem")
            .expect_err("garbage key should fail");
        assert!(matches!(error, SignerError::InvalidKey { .. }));
    }

    #[test]
    fn normalizes_escaped_newlines() {
        let pem = test_key_pem();
        let escaped = pem.replace('\n', "\\n");
        CustomTokenSigner::new("svc@example.com", &escaped)
            .expect("escaped key should parse after normalization");
    }

    #[test]
    fn signs_three_segment_tokens_with_expected_payload() {
        let pem = test_key_pem();
        let signer = CustomTokenSigner::new("svc@example.com", &pem).expect("valid key");
        let mut claims = Map::new();
        claims.insert("role".to_owned(), json!("staff"));
        claims.insert("staff".to_owned(), json!(true));
        let now = chrono::Utc::now();

        let token = signer
            .sign("staff_prime", &claims, now)
            .expect("signing succeeds");
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3, "compact tokens have three segments");

        let header: serde_json::Value = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(segments[0])
                .expect("header decodes"),
        )
        .expect("header is JSON");
        assert_eq!(header["alg"], json!("RS256"));
        assert_eq!(header["typ"], json!("JWT"));

        let payload: serde_json::Value = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(segments[1])
                .expect("payload decodes"),
        )
        .expect("payload is JSON");
        assert_eq!(payload["iss"], json!("svc@example.com"));
        assert_eq!(payload["sub"], json!("svc@example.com"));
        assert_eq!(payload["aud"], json!(IDENTITY_TOOLKIT_AUDIENCE));
        assert_eq!(payload["uid"], json!("staff_prime"));
        assert_eq!(payload["claims"]["role"], json!("staff"));
        let iat = payload["iat"].as_i64().expect("iat");
        let exp = payload["exp"].as_i64().expect("exp");
        assert_eq!(exp - iat, 3600);
    }
}
