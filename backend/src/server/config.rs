//! Portal configuration parsing and validation.
//!
//! This module centralises the environment-driven settings so they are
//! validated consistently and can be tested in isolation. Release builds
//! require the store endpoints explicitly; debug builds warn and fall back
//! to in-memory stores so the portal runs locally with no collaborators.

use mockable::Env;
use reqwest::Url;
use tracing::warn;

use crate::domain::staff_gate::StaffGateConfig;
use crate::domain::staff_role::StaffRole;

const RECORD_STORE_URL_ENV: &str = "RECORD_STORE_URL";
const RECORD_STORE_AUTH_ENV: &str = "RECORD_STORE_AUTH_TOKEN";
const COUNTER_STORE_URL_ENV: &str = "COUNTER_STORE_URL";
const COUNTER_STORE_TOKEN_ENV: &str = "COUNTER_STORE_TOKEN";
const STAFF_PIN_HASH_ENV: &str = "STAFF_PIN_HASH";
const SERVICE_ACCOUNT_EMAIL_ENV: &str = "SERVICE_ACCOUNT_EMAIL";
const SERVICE_ACCOUNT_KEY_ENV: &str = "SERVICE_ACCOUNT_PRIVATE_KEY";
const HOSTEL_ID_ENV: &str = "STAFF_HOSTEL_ID";
const STAFF_ROLE_ENV: &str = "STAFF_ROLE";
const ENVIRONMENT_ENV: &str = "PORTAL_ENVIRONMENT";
const GATE_ENABLED_ENV: &str = "STAFF_GATE_ENABLED";
const GATE_SECRET_ENV: &str = "STAFF_GATE_SHARED_SECRET";
const MAIL_API_URL_ENV: &str = "MAIL_API_URL";
const MAIL_API_KEY_ENV: &str = "MAIL_API_KEY";
const MAIL_FROM_ENV: &str = "MAIL_FROM";
const IDENTITY_LOOKUP_URL_ENV: &str = "IDENTITY_LOOKUP_URL";

const DEFAULT_HOSTEL_ID: &str = "prime";
const DEFAULT_MAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_MAIL_FROM: &str = "Prime <noreply@prime-hostel.example>";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";
const ROLE_EXPECTED: &str = "owner|admin|staff";

/// Build mode for configuration validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    /// Debug builds tolerate defaults and emit warnings for missing values.
    Debug,
    /// Release builds require explicit, valid settings.
    Release,
}

impl BuildMode {
    /// Determine the build mode from `cfg!(debug_assertions)`.
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// Errors raised while validating portal configuration.
#[derive(thiserror::Error, Debug)]
pub enum PortalConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {name}")]
    MissingEnv {
        /// Variable name.
        name: &'static str,
    },
    /// A variable is present but contains an invalid value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Observed value.
        value: String,
        /// Accepted shape.
        expected: &'static str,
    },
}

/// A REST store endpoint and its credential.
#[derive(Debug, Clone)]
pub struct StoreEndpoint {
    /// Base URL of the store.
    pub url: Url,
    /// Bearer or query credential, when the store needs one.
    pub token: Option<String>,
}

/// Where durable and counter state lives.
#[derive(Debug, Clone)]
pub enum StorageMode {
    /// REST-backed stores (the production shape).
    Rest {
        /// Record store endpoint.
        records: StoreEndpoint,
        /// Counter store endpoint.
        counters: StoreEndpoint,
    },
    /// In-process stores for local development.
    InMemory,
}

/// Outbound mail settings.
#[derive(Debug, Clone)]
pub struct MailSettings {
    /// Provider endpoint.
    pub endpoint: Url,
    /// API key; dispatch reports not-configured without one.
    pub api_key: Option<String>,
    /// Sender address.
    pub from: String,
}

/// Validated portal settings.
#[derive(Debug)]
pub struct PortalConfig {
    /// Store wiring.
    pub storage: StorageMode,
    /// bcrypt hash of the staff PIN.
    pub pin_hash: Option<String>,
    /// Service account email for the token signer.
    pub service_account_email: Option<String>,
    /// Service account private key PEM for the token signer.
    pub service_account_private_key: Option<String>,
    /// Property identifier asserted in staff claims.
    pub hostel_id: String,
    /// Role asserted in PIN-minted tokens.
    pub staff_role: StaffRole,
    /// Staff gate settings.
    pub gate: StaffGateConfig,
    /// Outbound mail settings.
    pub mail: MailSettings,
    /// Identity-provider lookup endpoint (with API key query).
    pub identity_lookup_url: Option<Url>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn url_from_env<E: Env>(
    env: &E,
    name: &'static str,
) -> Result<Option<Url>, PortalConfigError> {
    match env.string(name) {
        Some(raw) => Url::parse(raw.trim())
            .map(Some)
            .map_err(|_| PortalConfigError::InvalidEnv {
                name,
                value: raw,
                expected: "an absolute URL",
            }),
        None => Ok(None),
    }
}

fn storage_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<StorageMode, PortalConfigError> {
    let record_url = url_from_env(env, RECORD_STORE_URL_ENV)?;
    let counter_url = url_from_env(env, COUNTER_STORE_URL_ENV)?;

    match (record_url, counter_url) {
        (Some(records), Some(counters)) => Ok(StorageMode::Rest {
            records: StoreEndpoint {
                url: records,
                token: env.string(RECORD_STORE_AUTH_ENV),
            },
            counters: StoreEndpoint {
                url: counters,
                token: env.string(COUNTER_STORE_TOKEN_ENV),
            },
        }),
        (records, counters) => {
            if mode.is_debug() {
                warn!("store endpoints not fully configured; using in-memory stores (dev only)");
                return Ok(StorageMode::InMemory);
            }
            let name = if records.is_none() {
                RECORD_STORE_URL_ENV
            } else {
                COUNTER_STORE_URL_ENV
            };
            let _ = counters;
            Err(PortalConfigError::MissingEnv { name })
        }
    }
}

fn staff_role_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<StaffRole, PortalConfigError> {
    match env.string(STAFF_ROLE_ENV) {
        None => Ok(StaffRole::Staff),
        Some(raw) => match StaffRole::parse(&raw) {
            Some(role) => Ok(role),
            None => {
                if mode.is_debug() {
                    warn!(value = %raw, "invalid STAFF_ROLE; defaulting to staff");
                    Ok(StaffRole::Staff)
                } else {
                    Err(PortalConfigError::InvalidEnv {
                        name: STAFF_ROLE_ENV,
                        value: raw,
                        expected: ROLE_EXPECTED,
                    })
                }
            }
        },
    }
}

fn gate_from_env<E: Env>(env: &E, mode: BuildMode) -> Result<StaffGateConfig, PortalConfigError> {
    let environment = env.string(ENVIRONMENT_ENV).unwrap_or_else(|| {
        if mode.is_debug() {
            "development".to_owned()
        } else {
            "production".to_owned()
        }
    });

    let enabled = match env.string(GATE_ENABLED_ENV) {
        None => false,
        Some(raw) => parse_bool(&raw).ok_or(PortalConfigError::InvalidEnv {
            name: GATE_ENABLED_ENV,
            value: raw,
            expected: BOOL_EXPECTED,
        })?,
    };

    Ok(StaffGateConfig {
        environment,
        enabled,
        shared_secret: env.string(GATE_SECRET_ENV),
    })
}

fn mail_from_env<E: Env>(env: &E) -> Result<MailSettings, PortalConfigError> {
    let endpoint = match url_from_env(env, MAIL_API_URL_ENV)? {
        Some(url) => url,
        None => Url::parse(DEFAULT_MAIL_API_URL).map_err(|_| PortalConfigError::InvalidEnv {
            name: MAIL_API_URL_ENV,
            value: DEFAULT_MAIL_API_URL.to_owned(),
            expected: "an absolute URL",
        })?,
    };
    Ok(MailSettings {
        endpoint,
        api_key: env.string(MAIL_API_KEY_ENV),
        from: env
            .string(MAIL_FROM_ENV)
            .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_owned()),
    })
}

/// Build portal settings from environment variables and build mode.
pub fn portal_config_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<PortalConfig, PortalConfigError> {
    Ok(PortalConfig {
        storage: storage_from_env(env, mode)?,
        pin_hash: env.string(STAFF_PIN_HASH_ENV),
        service_account_email: env.string(SERVICE_ACCOUNT_EMAIL_ENV),
        service_account_private_key: env.string(SERVICE_ACCOUNT_KEY_ENV),
        hostel_id: env
            .string(HOSTEL_ID_ENV)
            .unwrap_or_else(|| DEFAULT_HOSTEL_ID.to_owned()),
        staff_role: staff_role_from_env(env, mode)?,
        gate: gate_from_env(env, mode)?,
        mail: mail_from_env(env)?,
        identity_lookup_url: url_from_env(env, IDENTITY_LOOKUP_URL_ENV)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::MockEnv;

    fn env_with(values: Vec<(&'static str, &'static str)>) -> MockEnv {
        let mut env = MockEnv::new();
        env.expect_string().returning(move |name| {
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        });
        env
    }

    #[test]
    fn release_mode_requires_store_endpoints() {
        let env = env_with(vec![]);
        let error = portal_config_from_env(&env, BuildMode::Release).expect_err("missing stores");
        assert!(matches!(error, PortalConfigError::MissingEnv { name } if name == "RECORD_STORE_URL"));
    }

    #[test]
    fn debug_mode_falls_back_to_in_memory_stores() {
        let env = env_with(vec![]);
        let config =
            portal_config_from_env(&env, BuildMode::Debug).expect("debug config builds");
        assert!(matches!(config.storage, StorageMode::InMemory));
        assert_eq!(config.hostel_id, "prime");
        assert_eq!(config.staff_role, StaffRole::Staff);
        assert_eq!(config.gate.environment, "development");
    }

    #[test]
    fn release_mode_defaults_to_the_production_environment() {
        let env = env_with(vec![
            ("RECORD_STORE_URL", "https://db.example.com"),
            ("COUNTER_STORE_URL", "https://kv.example.com/ns"),
        ]);
        let config =
            portal_config_from_env(&env, BuildMode::Release).expect("release config builds");
        assert_eq!(config.gate.environment, "production");
        assert!(!config.gate.enabled);
        assert!(matches!(config.storage, StorageMode::Rest { .. }));
    }

    #[test]
    fn invalid_urls_are_rejected() {
        let env = env_with(vec![("RECORD_STORE_URL", "not a url")]);
        let error = portal_config_from_env(&env, BuildMode::Release).expect_err("bad url");
        assert!(matches!(error, PortalConfigError::InvalidEnv { name, .. } if name == "RECORD_STORE_URL"));
    }

    #[test]
    fn invalid_staff_role_is_rejected_in_release() {
        let env = env_with(vec![
            ("RECORD_STORE_URL", "https://db.example.com"),
            ("COUNTER_STORE_URL", "https://kv.example.com/ns"),
            ("STAFF_ROLE", "superuser"),
        ]);
        let error = portal_config_from_env(&env, BuildMode::Release).expect_err("bad role");
        assert!(matches!(error, PortalConfigError::InvalidEnv { name, .. } if name == "STAFF_ROLE"));
    }

    #[test]
    fn gate_enabled_accepts_boolean_spellings() {
        let env = env_with(vec![
            ("RECORD_STORE_URL", "https://db.example.com"),
            ("COUNTER_STORE_URL", "https://kv.example.com/ns"),
            ("STAFF_GATE_ENABLED", "yes"),
        ]);
        let config = portal_config_from_env(&env, BuildMode::Release).expect("config builds");
        assert!(config.gate.enabled);
    }
}
