//! Port abstraction for outbound message dispatch.
//!
//! The queue processor hands fully rendered messages to this port. Failures
//! carry enough structure for the processor to classify them as permanent
//! (drop the event) or transient (leave it eligible for retry).

use async_trait::async_trait;

/// A rendered outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
}

/// Successful dispatch outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReceipt {
    /// The provider accepted the message.
    Delivered {
        /// Provider-assigned message identifier, when one was returned.
        provider_id: Option<String>,
    },
    /// No provider is configured; the message was intentionally skipped.
    NotConfigured,
}

/// Errors raised by dispatch adapters.
///
/// `Permanent` marks failures that will never succeed on retry (e.g. a
/// provider rejecting the recipient address). `Http` carries the provider's
/// status code so the caller can distinguish client errors from throttling
/// and outages. Everything else is `Transport`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The provider definitively rejected the message.
    #[error("permanent dispatch failure: {message}")]
    Permanent {
        /// Provider-supplied reason.
        message: String,
    },
    /// The provider answered with a non-2xx status.
    #[error("dispatch request failed ({status}): {message}")]
    Http {
        /// HTTP status returned by the provider.
        status: u16,
        /// Extracted provider error message.
        message: String,
    },
    /// The provider could not be reached.
    #[error("dispatch transport failure: {message}")]
    Transport {
        /// Underlying transport error.
        message: String,
    },
}

/// Port for the outbound dispatch collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    /// Deliver one message, or fail with a classifiable error.
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError>;
}

/// Fixture implementation that reports itself as not configured.
///
/// Use it where dispatch behaviour is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDispatcher;

#[async_trait]
impl MessageDispatcher for FixtureDispatcher {
    async fn send(&self, _message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        Ok(DispatchReceipt::NotConfigured)
    }
}
