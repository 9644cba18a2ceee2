//! Outbound adapters for the portal's external collaborators.

pub mod firebase;
pub mod identity;
pub mod kv;
pub mod mailer;
