//! Domain port surface.
//!
//! Collaborator ports model the external systems the portal depends on (the
//! record store, the counter store, outbound dispatch, identity lookup);
//! driving ports are the use-case interfaces the HTTP adapter consumes.
//! Every port ships a mock (test builds) and, where useful, an in-memory or
//! fixture implementation.

mod counter_store;
mod direct_messages;
mod guest_sessions;
mod identity_lookup;
mod macros;
mod message_dispatcher;
mod prime_requests;
mod queue_processing;
mod record_store;
mod staff_access;
mod telemetry_recorder;
mod telemetry_reporting;

pub(crate) use macros::define_port_error;

pub use counter_store::*;
pub use direct_messages::*;
pub use guest_sessions::*;
pub use identity_lookup::*;
pub use message_dispatcher::*;
pub use prime_requests::*;
pub use queue_processing::*;
pub use record_store::*;
pub use staff_access::*;
pub use telemetry_recorder::*;
pub use telemetry_reporting::*;
