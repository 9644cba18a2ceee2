//! Prime guest-portal backend library modules.
//!
//! The crate is laid out hexagonally: `domain` holds transport-agnostic
//! types, services, and ports; `inbound` adapts HTTP onto the driving
//! ports; `outbound` implements the collaborator ports over REST; `server`
//! wires everything together from environment configuration.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::trace::Trace;
