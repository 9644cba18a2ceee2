//! HTTP middleware applied to every inbound request.

pub mod trace;
