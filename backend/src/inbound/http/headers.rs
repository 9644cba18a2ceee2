//! Request header names and extraction helpers.

use actix_web::HttpRequest;

use crate::domain::ports::GateRequest;

/// Guest session bearer token.
pub const GUEST_TOKEN_HEADER: &str = "X-Prime-Guest-Token";
/// Booking id the guest client believes it is acting on.
pub const GUEST_BOOKING_HEADER: &str = "X-Prime-Guest-Booking-Id";
/// Assertion header injected by the access proxy in front of staff routes.
pub const ACCESS_PROXY_HEADER: &str = "Cf-Access-Jwt-Assertion";
/// Shared secret presented by trusted infrastructure.
pub const STAFF_GATE_KEY_HEADER: &str = "X-Staff-Gate-Key";

/// Read a header as an owned string, dropping non-UTF-8 values.
pub fn header_string(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Caller identity used for rate limiting and lockout tracking.
pub fn client_key(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_owned()
}

/// Collect the gate-relevant parts of a staff request.
pub fn gate_request_from(req: &HttpRequest) -> GateRequest {
    GateRequest {
        authorization: header_string(req, "Authorization"),
        has_access_proxy_assertion: req.headers().contains_key(ACCESS_PROXY_HEADER),
        shared_secret: header_string(req, STAFF_GATE_KEY_HEADER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn header_string_reads_present_headers() {
        let req = TestRequest::default()
            .insert_header((GUEST_TOKEN_HEADER, "token-1"))
            .to_http_request();
        assert_eq!(header_string(&req, GUEST_TOKEN_HEADER).as_deref(), Some("token-1"));
        assert!(header_string(&req, GUEST_BOOKING_HEADER).is_none());
    }

    #[test]
    fn gate_request_collects_all_three_signals() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok"))
            .insert_header((ACCESS_PROXY_HEADER, "assertion"))
            .insert_header((STAFF_GATE_KEY_HEADER, "shhh"))
            .to_http_request();
        let gate = gate_request_from(&req);
        assert_eq!(gate.authorization.as_deref(), Some("Bearer tok"));
        assert!(gate.has_access_proxy_assertion);
        assert_eq!(gate.shared_secret.as_deref(), Some("shhh"));
    }
}
