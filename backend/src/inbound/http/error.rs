//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into consistent JSON responses and
//! status codes. Rate-limited errors additionally surface the window
//! metadata recorded by the limiter as `Retry-After` and the two
//! `RateLimit-*` header families.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};
use tracing::error;

use crate::domain::{Error, ErrorCode};
use crate::middleware::trace::TRACE_ID_HEADER;

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Gone => StatusCode::GONE,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code(), ErrorCode::InternalError) {
        let mut redacted = Error::internal("Internal server error");
        if let Some(id) = error.trace_id() {
            redacted = redacted.with_trace_id(id.to_owned());
        }
        redacted
    } else {
        error.clone()
    }
}

/// Insert the rate-limit header families when the limiter recorded window
/// metadata on the error.
fn insert_rate_limit_headers(builder: &mut HttpResponseBuilder, error: &Error) {
    let Some(details) = error.details() else {
        return;
    };
    let (Some(limit), Some(window), Some(reset_at)) = (
        details.get("limit").and_then(serde_json::Value::as_u64),
        details.get("windowSeconds").and_then(serde_json::Value::as_u64),
        details.get("resetAt").and_then(serde_json::Value::as_i64),
    ) else {
        return;
    };

    builder.insert_header(("Retry-After", window.to_string()));
    builder.insert_header(("X-RateLimit-Limit", limit.to_string()));
    builder.insert_header(("X-RateLimit-Remaining", "0"));
    builder.insert_header(("X-RateLimit-Reset", reset_at.to_string()));
    builder.insert_header(("RateLimit-Limit", limit.to_string()));
    builder.insert_header(("RateLimit-Remaining", "0"));
    builder.insert_header(("RateLimit-Reset", window.to_string()));
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }
        if matches!(self.code(), ErrorCode::RateLimited) {
            insert_rate_limit_headers(&mut builder, self);
        }

        builder.json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}
