//! Staff telemetry report endpoint.

use actix_web::{get, web, HttpRequest};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::domain::telemetry::{TelemetryReport, DEFAULT_WINDOW_DAYS};

use super::staff::require_staff;
use super::state::HttpState;
use super::ApiResult;

/// Query parameters for the telemetry report.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TelemetryQuery {
    /// Trailing window in days; clamped server-side.
    pub days: Option<u32>,
}

/// Roll up direct-message telemetry for the staff dashboard.
#[utoipa::path(
    get,
    path = "/api/direct-telemetry",
    params(TelemetryQuery),
    responses(
        (status = 200, description = "Rolled-up telemetry", body = TelemetryReport),
        (status = 401, description = "Missing or invalid staff token"),
        (status = 403, description = "Staff access disabled or role missing")
    ),
    tags = ["staff"],
    operation_id = "directTelemetryReport"
)]
#[get("/api/direct-telemetry")]
pub async fn direct_telemetry(
    state: web::Data<HttpState>,
    req: HttpRequest,
    query: web::Query<TelemetryQuery>,
) -> ApiResult<web::Json<TelemetryReport>> {
    let _staff = require_staff(&state, &req).await?;
    let days = query.into_inner().days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let report = state.telemetry.report(days).await?;
    Ok(web::Json(report))
}
