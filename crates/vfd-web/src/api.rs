//! REST handlers for the `/vfds` prefix (§6) and the ambient `/health`
//! endpoint (§7a).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use vfd_common::error::GatewayError;
use vfd_common::types::{DriveMode, DriveState};
use vfd_core::DriveSummary;

use crate::state::AppState;

/// Maps the core's error taxonomy onto the status codes of §7. A single
/// adapter point so handlers never string-match on error variants.
pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            GatewayError::UnknownDrive(_) | GatewayError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
            GatewayError::BusBusy => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UnsupportedModel(_)
            | GatewayError::Transport(_)
            | GatewayError::NotInitialized => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: true, message: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: bool,
    message: String,
}

/// `GET /health`. Always available, independent of bus state.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        bus_initialized: state.core.arbiter().is_initialized().await,
        drive_count: state.core.registry().ids_in_order().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    bus_initialized: bool,
    drive_count: usize,
}

/// `GET /vfds/` — list drives without state.
pub async fn list_drives(State(state): State<AppState>) -> Json<Vec<DriveSummary>> {
    Json(state.core.registry().summaries())
}

/// `GET /vfds/{id}/state`.
pub async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DriveState>, ApiError> {
    state
        .core
        .registry()
        .get_state(&id)
        .map(Json)
        .ok_or_else(|| ApiError(GatewayError::UnknownDrive(id)))
}

#[derive(Serialize)]
pub struct ReadRegistersResponse {
    error: bool,
    registers: Vec<u16>,
}

/// `GET /vfds/{id}/read/{code}/{n}`.
pub async fn read_registers(
    State(state): State<AppState>,
    Path((id, code, n)): Path<(String, String, u16)>,
) -> Result<Json<ReadRegistersResponse>, ApiError> {
    let registers = state.core.commands().read_registers(&id, &code, n).await?;
    Ok(Json(ReadRegistersResponse { error: false, registers }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    error: bool,
    message: &'static str,
}

/// `GET /vfds/{id}/clear_alarm`.
pub async fn clear_alarm(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = state.core.commands().clear_alarm(&id).await;
    record_outcome(&state, &result);
    result?;
    Ok(Json(MessageResponse { error: false, message: "Alarm cleared" }))
}

#[derive(Deserialize)]
pub struct DriveModeBody {
    drive_mode: DriveMode,
}

/// `POST /vfds/{id}/drive_mode`.
pub async fn set_drive_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DriveModeBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = state.core.commands().set_drive_mode(&id, body.drive_mode).await;
    record_outcome(&state, &result);
    result?;
    Ok(Json(MessageResponse { error: false, message: "Drive mode set" }))
}

#[derive(Deserialize)]
pub struct FrequencyBody {
    frequency: f64,
}

/// `POST /vfds/{id}/frequency`.
pub async fn set_frequency(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FrequencyBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = state.core.commands().set_frequency(&id, body.frequency).await;
    record_outcome(&state, &result);
    result?;
    Ok(Json(MessageResponse { error: false, message: "Frequency set" }))
}

fn record_outcome<T>(state: &AppState, result: &Result<T, GatewayError>) {
    match result {
        Ok(_) => state.metrics.record_command("ok"),
        Err(GatewayError::BusBusy) => {
            state.metrics.record_command("error");
            state.metrics.record_bus_busy();
        }
        Err(_) => state.metrics.record_command("error"),
    }
}
