use axum::extract::State;
use serde::Serialize;

use super::AppState;
use crate::api::{error::ApiError, response::ApiResponse};
use crate::domain::{AdaptiveTargetResult, Command, DailyRecord};

/// GET /api/v1/status response body.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    current_state: String,
    last_command: Option<Command>,
    target: Option<AdaptiveTargetResult>,
    history: Vec<DailyRecord>,
    event_log_len: usize,
}

/// GET /api/v1/status — last command and a snapshot of the persisted
/// target/history, read-only.
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<ApiResponse<SystemStatus>, ApiError> {
    let snapshot = state.engine.snapshot().await?;
    let last_command = state.last_command.read().await.clone();

    Ok(ApiResponse::success(SystemStatus {
        current_state: snapshot.current_state.to_string(),
        last_command,
        target: snapshot.target_cache,
        history: snapshot.export_history,
        event_log_len: snapshot.event_log.len(),
    }))
}
