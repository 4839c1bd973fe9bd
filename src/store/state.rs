//! The single aggregate persisted by a [`super::PersistentStore`].

use crate::domain::{AdaptiveTargetResult, ControllerState, DailyRecord, DebounceRegistry, LogEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Everything the engine needs to recover across ticks and process
/// restarts. Persisted as a single JSON blob — see [`super::FileStore`].
///
/// `energy_management_enabled` is deliberately absent: it is a volatile
/// master switch supplied fresh on every tick's `TickInputs`, never
/// persisted, per the external-interfaces contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub current_state: ControllerState,
    pub hws_on: bool,
    pub hws_last_off_epoch_ms: Option<i64>,
    pub debounce_registry: DebounceRegistry,
    pub target_cache: Option<AdaptiveTargetResult>,
    pub export_history: Vec<DailyRecord>,
    pub event_log: Vec<LogEntry>,
    pub next_log_id: u64,
    pub last_daily_summary_date: Option<NaiveDate>,
    pub last_log_cleanup_epoch_ms: Option<i64>,
}

impl Default for EngineState {
    /// First-run state, and also what `Engine::tick` recovers to when the
    /// persisted blob exists but fails to deserialize (see
    /// `engine::Engine::tick`'s handling of `StoreError::Serde`).
    fn default() -> Self {
        Self {
            current_state: ControllerState::ExportPriority,
            hws_on: false,
            hws_last_off_epoch_ms: None,
            debounce_registry: DebounceRegistry::new(),
            target_cache: None,
            export_history: Vec::new(),
            event_log: Vec::new(),
            next_log_id: 0,
            last_daily_summary_date: None,
            last_log_cleanup_epoch_ms: None,
        }
    }
}
