//! Core data types shared by every engine component.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// One of the five operating states of the decision engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ControllerState {
    ExportPriority,
    BatteryStorage,
    LoadManagement,
    SelfConsume,
    SafeMode,
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState::ExportPriority
    }
}

/// Raw telemetry for a single tick, as handed over by the (out-of-scope)
/// ingestion collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickInputs {
    pub daily_export_wh: f64,
    pub grid_power_w: f64,
    pub generation_w: f64,
    pub battery_soc_pct: f64,
    pub battery_power_w: f64,
    pub inverter_mode: i32,
    pub enabled: bool,
}

/// `TickInputs` that passed bounds checking, carrying derived convenience
/// fields used throughout the transition rules.
#[derive(Debug, Clone, Copy)]
pub struct ValidInputs {
    pub daily_export_wh: f64,
    pub grid_power_w: f64,
    pub generation_w: f64,
    pub battery_soc_pct: f64,
    pub battery_power_w: f64,
    pub inverter_mode: i32,
}

impl ValidInputs {
    pub fn daily_export_kwh(&self) -> f64 {
        self.daily_export_wh / 1000.0
    }

    pub fn is_charging(&self) -> bool {
        self.battery_power_w > 0.0
    }

    pub fn is_discharging(&self) -> bool {
        self.battery_power_w < 0.0
    }

    /// `max(0, -grid_power_w)` — the portion of generation neither consumed
    /// nor imported, i.e. pushed to the grid right now.
    pub fn excess_generation_w(&self) -> f64 {
        (-self.grid_power_w).max(0.0)
    }
}

/// A named field that failed validation, with the offending value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub value: f64,
    pub message: String,
}

/// Non-empty on validation failure; callers degrade to a SAFE_MODE-shaped
/// command without advancing the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("tick input validation failed: {0:?}")]
pub struct ValidationErrors(pub Vec<FieldViolation>);

/// One day's export performance, kept in the 30-day rolling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub export_kwh: f64,
    pub target_kwh: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Reason the adjusted target deviates from the static monthly figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum AdjustmentReason {
    UnderPerforming,
    OverPerforming,
    OnTarget,
    InsufficientHistory,
}

/// Output of the adaptive target calculator, cached across ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveTargetResult {
    pub base_target_kwh: f64,
    pub static_monthly_target_kwh: f64,
    pub performance_ratio: f64,
    pub adjusted_target_kwh: f64,
    pub has_mixed_months: bool,
    pub rolling_days: usize,
    pub rolling_export_total_kwh: f64,
    pub adjustment_reason: AdjustmentReason,
    pub computed_at: DateTime<Utc>,
}

/// Directed transition request tracked by the debounce registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebounceKey {
    pub from: ControllerState,
    pub to: ControllerState,
}

/// First-request timestamps for pending debounced transitions.
pub type DebounceRegistry = HashMap<DebounceKey, DateTime<Utc>>;

/// Classification of an event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum LogEventType {
    StateChange,
    BatteryProtection,
    HwsEvent,
    Debounce,
    DataProtection,
    DailySummary,
    PerformanceAlert,
    SystemInfo,
    System,
    Error,
    Warning,
}

/// Severity of an event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum LogPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// One append-only event-log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub local_iso_time: String,
    pub event_type: LogEventType,
    pub priority: LogPriority,
    pub message: String,
    pub data: serde_json::Value,
    pub date: NaiveDate,
}

/// HWS (hot-water-system) activation event subtype, carried in `LogEntry::data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum HwsEvent {
    TurnedOn,
    TurnedOff,
}

/// Actuation commands returned to the (out-of-scope) transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actions {
    pub set_ess_mode: bool,
    pub grid_setpoint_w: Option<i64>,
    pub enable_hws: bool,
    pub inverter_mode: i32,
}

/// Read-only status block of the tick output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub export_target_kwh: f64,
    pub daily_export_kwh: f64,
    pub target_reached: bool,
    pub battery_soc_pct: f64,
    pub excess_generation_w: f64,
    pub battery_power_w: f64,
    pub battery_protection_active: bool,
}

/// Debug block of the tick output — human-readable, not load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub state_reason: String,
    pub next_check: DateTime<FixedOffset>,
}

/// The full per-tick output handed to the transport collaborator.
///
/// `timestamp` and `debug.next_check` are local time with the configured
/// fixed offset, per the external-interfaces contract — not UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub timestamp: DateTime<FixedOffset>,
    pub current_state: String,
    pub actions: Actions,
    pub status: Status,
    pub debug: DebugInfo,
}

impl Command {
    /// The `energy_management_enabled == false` output shape (spec.md §6).
    pub fn disabled(now: DateTime<FixedOffset>) -> Self {
        Self {
            timestamp: now,
            current_state: "DISABLED".to_string(),
            actions: Actions {
                set_ess_mode: false,
                grid_setpoint_w: None,
                enable_hws: false,
                inverter_mode: 3,
            },
            status: Status {
                export_target_kwh: 0.0,
                daily_export_kwh: 0.0,
                target_reached: false,
                battery_soc_pct: 0.0,
                excess_generation_w: 0.0,
                battery_power_w: 0.0,
                battery_protection_active: false,
            },
            debug: DebugInfo {
                state_reason: "energy management disabled".to_string(),
                next_check: now,
            },
        }
    }
}
