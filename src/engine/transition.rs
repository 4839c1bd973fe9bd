//! The five-state machine: priority overrides, hysteresis, and the default
//! per-state transition table.

use crate::config::EngineConfig;
use crate::domain::{ControllerState, DebounceRegistry, LogEventType, LogPriority, ValidInputs};
use crate::engine::debounce::{self, DebounceOutcome};
use chrono::{DateTime, Utc};
use serde_json::json;

/// One log entry produced as a side effect of a transition decision.
pub struct TransitionEvent {
    pub event_type: LogEventType,
    pub priority: LogPriority,
    pub message: String,
    pub data: serde_json::Value,
}

/// Everything the state machine needs besides the registry and config.
pub struct TransitionContext {
    pub current_state: ControllerState,
    pub inputs: ValidInputs,
    pub is_night: bool,
    pub target_kwh: f64,
    pub daily_export_kwh: f64,
    pub hws_on: bool,
}

/// Outcome of one tick's transition decision.
pub struct TransitionOutcome {
    pub next_state: ControllerState,
    pub reason: String,
    pub events: Vec<TransitionEvent>,
}

impl TransitionOutcome {
    fn unchanged(state: ControllerState, reason: impl Into<String>) -> Self {
        Self {
            next_state: state,
            reason: reason.into(),
            events: Vec::new(),
        }
    }
}

/// Evaluates the priority-ordered override rules, then (if none matched)
/// the default per-state transition table.
pub fn decide(
    ctx: &TransitionContext,
    config: &EngineConfig,
    registry: &mut DebounceRegistry,
    now: DateTime<Utc>,
) -> TransitionOutcome {
    use ControllerState::*;

    let target_reached = ctx.daily_export_kwh >= ctx.target_kwh;
    let excess_generation_w = ctx.inputs.excess_generation_w();
    let debounce_secs = (config.state_change_debounce_time_min * 60) as i64;

    // Rule 1: stale-generation protection.
    if ctx.current_state == ExportPriority
        && ctx.inputs.grid_power_w < -config.significant_export_threshold
        && ctx.inputs.generation_w < config.min_generation_for_export
    {
        return TransitionOutcome {
            next_state: ExportPriority,
            reason: "stale generation sensor: trusting grid meter over sticky PV reading"
                .to_string(),
            events: vec![TransitionEvent {
                event_type: LogEventType::DataProtection,
                priority: LogPriority::High,
                message: "grid export exceeds threshold while generation reads implausibly low"
                    .to_string(),
                data: json!({
                    "grid_power_w": ctx.inputs.grid_power_w,
                    "generation_w": ctx.inputs.generation_w,
                }),
            }],
        };
    }

    // Rule 2: battery-protection override, bypasses debounce entirely.
    if ctx.inputs.battery_soc_pct <= config.min_soc_threshold && ctx.inputs.battery_power_w < 0.0 {
        debounce::force_clear(registry);
        return TransitionOutcome {
            next_state: ExportPriority,
            reason: "battery protection override: discharging at or below minimum SOC"
                .to_string(),
            events: vec![TransitionEvent {
                event_type: LogEventType::BatteryProtection,
                priority: LogPriority::Critical,
                message: "forced EXPORT_PRIORITY to halt battery discharge".to_string(),
                data: json!({
                    "battery_soc_pct": ctx.inputs.battery_soc_pct,
                    "battery_power_w": ctx.inputs.battery_power_w,
                }),
            }],
        };
    }

    let sufficient_solar = ctx.inputs.generation_w >= config.min_generation_for_export
        || ctx.inputs.battery_power_w >= config.strong_charging_threshold;

    // Rule 3: under-target reset.
    if !target_reached && !ctx.is_night && sufficient_solar {
        if let Some(outcome) = request_export_priority(
            ctx,
            registry,
            now,
            debounce_secs,
            "under daily target with sufficient solar",
        ) {
            return outcome;
        }
    }

    // Rule 4: deep-shortfall reset (documented separately from rule 3, same target).
    if ctx.target_kwh > 0.0
        && (ctx.daily_export_kwh / ctx.target_kwh) < (config.export_target_percentage / 100.0)
        && ctx.inputs.battery_power_w >= config.strong_charging_threshold
        && !ctx.is_night
        && ctx.inputs.generation_w >= config.min_generation_for_export
    {
        if let Some(outcome) = request_export_priority(
            ctx,
            registry,
            now,
            debounce_secs,
            "deep shortfall against daily target while charging strongly",
        ) {
            return outcome;
        }
    }

    // Rule 5: hysteresis exit from EXPORT_PRIORITY.
    if ctx.current_state == ExportPriority
        && !ctx.is_night
        && ctx.inputs.generation_w < config.min_generation_to_stay_export
        && ctx.inputs.battery_power_w < config.battery_charging_threshold
        && ctx.inputs.battery_soc_pct > config.min_soc_threshold
    {
        match debounce::request(registry, ExportPriority, SelfConsume, now, debounce_secs) {
            DebounceOutcome::Started => {
                return TransitionOutcome {
                    next_state: ExportPriority,
                    reason: "debouncing exit to SELF_CONSUME: generation below stay threshold"
                        .to_string(),
                    events: vec![debounce_event(
                        "request started: EXPORT_PRIORITY -> SELF_CONSUME",
                    )],
                };
            }
            DebounceOutcome::Pending { elapsed_secs } => {
                return TransitionOutcome::unchanged(
                    ExportPriority,
                    format!(
                        "debouncing, {} s remaining",
                        debounce_secs - elapsed_secs
                    ),
                );
            }
            DebounceOutcome::Approved => {
                return TransitionOutcome {
                    next_state: SelfConsume,
                    reason: "debounce approved: exiting EXPORT_PRIORITY on low generation"
                        .to_string(),
                    events: vec![debounce_event("approved: EXPORT_PRIORITY -> SELF_CONSUME")],
                };
            }
        }
    }

    // Rule 6: default per-state transitions (no debounce).
    let (next_state, reason) = match ctx.current_state {
        ExportPriority => {
            if target_reached {
                (BatteryStorage, "daily export target reached")
            } else if ctx.inputs.generation_w < config.min_generation_for_export
                && ctx.inputs.battery_soc_pct > config.evening_self_consume_soc_threshold
                && !ctx.inputs.is_charging()
            {
                (SelfConsume, "evening: low generation, battery not charging")
            } else {
                (ExportPriority, "holding EXPORT_PRIORITY")
            }
        }
        BatteryStorage => {
            if ctx.inputs.battery_soc_pct >= config.max_soc_threshold
                && excess_generation_w > 0.8 * config.hws_power_rating
            {
                (LoadManagement, "battery full, excess generation available for HWS")
            } else if ctx.inputs.battery_soc_pct <= config.min_soc_threshold
                && !ctx.inputs.is_charging()
            {
                (SelfConsume, "at minimum SOC and not charging")
            } else if ctx.inputs.battery_power_w < 0.0 {
                (SelfConsume, "battery discharging")
            } else {
                (BatteryStorage, "holding BATTERY_STORAGE")
            }
        }
        LoadManagement => {
            let hws_release = ctx.hws_on
                && (ctx.inputs.battery_soc_pct
                    <= config.max_soc_threshold - config.hws_soc_drop_threshold
                    || ctx.inputs.generation_w < config.hws_generation_drop_threshold);
            if hws_release {
                if ctx.inputs.battery_soc_pct <= config.min_soc_threshold {
                    (SelfConsume, "HWS released, SOC low")
                } else {
                    (BatteryStorage, "HWS released, returning to storage")
                }
            } else {
                (LoadManagement, "holding LOAD_MANAGEMENT")
            }
        }
        SelfConsume => {
            if ctx.inputs.is_charging() && !target_reached {
                (ExportPriority, "charging again, target not yet reached")
            } else if ctx.inputs.is_charging() && target_reached {
                (BatteryStorage, "charging again, target already reached")
            } else {
                (SelfConsume, "holding SELF_CONSUME")
            }
        }
        SafeMode => (SafeMode, "remaining in SAFE_MODE pending operator recovery"),
    };

    TransitionOutcome::unchanged(next_state, reason.to_string())
}

fn debounce_event(message: &str) -> TransitionEvent {
    TransitionEvent {
        event_type: LogEventType::Debounce,
        priority: LogPriority::Normal,
        message: message.to_string(),
        data: serde_json::Value::Null,
    }
}

/// Shared plumbing for rules 3 and 4, which both request EXPORT_PRIORITY
/// through the debounce registry and differ only in log wording.
fn request_export_priority(
    ctx: &TransitionContext,
    registry: &mut DebounceRegistry,
    now: DateTime<Utc>,
    debounce_secs: i64,
    reason_prefix: &str,
) -> Option<TransitionOutcome> {
    use ControllerState::ExportPriority;

    if ctx.current_state == ExportPriority {
        return Some(TransitionOutcome::unchanged(
            ExportPriority,
            format!("already EXPORT_PRIORITY ({reason_prefix})"),
        ));
    }

    match debounce::request(registry, ctx.current_state, ExportPriority, now, debounce_secs) {
        DebounceOutcome::Started => Some(TransitionOutcome {
            next_state: ctx.current_state,
            reason: format!("debouncing to EXPORT_PRIORITY ({reason_prefix})"),
            events: vec![debounce_event(&format!(
                "request started: {:?} -> EXPORT_PRIORITY",
                ctx.current_state
            ))],
        }),
        DebounceOutcome::Pending { elapsed_secs } => Some(TransitionOutcome::unchanged(
            ctx.current_state,
            format!("debouncing, {} s remaining", debounce_secs - elapsed_secs),
        )),
        DebounceOutcome::Approved => Some(TransitionOutcome {
            next_state: ExportPriority,
            reason: format!("debounce approved ({reason_prefix})"),
            events: vec![debounce_event(&format!(
                "approved: {:?} -> EXPORT_PRIORITY",
                ctx.current_state
            ))],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidInputs;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn inputs(soc: f64, battery_power_w: f64, generation_w: f64, grid_power_w: f64) -> ValidInputs {
        ValidInputs {
            daily_export_wh: 0.0,
            grid_power_w,
            generation_w,
            battery_soc_pct: soc,
            battery_power_w,
            inverter_mode: 3,
        }
    }

    #[test]
    fn battery_protection_bypasses_debounce_in_one_tick() {
        let cfg = config();
        let mut registry = DebounceRegistry::new();
        let ctx = TransitionContext {
            current_state: ControllerState::BatteryStorage,
            inputs: inputs(22.0, -300.0, 0.0, 400.0),
            is_night: false,
            target_kwh: 23.5,
            daily_export_kwh: 5.0,
            hws_on: false,
        };
        let outcome = decide(&ctx, &cfg, &mut registry, Utc::now());
        assert_eq!(outcome.next_state, ControllerState::ExportPriority);
        assert!(registry.is_empty());
    }

    #[test]
    fn battery_protection_does_not_fire_at_exact_threshold_with_zero_power() {
        let cfg = config();
        let mut registry = DebounceRegistry::new();
        let ctx = TransitionContext {
            current_state: ControllerState::BatteryStorage,
            inputs: inputs(25.0, 0.0, 1000.0, -500.0),
            is_night: false,
            target_kwh: 23.5,
            daily_export_kwh: 20.0,
            hws_on: false,
        };
        let outcome = decide(&ctx, &cfg, &mut registry, Utc::now());
        assert_ne!(outcome.next_state, ControllerState::ExportPriority);
    }

    #[test]
    fn stale_generation_short_circuits_before_rule_six() {
        let cfg = config();
        let mut registry = DebounceRegistry::new();
        let ctx = TransitionContext {
            current_state: ControllerState::ExportPriority,
            inputs: inputs(60.0, 500.0, 100.0, -3500.0),
            is_night: false,
            target_kwh: 23.5,
            daily_export_kwh: 20.0,
            hws_on: false,
        };
        let outcome = decide(&ctx, &cfg, &mut registry, Utc::now());
        assert_eq!(outcome.next_state, ControllerState::ExportPriority);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type, LogEventType::DataProtection);
    }

    #[test]
    fn hysteresis_does_not_fire_above_stay_threshold() {
        let cfg = config();
        let mut registry = DebounceRegistry::new();
        let ctx = TransitionContext {
            current_state: ControllerState::ExportPriority,
            inputs: inputs(70.0, 80.0, 350.0, -100.0),
            is_night: false,
            target_kwh: 23.5,
            daily_export_kwh: 20.0,
            hws_on: false,
        };
        let outcome = decide(&ctx, &cfg, &mut registry, Utc::now());
        assert_eq!(outcome.next_state, ControllerState::ExportPriority);
        assert!(registry.is_empty());
    }

    #[test]
    fn default_table_moves_to_battery_storage_on_target_reached() {
        let cfg = config();
        let mut registry = DebounceRegistry::new();
        let ctx = TransitionContext {
            current_state: ControllerState::ExportPriority,
            inputs: inputs(60.0, 2000.0, 3000.0, -1500.0),
            is_night: false,
            target_kwh: 23.5,
            daily_export_kwh: 23.6,
            hws_on: false,
        };
        let outcome = decide(&ctx, &cfg, &mut registry, Utc::now());
        assert_eq!(outcome.next_state, ControllerState::BatteryStorage);
    }
}
