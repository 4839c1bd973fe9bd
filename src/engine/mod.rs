//! Orchestrates one tick: Validator -> TargetCalc -> Transition -> Actuator
//! -> PersistentStore, in that order, with no visibility into state beyond
//! the explicit read-decide-write sequence.

pub mod actuator;
pub mod debounce;
pub mod event_log;
pub mod target_calc;
pub mod transition;
pub mod validator;

use crate::config::EngineConfig;
use crate::domain::{
    Actions, Command, ControllerState, DailyRecord, DebugInfo, HwsEvent, LogEventType, LogPriority,
    Status, TickInputs, TimeProvider,
};
use crate::error::EngineError;
use crate::store::{PersistentStore, StoreError};
use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument};

pub struct Engine<S: PersistentStore> {
    config: EngineConfig,
    store: S,
    time: TimeProvider,
}

impl<S: PersistentStore> Engine<S> {
    pub fn new(config: EngineConfig, store: S) -> Self {
        let time = TimeProvider::from_hours(config.local_offset_hours);
        Self { config, store, time }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reads the current persisted aggregate without advancing the state
    /// machine — used by the read-only status surface.
    pub async fn snapshot(&self) -> Result<crate::store::EngineState, crate::store::StoreError> {
        self.store.load().await
    }

    /// Runs a single tick to completion. Never suspends mid-decision beyond
    /// the store's own async I/O: the decision sequence itself is
    /// synchronous and indivisible.
    #[instrument(skip(self, inputs), fields(enabled = inputs.enabled))]
    pub async fn tick(&self, inputs: TickInputs, now: DateTime<Utc>) -> Result<Command, EngineError> {
        if !inputs.enabled {
            return Ok(Command::disabled(self.time.now_local_at(now)));
        }

        let mut state = match self.store.load().await {
            Ok(state) => state,
            Err(StoreError::Serde(err)) => {
                // Unknown/unparseable persisted state (schema change, hand
                // edit, partial write that escaped atomic rename): treat as
                // first-run rather than fail the tick.
                let mut recovered = crate::store::EngineState::default();
                event_log::append(
                    &mut recovered.event_log,
                    &mut recovered.next_log_id,
                    LogEventType::System,
                    LogPriority::High,
                    format!("persisted state unreadable, resetting to EXPORT_PRIORITY: {err}"),
                    serde_json::Value::Null,
                    self.time.local_iso(now),
                    self.time.local_date(now),
                    self.config.max_log_entries,
                );
                recovered
            }
            Err(err) => return Err(err.into()),
        };

        let valid = match validator::validate(inputs) {
            Ok(valid) => valid,
            Err(errors) => {
                event_log::append(
                    &mut state.event_log,
                    &mut state.next_log_id,
                    LogEventType::Error,
                    LogPriority::High,
                    format!("tick input validation failed: {errors}"),
                    serde_json::to_value(&errors.0).unwrap_or_default(),
                    self.time.local_iso(now),
                    self.time.local_date(now),
                    self.config.max_log_entries,
                );
                self.store.store(&state).await?;
                return Ok(degraded_command(self.time.now_local_at(now)));
            }
        };

        let today = self.time.local_date(now);

        let target_result = target_calc::evaluate(
            &state.export_history,
            &self.config.monthly_targets,
            today.month(),
            self.config.catchup_days,
            now,
        );
        if target_result.adjustment_reason != crate::domain::AdjustmentReason::InsufficientHistory {
            state.target_cache = Some(target_result.clone());
        }

        let already_recorded_today = state
            .export_history
            .iter()
            .any(|record| record.date == today);
        let target_kwh_for_today = if already_recorded_today {
            state
                .export_history
                .iter()
                .find(|record| record.date == today)
                .map(|record| record.target_kwh)
                .unwrap_or(target_result.adjusted_target_kwh)
        } else {
            let target_kwh = target_result.adjusted_target_kwh;
            state.export_history.push(DailyRecord {
                date: today,
                export_kwh: valid.daily_export_kwh(),
                target_kwh,
                recorded_at: now,
            });
            state.export_history.sort_by_key(|record| record.date);
            if state.export_history.len() > 30 {
                let excess = state.export_history.len() - 30;
                state.export_history.drain(0..excess);
            }
            target_kwh
        };

        let is_night =
            self.time
                .is_night(now, self.config.night_start_hour, self.config.night_end_hour);
        let daily_export_kwh = valid.daily_export_kwh();

        let ctx = transition::TransitionContext {
            current_state: state.current_state,
            inputs: valid,
            is_night,
            target_kwh: target_kwh_for_today,
            daily_export_kwh,
            hws_on: state.hws_on,
        };
        let outcome = transition::decide(&ctx, &self.config, &mut state.debounce_registry, now);

        let mut battery_protection_active = false;
        for event in &outcome.events {
            if event.event_type == LogEventType::BatteryProtection {
                battery_protection_active = true;
            }
            event_log::append(
                &mut state.event_log,
                &mut state.next_log_id,
                event.event_type,
                event.priority,
                event.message.clone(),
                event.data.clone(),
                self.time.local_iso(now),
                today,
                self.config.max_log_entries,
            );
        }

        if outcome.next_state != state.current_state {
            event_log::append(
                &mut state.event_log,
                &mut state.next_log_id,
                LogEventType::StateChange,
                LogPriority::Normal,
                format!(
                    "{:?} -> {:?}: {}",
                    state.current_state, outcome.next_state, outcome.reason
                ),
                serde_json::Value::Null,
                self.time.local_iso(now),
                today,
                self.config.max_log_entries,
            );
        }
        state.current_state = outcome.next_state;

        let (hws_on_now, hws_event) = if state.current_state == ControllerState::LoadManagement {
            let decision = actuator::decide_hws(
                &self.config,
                &ctx.inputs,
                state.hws_on,
                state.hws_last_off_epoch_ms,
                now,
            );
            state.hws_on = decision.hws_on;
            state.hws_last_off_epoch_ms = decision.hws_last_off_epoch_ms;
            (decision.hws_on, decision.event)
        } else if state.hws_on {
            // Invariant: hws_on implies LOAD_MANAGEMENT. Leaving the state
            // via any path always turns HWS off.
            state.hws_on = false;
            state.hws_last_off_epoch_ms = Some(now.timestamp_millis());
            (false, Some(HwsEvent::TurnedOff))
        } else {
            (false, None)
        };
        if let Some(event) = hws_event {
            event_log::append(
                &mut state.event_log,
                &mut state.next_log_id,
                LogEventType::HwsEvent,
                LogPriority::Normal,
                format!("HWS {event}"),
                serde_json::json!({ "event": event.to_string() }),
                self.time.local_iso(now),
                today,
                self.config.max_log_entries,
            );
        }

        let actions = actuator::decide_actions(state.current_state, hws_on_now);

        if event_log::should_emit_daily_summary(
            today,
            self.time.local_hour(now),
            state.last_daily_summary_date,
        ) {
            event_log::append(
                &mut state.event_log,
                &mut state.next_log_id,
                LogEventType::DailySummary,
                LogPriority::Low,
                format!(
                    "daily export {daily_export_kwh:.2} kWh against target {target_kwh_for_today:.2} kWh"
                ),
                serde_json::json!({
                    "export_kwh": daily_export_kwh,
                    "target_kwh": target_kwh_for_today,
                }),
                self.time.local_iso(now),
                today,
                self.config.max_log_entries,
            );
            state.last_daily_summary_date = Some(today);
        }

        if let Some(ran_at) = event_log::maybe_cleanup(
            &mut state.event_log,
            today,
            state.last_log_cleanup_epoch_ms,
            now.timestamp_millis(),
            self.config.log_max_age_days,
            self.config.log_cleanup_interval_hours,
        ) {
            state.last_log_cleanup_epoch_ms = Some(ran_at);
        }

        self.store.store(&state).await?;

        info!(
            state = %state.current_state,
            target_reached = daily_export_kwh >= target_kwh_for_today,
            "tick complete"
        );

        Ok(Command {
            timestamp: self.time.now_local_at(now),
            current_state: state.current_state.to_string(),
            actions,
            status: Status {
                export_target_kwh: target_kwh_for_today,
                daily_export_kwh,
                target_reached: daily_export_kwh >= target_kwh_for_today,
                battery_soc_pct: ctx.inputs.battery_soc_pct.clamp(0.0, 100.0),
                excess_generation_w: ctx.inputs.excess_generation_w(),
                battery_power_w: ctx.inputs.battery_power_w,
                battery_protection_active,
            },
            debug: DebugInfo {
                state_reason: outcome.reason,
                next_check: self
                    .time
                    .now_local_at(now + chrono::Duration::seconds(self.config.tick_seconds as i64)),
            },
        })
    }
}

fn degraded_command(now: DateTime<chrono::FixedOffset>) -> Command {
    Command {
        timestamp: now,
        current_state: "VALIDATION_FAILED".to_string(),
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
            state_reason: "tick input validation failed; state machine not advanced".to_string(),
            next_check: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn enabled_inputs() -> TickInputs {
        TickInputs {
            daily_export_wh: 5_000.0,
            grid_power_w: -1500.0,
            generation_w: 2500.0,
            battery_soc_pct: 60.0,
            battery_power_w: 500.0,
            inverter_mode: 3,
            enabled: true,
        }
    }

    fn test_engine() -> Engine<MemStore> {
        Engine::new(EngineConfig::default(), MemStore::default())
    }

    #[tokio::test]
    async fn disabled_master_switch_skips_state_machine() {
        let engine = test_engine();
        let mut inputs = enabled_inputs();
        inputs.enabled = false;
        let command = engine.tick(inputs, Utc::now()).await.unwrap();
        assert_eq!(command.current_state, "DISABLED");
        assert!(!command.actions.set_ess_mode);
    }

    #[tokio::test]
    async fn validation_failure_does_not_advance_state() {
        let engine = test_engine();
        let mut inputs = enabled_inputs();
        inputs.battery_soc_pct = 500.0;
        let command = engine.tick(inputs, Utc::now()).await.unwrap();
        assert_eq!(command.current_state, "VALIDATION_FAILED");
        assert_eq!(command.actions.inverter_mode, 3);
    }

    #[tokio::test]
    async fn battery_protection_shows_up_in_status() {
        let engine = test_engine();
        let mut inputs = enabled_inputs();
        inputs.battery_soc_pct = 20.0;
        inputs.battery_power_w = -500.0;
        let command = engine.tick(inputs, Utc::now()).await.unwrap();
        assert!(command.status.battery_protection_active);
        assert_eq!(command.current_state, "ExportPriority");
    }

    #[tokio::test]
    async fn history_entry_is_written_once_per_day_and_not_overwritten() {
        let engine = test_engine();
        let now = Utc::now();
        engine.tick(enabled_inputs(), now).await.unwrap();

        let mut later_inputs = enabled_inputs();
        later_inputs.daily_export_wh = 8_000.0;
        engine.tick(later_inputs, now + chrono::Duration::hours(2)).await.unwrap();

        let state = engine.store.load().await.unwrap();
        assert_eq!(state.export_history.len(), 1);
        assert_eq!(state.export_history[0].export_kwh, 5.0);
    }

    /// A store whose first `load` simulates an unparseable persisted blob.
    struct CorruptOnceStore {
        loaded: std::sync::atomic::AtomicBool,
        inner: MemStore,
    }

    #[async_trait::async_trait]
    impl PersistentStore for CorruptOnceStore {
        async fn load(&self) -> Result<crate::store::EngineState, StoreError> {
            if !self.loaded.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let err = serde_json::from_str::<crate::store::EngineState>("not json").unwrap_err();
                return Err(StoreError::Serde(err));
            }
            self.inner.load().await
        }

        async fn store(&self, state: &crate::store::EngineState) -> Result<(), StoreError> {
            self.inner.store(state).await
        }
    }

    #[tokio::test]
    async fn unparseable_persisted_state_resets_to_export_priority_and_logs_system_event() {
        let store = CorruptOnceStore {
            loaded: std::sync::atomic::AtomicBool::new(false),
            inner: MemStore::default(),
        };
        let engine = Engine::new(EngineConfig::default(), store);

        let command = engine.tick(enabled_inputs(), Utc::now()).await.unwrap();
        assert_eq!(command.current_state, "ExportPriority");

        let state = engine.store.load().await.unwrap();
        assert!(state
            .event_log
            .iter()
            .any(|e| e.event_type == LogEventType::System && e.priority == LogPriority::High));
    }
}
