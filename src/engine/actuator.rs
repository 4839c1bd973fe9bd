//! Pure state -> command mapping, plus the HWS (hot-water) sub-controller.

use crate::config::EngineConfig;
use crate::domain::{Actions, ControllerState, HwsEvent, ValidInputs};
use chrono::{DateTime, Utc};

/// Decision of the HWS sub-controller for one tick.
pub struct HwsDecision {
    pub hws_on: bool,
    pub event: Option<HwsEvent>,
    pub hws_last_off_epoch_ms: Option<i64>,
}

/// Runs the HWS sub-controller; only meaningful when `next_state ==
/// LOAD_MANAGEMENT`, but safe to call unconditionally (it will simply hold
/// `prior_hws_on == false` off when not in LOAD_MANAGEMENT, see
/// [`decide_actions`]).
pub fn decide_hws(
    config: &EngineConfig,
    inputs: &ValidInputs,
    prior_hws_on: bool,
    hws_last_off_epoch_ms: Option<i64>,
    now: DateTime<Utc>,
) -> HwsDecision {
    let cooldown_expired = match hws_last_off_epoch_ms {
        None => true,
        Some(last_off_ms) => {
            let elapsed_ms = now.timestamp_millis() - last_off_ms;
            elapsed_ms >= (config.hws_cooldown_period_min as i64) * 60_000
        }
    };

    let soc_headroom_ok =
        inputs.battery_soc_pct > config.max_soc_threshold - config.hws_soc_drop_threshold;
    let generation_ok = inputs.generation_w >= config.hws_generation_drop_threshold;

    if !prior_hws_on && cooldown_expired && soc_headroom_ok && generation_ok {
        return HwsDecision {
            hws_on: true,
            event: Some(HwsEvent::TurnedOn),
            hws_last_off_epoch_ms,
        };
    }

    let should_turn_off = prior_hws_on
        && (inputs.battery_soc_pct <= config.max_soc_threshold - config.hws_soc_drop_threshold
            || inputs.generation_w < config.hws_generation_drop_threshold);
    if should_turn_off {
        return HwsDecision {
            hws_on: false,
            event: Some(HwsEvent::TurnedOff),
            hws_last_off_epoch_ms: Some(now.timestamp_millis()),
        };
    }

    HwsDecision {
        hws_on: prior_hws_on,
        event: None,
        hws_last_off_epoch_ms,
    }
}

/// Maps the decided next state (and HWS sub-decision) to the actuation
/// record. `hws` is ignored outside LOAD_MANAGEMENT: HWS is only ever
/// enabled while the state machine is in that state, per invariant.
pub fn decide_actions(next_state: ControllerState, hws_on_in_load_management: bool) -> Actions {
    use ControllerState::*;
    match next_state {
        ExportPriority => Actions {
            set_ess_mode: false,
            grid_setpoint_w: None,
            enable_hws: false,
            inverter_mode: 3,
        },
        BatteryStorage => Actions {
            set_ess_mode: true,
            grid_setpoint_w: Some(0),
            enable_hws: false,
            inverter_mode: 3,
        },
        LoadManagement => Actions {
            set_ess_mode: true,
            grid_setpoint_w: Some(0),
            enable_hws: hws_on_in_load_management,
            inverter_mode: 3,
        },
        SelfConsume => Actions {
            set_ess_mode: true,
            grid_setpoint_w: Some(0),
            enable_hws: false,
            inverter_mode: 3,
        },
        SafeMode => Actions {
            set_ess_mode: false,
            grid_setpoint_w: None,
            enable_hws: false,
            inverter_mode: 4,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn inputs(soc: f64, generation_w: f64) -> ValidInputs {
        ValidInputs {
            daily_export_wh: 0.0,
            grid_power_w: -2600.0,
            generation_w,
            battery_soc_pct: soc,
            battery_power_w: 0.0,
            inverter_mode: 3,
        }
    }

    #[test]
    fn hws_turns_on_when_cooldown_expired_and_headroom_available() {
        let cfg = config();
        let now = Utc::now();
        let long_ago = now.timestamp_millis() - 3_600_000;
        let decision = decide_hws(&cfg, &inputs(99.0, 4000.0), false, Some(long_ago), now);
        assert!(decision.hws_on);
        assert_eq!(decision.event, Some(HwsEvent::TurnedOn));
    }

    #[test]
    fn hws_stays_off_during_cooldown() {
        let cfg = config();
        let now = Utc::now();
        let recently = now.timestamp_millis() - 60_000;
        let decision = decide_hws(&cfg, &inputs(99.0, 4000.0), false, Some(recently), now);
        assert!(!decision.hws_on);
        assert_eq!(decision.event, None);
    }

    #[test]
    fn hws_turns_off_when_generation_drops() {
        let cfg = config();
        let now = Utc::now();
        let decision = decide_hws(&cfg, &inputs(99.0, 800.0), true, None, now);
        assert!(!decision.hws_on);
        assert_eq!(decision.event, Some(HwsEvent::TurnedOff));
        assert!(decision.hws_last_off_epoch_ms.is_some());
    }

    #[test]
    fn safe_mode_actions_force_inverter_off() {
        let actions = decide_actions(ControllerState::SafeMode, false);
        assert!(!actions.set_ess_mode);
        assert_eq!(actions.inverter_mode, 4);
        assert_eq!(actions.grid_setpoint_w, None);
    }

    #[test]
    fn load_management_enables_hws_only_when_sub_controller_says_so() {
        let actions = decide_actions(ControllerState::LoadManagement, true);
        assert!(actions.enable_hws);
        let actions = decide_actions(ControllerState::LoadManagement, false);
        assert!(!actions.enable_hws);
    }
}
