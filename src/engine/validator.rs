//! Bounds-checks raw tick inputs before anything downstream sees them.

use crate::domain::{FieldViolation, TickInputs, ValidInputs, ValidationErrors};

const SOC_MIN: f64 = -5.0;
const SOC_MAX: f64 = 105.0;
const POWER_ABS_MAX: f64 = 50_000.0;
const EXPORT_KWH_MIN: f64 = 0.0;
const EXPORT_KWH_MAX: f64 = 200.0;

/// Checks every field independently and collects every violation, rather
/// than short-circuiting on the first one.
pub fn validate(inputs: TickInputs) -> Result<ValidInputs, ValidationErrors> {
    let mut violations = Vec::new();

    if inputs.battery_soc_pct < SOC_MIN || inputs.battery_soc_pct > SOC_MAX {
        violations.push(FieldViolation {
            field: "battery_soc_pct",
            value: inputs.battery_soc_pct,
            message: format!("soc out of bounds [{SOC_MIN}, {SOC_MAX}]"),
        });
    }
    if inputs.generation_w.abs() > POWER_ABS_MAX {
        violations.push(FieldViolation {
            field: "generation_w",
            value: inputs.generation_w,
            message: format!("|generation_w| exceeds {POWER_ABS_MAX}"),
        });
    }
    if inputs.grid_power_w.abs() > POWER_ABS_MAX {
        violations.push(FieldViolation {
            field: "grid_power_w",
            value: inputs.grid_power_w,
            message: format!("|grid_power_w| exceeds {POWER_ABS_MAX}"),
        });
    }
    if inputs.battery_power_w.abs() > POWER_ABS_MAX {
        violations.push(FieldViolation {
            field: "battery_power_w",
            value: inputs.battery_power_w,
            message: format!("|battery_power_w| exceeds {POWER_ABS_MAX}"),
        });
    }
    let daily_export_kwh = inputs.daily_export_wh / 1000.0;
    if daily_export_kwh < EXPORT_KWH_MIN || daily_export_kwh > EXPORT_KWH_MAX {
        violations.push(FieldViolation {
            field: "daily_export_wh",
            value: inputs.daily_export_wh,
            message: format!("daily export of {daily_export_kwh} kWh out of bounds [{EXPORT_KWH_MIN}, {EXPORT_KWH_MAX}]"),
        });
    }

    if !violations.is_empty() {
        return Err(ValidationErrors(violations));
    }

    Ok(ValidInputs {
        daily_export_wh: inputs.daily_export_wh,
        grid_power_w: inputs.grid_power_w,
        generation_w: inputs.generation_w,
        battery_soc_pct: inputs.battery_soc_pct,
        battery_power_w: inputs.battery_power_w,
        inverter_mode: inputs.inverter_mode,
    })
}
