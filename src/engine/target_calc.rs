//! Rolling-window adaptive daily export target.

use crate::domain::{AdaptiveTargetResult, AdjustmentReason, DailyRecord};
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;

const FALLBACK_MONTHLY_TARGET_KWH: f64 = 25.0;
const MIN_HISTORY_FOR_ADJUSTMENT: usize = 3;
const UNDER_PERFORMING_RATIO: f64 = 0.9;
const OVER_PERFORMING_RATIO: f64 = 1.1;
const OVER_PERFORMING_COOLDOWN_FRACTION: f64 = 0.3;
const UNDER_PERFORMING_CAP_MULTIPLIER: f64 = 2.0;
const OVER_PERFORMING_FLOOR_MULTIPLIER: f64 = 0.8;

/// Evaluates the adaptive target from the current rolling window.
///
/// `history` is assumed sorted ascending by date, as the `PersistentStore`
/// contract guarantees. `today` supplies the month used to look up the
/// seasonal schedule and is stamped onto the result.
pub fn evaluate(
    history: &[DailyRecord],
    monthly_targets: &HashMap<u32, f64>,
    today_month: u32,
    catchup_days: u32,
    now: DateTime<Utc>,
) -> AdaptiveTargetResult {
    let static_monthly_target_kwh = monthly_targets
        .get(&today_month)
        .copied()
        .unwrap_or(FALLBACK_MONTHLY_TARGET_KWH);

    let n = history.len().min(30);
    let window = &history[history.len() - n..];
    let rolling_export_total_kwh: f64 = window.iter().map(|r| r.export_kwh).sum();

    if n < MIN_HISTORY_FOR_ADJUSTMENT {
        return AdaptiveTargetResult {
            base_target_kwh: static_monthly_target_kwh,
            static_monthly_target_kwh,
            performance_ratio: 1.0,
            adjusted_target_kwh: static_monthly_target_kwh,
            has_mixed_months: false,
            rolling_days: n,
            rolling_export_total_kwh,
            adjustment_reason: AdjustmentReason::InsufficientHistory,
            computed_at: now,
        };
    }

    let base_target_kwh = rolling_export_total_kwh / n as f64;
    let performance_ratio = base_target_kwh / static_monthly_target_kwh;

    let (adjusted_target_kwh, adjustment_reason) = if performance_ratio < UNDER_PERFORMING_RATIO {
        let total_deficit = static_monthly_target_kwh * n as f64 - rolling_export_total_kwh;
        let catchup_per_day = total_deficit / catchup_days as f64;
        let adjusted = (static_monthly_target_kwh + catchup_per_day)
            .min(static_monthly_target_kwh * UNDER_PERFORMING_CAP_MULTIPLIER);
        (adjusted, AdjustmentReason::UnderPerforming)
    } else if performance_ratio > OVER_PERFORMING_RATIO {
        let cooldown =
            (base_target_kwh - static_monthly_target_kwh) * OVER_PERFORMING_COOLDOWN_FRACTION;
        let adjusted = (static_monthly_target_kwh - cooldown)
            .max(static_monthly_target_kwh * OVER_PERFORMING_FLOOR_MULTIPLIER);
        (adjusted, AdjustmentReason::OverPerforming)
    } else {
        (static_monthly_target_kwh, AdjustmentReason::OnTarget)
    };

    let has_mixed_months = window
        .iter()
        .map(|r| r.date.month())
        .collect::<std::collections::HashSet<_>>()
        .len()
        > 1;

    AdaptiveTargetResult {
        base_target_kwh,
        static_monthly_target_kwh,
        performance_ratio,
        adjusted_target_kwh,
        has_mixed_months,
        rolling_days: n,
        rolling_export_total_kwh,
        adjustment_reason,
        computed_at: now,
    }
}
