//! Append-only, bounded, classified event log.

use crate::domain::{LogEntry, LogEventType, LogPriority};
use chrono::NaiveDate;

/// Appends one entry, assigning it the next id and truncating from the
/// oldest entry if the log exceeds `max_log_entries`.
pub fn append(
    log: &mut Vec<LogEntry>,
    next_id: &mut u64,
    event_type: LogEventType,
    priority: LogPriority,
    message: String,
    data: serde_json::Value,
    local_iso_time: String,
    date: NaiveDate,
    max_log_entries: usize,
) {
    let entry = LogEntry {
        id: *next_id,
        local_iso_time,
        event_type,
        priority,
        message,
        data,
        date,
    };
    *next_id += 1;
    log.push(entry);

    if log.len() > max_log_entries {
        let excess = log.len() - max_log_entries;
        log.drain(0..excess);
    }
}

/// Age-based cleanup, rate-limited to once per `log_cleanup_interval_hours`.
/// Returns whether cleanup actually ran this call.
pub fn maybe_cleanup(
    log: &mut Vec<LogEntry>,
    today: NaiveDate,
    last_cleanup_epoch_ms: Option<i64>,
    now_epoch_ms: i64,
    log_max_age_days: i64,
    log_cleanup_interval_hours: i64,
) -> Option<i64> {
    let due = match last_cleanup_epoch_ms {
        None => true,
        Some(last) => now_epoch_ms - last >= log_cleanup_interval_hours * 3_600_000,
    };
    if !due {
        return None;
    }

    let cutoff = today - chrono::Duration::days(log_max_age_days);
    log.retain(|entry| entry.date >= cutoff);
    Some(now_epoch_ms)
}

/// Daily summary fires at most once per local date, only in the
/// late-evening-to-early-morning window.
pub fn should_emit_daily_summary(
    today: NaiveDate,
    local_hour: u32,
    last_daily_summary_date: Option<NaiveDate>,
) -> bool {
    matches!(local_hour, 23 | 0 | 1) && last_daily_summary_date != Some(today)
}
