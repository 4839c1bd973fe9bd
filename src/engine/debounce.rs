//! Anti-oscillation debounce registry for requested state transitions.

use crate::domain::{ControllerState, DebounceKey, DebounceRegistry};
use chrono::{DateTime, Utc};

/// Result of requesting a directed transition through the debounce registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebounceOutcome {
    /// First request this tick; state does not change yet.
    Started,
    /// A request is already pending and has not aged long enough.
    Pending { elapsed_secs: i64 },
    /// The request has aged past the debounce window; state may change.
    Approved,
}

/// Requests a transition `from -> to`, consulting and mutating `registry`.
///
/// Per the registry contract, an approved transition wipes every other
/// pending entry — an approved change invalidates any other candidate that
/// was mid-flight.
pub fn request(
    registry: &mut DebounceRegistry,
    from: ControllerState,
    to: ControllerState,
    now: DateTime<Utc>,
    debounce_duration_secs: i64,
) -> DebounceOutcome {
    debug_assert_ne!(from, to, "debounce registry never tracks a self-transition");
    let key = DebounceKey { from, to };

    match registry.get(&key).copied() {
        None => {
            registry.insert(key, now);
            DebounceOutcome::Started
        }
        Some(first_requested_at) => {
            let elapsed_secs = (now - first_requested_at).num_seconds();
            if elapsed_secs >= debounce_duration_secs {
                registry.clear();
                DebounceOutcome::Approved
            } else {
                DebounceOutcome::Pending { elapsed_secs }
            }
        }
    }
}

/// Forced transitions (e.g. the battery-protection override) bypass
/// debouncing entirely and invalidate whatever was pending.
pub fn force_clear(registry: &mut DebounceRegistry) {
    registry.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(
            chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Utc,
        ) + chrono::Duration::seconds(seconds)
    }

    #[test]
    fn first_request_starts_and_does_not_approve() {
        let mut registry = DebounceRegistry::new();
        let outcome = request(&mut registry, SelfConsume, ExportPriority, at(0), 300);
        assert_eq!(outcome, DebounceOutcome::Started);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_request_before_window_stays_pending() {
        let mut registry = DebounceRegistry::new();
        request(&mut registry, SelfConsume, ExportPriority, at(0), 300);
        let outcome = request(&mut registry, SelfConsume, ExportPriority, at(240), 300);
        assert_eq!(outcome, DebounceOutcome::Pending { elapsed_secs: 240 });
    }

    #[test]
    fn request_past_window_is_approved_and_clears_registry() {
        let mut registry = DebounceRegistry::new();
        request(&mut registry, SelfConsume, ExportPriority, at(0), 300);
        request(&mut registry, SelfConsume, BatteryStorage, at(10), 300);
        assert_eq!(registry.len(), 2);

        let outcome = request(&mut registry, SelfConsume, ExportPriority, at(300), 300);
        assert_eq!(outcome, DebounceOutcome::Approved);
        assert!(registry.is_empty(), "approval wipes every other pending entry");
    }

    #[test]
    fn force_clear_empties_the_registry() {
        let mut registry = DebounceRegistry::new();
        request(&mut registry, SelfConsume, ExportPriority, at(0), 300);
        force_clear(&mut registry);
        assert!(registry.is_empty());
    }

    proptest::proptest! {
        /// Whatever window elapses, a request either stays pending or is
        /// approved, and approval never lands below the configured duration.
        #[test]
        fn approval_never_fires_before_the_window(elapsed in 0i64..=3600, window in 1i64..=1800) {
            let mut registry = DebounceRegistry::new();
            request(&mut registry, SelfConsume, ExportPriority, at(0), window);
            let outcome = request(&mut registry, SelfConsume, ExportPriority, at(elapsed), window);
            match outcome {
                DebounceOutcome::Approved => proptest::prop_assert!(elapsed >= window),
                DebounceOutcome::Pending { elapsed_secs } => {
                    proptest::prop_assert!(elapsed_secs < window);
                }
                DebounceOutcome::Started => proptest::prop_assert!(false, "registry already seeded"),
            }
        }
    }
}
