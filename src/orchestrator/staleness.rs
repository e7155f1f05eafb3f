//! Per-calculation staleness policy.
//!
//! The three calculations are judged independently: EVM ages out after
//! 24 hours (12 once the project is past 80% complete, when numbers move
//! fastest), the critical path after 12, and resource utilization is
//! treated as permanently stale.

use chrono::{DateTime, Utc};

pub const EVM_MAX_AGE_HOURS: i64 = 24;
pub const EVM_NEAR_DONE_MAX_AGE_HOURS: i64 = 12;
pub const EVM_NEAR_DONE_COMPLETION: f64 = 80.0;
pub const CPM_MAX_AGE_HOURS: i64 = 12;

pub fn evm_is_stale(
    calculated_at: Option<DateTime<Utc>>,
    completion_percent: f64,
    now: DateTime<Utc>,
) -> bool {
    let Some(calculated_at) = calculated_at else {
        return true;
    };
    let age_hours = (now - calculated_at).num_hours();
    if age_hours >= EVM_MAX_AGE_HOURS {
        return true;
    }
    completion_percent > EVM_NEAR_DONE_COMPLETION && age_hours >= EVM_NEAR_DONE_MAX_AGE_HOURS
}

pub fn cpm_is_stale(calculated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match calculated_at {
        Some(calculated_at) => (now - calculated_at).num_hours() >= CPM_MAX_AGE_HOURS,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn missing_result_is_always_stale() {
        assert!(evm_is_stale(None, 0.0, base()));
        assert!(cpm_is_stale(None, base()));
    }

    #[test]
    fn evm_ages_out_at_24_hours() {
        let now = base();
        assert!(!evm_is_stale(Some(now - Duration::hours(23)), 50.0, now));
        assert!(evm_is_stale(Some(now - Duration::hours(24)), 50.0, now));
    }

    #[test]
    fn evm_tightens_past_80_percent_completion() {
        let now = base();
        let thirteen_hours_old = Some(now - Duration::hours(13));
        assert!(!evm_is_stale(thirteen_hours_old, 80.0, now));
        assert!(evm_is_stale(thirteen_hours_old, 81.0, now));
    }

    #[test]
    fn cpm_ages_out_at_12_hours() {
        let now = base();
        assert!(!cpm_is_stale(Some(now - Duration::hours(11)), now));
        assert!(cpm_is_stale(Some(now - Duration::hours(12)), now));
    }
}
