//! Cross-project resource utilization.
//!
//! Cheap to derive and highly time-sensitive, so this result is never
//! trusted from cache; the orchestrator recomputes it on every request.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::ParameterSet;
use crate::core::types::{ProjectSnapshot, ResourceUtilizationResult, UserUtilization};

/// Default reporting window, one week
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Default)]
struct UserAccumulator {
    allocated_hours: f64,
    worked_hours: f64,
    by_project: HashMap<u64, f64>,
}

/// Compute per-user utilization over the trailing window across one or
/// more project snapshots
pub fn calculate_resource_utilization(
    snapshots: &[ProjectSnapshot],
    params: &ParameterSet,
    window_days: u32,
    now: DateTime<Utc>,
) -> ResourceUtilizationResult {
    let window_start = now.date_naive() - Duration::days(window_days as i64);
    let today = now.date_naive();

    let mut users: HashMap<u64, UserAccumulator> = HashMap::new();

    for snapshot in snapshots {
        for item in &snapshot.work_items {
            let Some(user_id) = item.assignee_id else {
                continue;
            };
            if item.is_closed {
                continue;
            }
            let remaining_fraction = 1.0 - item.percent_complete.clamp(0.0, 100.0) / 100.0;
            users.entry(user_id).or_default().allocated_hours +=
                item.estimated_hours * remaining_fraction;
        }
        for entry in &snapshot.time_entries {
            if entry.spent_on < window_start || entry.spent_on > today {
                continue;
            }
            let acc = users.entry(entry.user_id).or_default();
            acc.worked_hours += entry.hours;
            *acc.by_project.entry(snapshot.project_id).or_default() += entry.hours;
        }
    }

    let capacity = window_capacity_hours(params, window_days);

    let mut users: Vec<UserUtilization> = users
        .into_iter()
        .map(|(user_id, acc)| {
            let utilization_rate = if capacity > 0.0 {
                acc.worked_hours / capacity
            } else {
                0.0
            };
            UserUtilization {
                user_id,
                allocated_hours: acc.allocated_hours,
                worked_hours: acc.worked_hours,
                utilization_rate,
                overallocated: utilization_rate > params.max_allocation,
                by_project: acc.by_project,
            }
        })
        .collect();
    users.sort_by_key(|u| u.user_id);

    ResourceUtilizationResult {
        users,
        window_days,
        calculation_date: now,
    }
}

/// Bookable hours in the window given the working calendar
fn window_capacity_hours(params: &ParameterSet, window_days: u32) -> f64 {
    params.hours_per_day * params.days_per_week * (window_days as f64 / 7.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{day, snapshot, time_entry, work_item};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn capacity_scales_with_window() {
        let params = ParameterSet::default();
        assert_eq!(window_capacity_hours(&params, 7), 40.0);
        assert_eq!(window_capacity_hours(&params, 14), 80.0);
    }

    #[test]
    fn worked_hours_respect_the_window() {
        let snap = snapshot(
            1,
            vec![],
            vec![
                time_entry(1, 8.0, day(2026, 3, 6)),  // inside
                time_entry(1, 8.0, day(2026, 2, 1)),  // before window
                time_entry(1, 8.0, day(2026, 3, 20)), // future, excluded
            ],
        );
        let result =
            calculate_resource_utilization(&[snap], &ParameterSet::default(), 7, now());
        assert_eq!(result.users.len(), 1);
        assert_eq!(result.users[0].worked_hours, 8.0);
        assert!((result.users[0].utilization_rate - 0.2).abs() < 1e-9);
        assert!(!result.users[0].overallocated);
    }

    #[test]
    fn allocation_prorates_remaining_work() {
        let snap = snapshot(
            1,
            vec![
                work_item(1).assignee(1).estimated(40.0).complete(75.0).build(),
                work_item(2).assignee(1).estimated(10.0).closed().build(),
                work_item(3).estimated(10.0).build(), // unassigned, ignored
            ],
            vec![],
        );
        let result =
            calculate_resource_utilization(&[snap], &ParameterSet::default(), 7, now());
        assert_eq!(result.users[0].allocated_hours, 10.0);
    }

    #[test]
    fn overallocation_combines_across_projects() {
        let project_a = snapshot(1, vec![], vec![time_entry(1, 30.0, day(2026, 3, 6))]);
        let project_b = snapshot(2, vec![], vec![time_entry(1, 20.0, day(2026, 3, 6))]);
        let result = calculate_resource_utilization(
            &[project_a, project_b],
            &ParameterSet::default(),
            7,
            now(),
        );

        let user = &result.users[0];
        // 50h against a 40h week
        assert!((user.utilization_rate - 1.25).abs() < 1e-9);
        assert!(user.overallocated);
        assert_eq!(user.by_project.len(), 2);
        assert_eq!(user.by_project[&1], 30.0);
        assert_eq!(user.by_project[&2], 20.0);
    }

    #[test]
    fn users_are_sorted_for_stable_output() {
        let snap = snapshot(
            1,
            vec![],
            vec![
                time_entry(9, 1.0, day(2026, 3, 6)),
                time_entry(3, 1.0, day(2026, 3, 6)),
            ],
        );
        let result =
            calculate_resource_utilization(&[snap], &ParameterSet::default(), 7, now());
        let ids: Vec<u64> = result.users.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec![3, 9]);
    }
}
