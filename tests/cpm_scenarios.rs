//! Critical path scenario tests

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use pmolens::testkit::{day, snapshot, work_item};
use pmolens::{calculate_critical_path, ParameterSet, ScheduleRisk};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

#[test]
fn follows_relation_with_three_and_five_day_durations() {
    // A (3 days) -> B (5 days), no overlap
    let snap = snapshot(
        1,
        vec![
            work_item(1)
                .title("A")
                .schedule(day(2026, 3, 2), day(2026, 3, 5))
                .build(),
            work_item(2)
                .title("B")
                .schedule(day(2026, 3, 5), day(2026, 3, 10))
                .after(1)
                .build(),
        ],
        vec![],
    );
    let result = calculate_critical_path(&snap, &ParameterSet::default(), now());

    assert_eq!(result.critical_path, vec![1, 2]);
    assert_eq!(result.project_duration_days, 8.0);
    for node in &result.nodes {
        assert_eq!(node.total_float, 0.0);
        assert!(node.is_critical);
    }
}

#[test]
fn forward_backward_times_line_up() {
    let snap = snapshot(
        1,
        vec![
            work_item(1).estimated(16.0).build(),
            work_item(2).estimated(8.0).after(1).build(),
        ],
        vec![],
    );
    let result = calculate_critical_path(&snap, &ParameterSet::default(), now());

    let a = result.nodes.iter().find(|n| n.id == 1).unwrap();
    let b = result.nodes.iter().find(|n| n.id == 2).unwrap();

    assert_eq!(a.earliest_start, 0.0);
    assert_eq!(a.earliest_finish, 2.0);
    assert_eq!(b.earliest_start, 2.0);
    assert_eq!(b.earliest_finish, 3.0);
    assert_eq!(b.latest_finish, result.project_duration_days);
    assert_eq!(a.latest_finish, b.latest_start);
}

#[test]
fn independent_tasks_all_start_at_zero() {
    let snap = snapshot(
        1,
        vec![
            work_item(1).estimated(8.0).build(),
            work_item(2).estimated(24.0).build(),
        ],
        vec![],
    );
    let result = calculate_critical_path(&snap, &ParameterSet::default(), now());

    assert!(result.nodes.iter().all(|n| n.earliest_start == 0.0));
    // the longer task defines the project and is the only critical one
    assert_eq!(result.critical_path, vec![2]);
    assert_eq!(result.project_duration_days, 3.0);
}

#[test]
fn cycles_are_reported_not_fatal() {
    let snap = snapshot(
        1,
        vec![
            work_item(1).estimated(8.0).after(3).build(),
            work_item(2).estimated(8.0).after(1).build(),
            work_item(3).estimated(8.0).after(2).build(),
        ],
        vec![],
    );
    let result = calculate_critical_path(&snap, &ParameterSet::default(), now());

    assert!(result.has_cycles);
    assert!(result.schedule_risk >= ScheduleRisk::Medium);
    assert!(result.recommendations.iter().any(|r| r.contains("cycle")));
    assert_eq!(result.nodes.len(), 3);
}

#[test]
fn behind_critical_work_raises_the_risk_tier() {
    let snap = snapshot(
        1,
        vec![
            work_item(1).estimated(8.0).complete(20.0).build(),
            work_item(2).estimated(8.0).complete(20.0).after(1).build(),
            work_item(3).estimated(8.0).complete(20.0).after(2).build(),
        ],
        vec![],
    );
    let result = calculate_critical_path(&snap, &ParameterSet::default(), now());

    assert_eq!(result.schedule_risk, ScheduleRisk::High);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("3 critical tasks behind schedule")));
}
