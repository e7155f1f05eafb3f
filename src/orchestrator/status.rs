//! Real-time project status.
//!
//! Not part of the cached result set: recomputed on every call from a
//! fresh snapshot, because "what is happening right now" is exactly the
//! question a cache would answer wrongly.

use chrono::{DateTime, Utc};

use crate::core::metrics::{hours_logged_on, overdue_open_items, upcoming_deadlines};
use crate::core::types::{ProjectSnapshot, ProjectStatus, ScheduleRisk};

/// Deadlines shown in the status view
const DEADLINE_LIMIT: usize = 5;

/// Deadlines this close raise an alert
const DEADLINE_ALERT_DAYS: i64 = 3;

/// Overdue open items beyond this raise an alert
const OVERDUE_ALERT_LIMIT: usize = 3;

pub fn build_status(
    snapshot: &ProjectSnapshot,
    schedule_risk: ScheduleRisk,
    now: DateTime<Utc>,
) -> ProjectStatus {
    let today = now.date_naive();
    let hours_logged_today = hours_logged_on(&snapshot.time_entries, today);
    let deadlines = upcoming_deadlines(snapshot, today, DEADLINE_LIMIT);
    let overdue = overdue_open_items(snapshot, today);

    let mut alerts = Vec::new();
    if schedule_risk == ScheduleRisk::High {
        alerts.push("High schedule risk on the critical path".to_string());
    }
    if overdue > OVERDUE_ALERT_LIMIT {
        alerts.push(format!("{overdue} open items are past their due date"));
    }
    if let Some(next) = deadlines
        .iter()
        .find(|d| d.days_until <= DEADLINE_ALERT_DAYS)
    {
        alerts.push(format!(
            "'{}' is due in {} days",
            next.title, next.days_until
        ));
    }
    if hours_logged_today == 0.0 {
        alerts.push("No hours logged today".to_string());
    }

    ProjectStatus {
        project_id: snapshot.project_id,
        hours_logged_today,
        upcoming_deadlines: deadlines,
        schedule_risk,
        overdue_open_items: overdue,
        alerts,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{day, snapshot, time_entry, work_item};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn quiet_day_still_alerts_on_zero_hours() {
        let snap = snapshot(1, vec![], vec![]);
        let status = build_status(&snap, ScheduleRisk::Low, now());
        assert_eq!(status.hours_logged_today, 0.0);
        assert_eq!(status.alerts, vec!["No hours logged today".to_string()]);
    }

    #[test]
    fn logged_hours_suppress_the_idle_alert() {
        let snap = snapshot(1, vec![], vec![time_entry(1, 2.5, day(2026, 3, 2))]);
        let status = build_status(&snap, ScheduleRisk::Low, now());
        assert_eq!(status.hours_logged_today, 2.5);
        assert!(status.alerts.is_empty());
    }

    #[test]
    fn near_deadline_raises_an_alert() {
        let snap = snapshot(
            1,
            vec![work_item(1).title("Ship it").due(day(2026, 3, 4)).build()],
            vec![time_entry(1, 1.0, day(2026, 3, 2))],
        );
        let status = build_status(&snap, ScheduleRisk::Low, now());
        assert_eq!(status.upcoming_deadlines.len(), 1);
        assert!(status.alerts.iter().any(|a| a.contains("Ship it")));
    }

    #[test]
    fn overdue_pileup_raises_an_alert() {
        let items = (1..=4)
            .map(|id| work_item(id).due(day(2026, 2, 1)).build())
            .collect();
        let snap = snapshot(1, items, vec![time_entry(1, 1.0, day(2026, 3, 2))]);
        let status = build_status(&snap, ScheduleRisk::Low, now());
        assert_eq!(status.overdue_open_items, 4);
        assert!(status.alerts.iter().any(|a| a.contains("past their due date")));
    }

    #[test]
    fn high_risk_leads_the_alert_list() {
        let snap = snapshot(1, vec![], vec![time_entry(1, 1.0, day(2026, 3, 2))]);
        let status = build_status(&snap, ScheduleRisk::High, now());
        assert_eq!(
            status.alerts,
            vec!["High schedule risk on the critical path".to_string()]
        );
    }
}
