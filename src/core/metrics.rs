//! Pure aggregate helpers over snapshot rows

use chrono::NaiveDate;

use super::types::{Deadline, ProjectSnapshot, TimeLogEntry};

/// Sum of hours logged on a specific date
pub fn hours_logged_on(entries: &[TimeLogEntry], date: NaiveDate) -> f64 {
    entries
        .iter()
        .filter(|e| e.spent_on == date)
        .map(|e| e.hours)
        .sum()
}

/// The next `limit` deadlines at or after `today` on open items, sorted
/// ascending by due date
pub fn upcoming_deadlines(snapshot: &ProjectSnapshot, today: NaiveDate, limit: usize) -> Vec<Deadline> {
    let mut deadlines: Vec<Deadline> = snapshot
        .work_items
        .iter()
        .filter(|w| !w.is_closed)
        .filter_map(|w| {
            let due = w.due_date?;
            (due >= today).then(|| Deadline {
                work_item_id: w.id,
                title: w.title.clone(),
                due_date: due,
                days_until: (due - today).num_days(),
            })
        })
        .collect();
    deadlines.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.work_item_id.cmp(&b.work_item_id)));
    deadlines.truncate(limit);
    deadlines
}

/// Open items whose due date has already passed
pub fn overdue_open_items(snapshot: &ProjectSnapshot, today: NaiveDate) -> usize {
    snapshot
        .work_items
        .iter()
        .filter(|w| !w.is_closed)
        .filter(|w| w.due_date.is_some_and(|due| due < today))
        .count()
}
