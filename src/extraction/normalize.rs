//! Normalization of untrusted source rows into the aggregate snapshot.
//!
//! Missing fields degrade to documented defaults; malformed records and
//! dangling relations are skipped, never fatal, and any drop marks the
//! snapshot `data_complete = false` so downstream results carry the
//! incompleteness instead of presenting a clean answer.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::{RawBudget, RawTimeEntry, RawWorkItem};
use crate::core::types::{BudgetRecord, ProjectSnapshot, TimeLogEntry, WorkItemAggregate};

/// Status names treated as closed when the source omits the closed flag
const CLOSED_STATUSES: &[&str] = &["closed", "done", "rejected"];

/// Reduce raw rows into a per-project aggregate snapshot
pub fn build_snapshot(
    project_id: u64,
    raw_items: Vec<RawWorkItem>,
    raw_entries: Vec<RawTimeEntry>,
    raw_budgets: Vec<RawBudget>,
    fetched_at: DateTime<Utc>,
) -> ProjectSnapshot {
    let mut data_complete = true;

    let mut items: HashMap<u64, WorkItemAggregate> = HashMap::new();
    let mut order: Vec<u64> = Vec::new();
    for raw in raw_items {
        let Some(id) = raw.id else {
            log::warn!("project {project_id}: work item without id dropped");
            data_complete = false;
            continue;
        };
        if items.contains_key(&id) {
            log::warn!("project {project_id}: duplicate work item {id}; keeping the later row");
            data_complete = false;
        } else {
            order.push(id);
        }
        items.insert(id, normalize_item(id, raw));
    }

    let known: HashSet<u64> = items.keys().copied().collect();
    for item in items.values_mut() {
        let id = item.id;
        let before = item.predecessors.len() + item.successors.len();
        item.predecessors.retain(|p| known.contains(p) && *p != id);
        item.successors.retain(|s| known.contains(s) && *s != id);
        if item.predecessors.len() + item.successors.len() != before {
            log::warn!("project {project_id}: work item {id} had dangling relations; dropped");
            data_complete = false;
        }
    }

    let work_items: Vec<WorkItemAggregate> = order
        .into_iter()
        .filter_map(|id| items.remove(&id))
        .collect();

    let mut time_entries = Vec::new();
    for raw in raw_entries {
        match normalize_time_entry(raw, &known) {
            Some(entry) => time_entries.push(entry),
            None => {
                data_complete = false;
            }
        }
    }

    let budgets = raw_budgets
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id?;
            Some(BudgetRecord {
                id,
                subject: raw.subject.unwrap_or_default(),
                amount: raw.amount.unwrap_or(0.0).max(0.0),
            })
        })
        .collect();

    ProjectSnapshot {
        project_id,
        work_items,
        time_entries,
        budgets,
        data_complete,
        fetched_at,
    }
}

fn normalize_item(id: u64, raw: RawWorkItem) -> WorkItemAggregate {
    let status = raw.status.unwrap_or_else(|| "Unknown".to_string());
    let is_closed = raw
        .closed
        .unwrap_or_else(|| CLOSED_STATUSES.contains(&status.to_lowercase().as_str()));

    WorkItemAggregate {
        id,
        title: raw.subject.unwrap_or_else(|| format!("Work item {id}")),
        percent_complete: raw.done_ratio.unwrap_or(0.0).clamp(0.0, 100.0),
        estimated_hours: raw.estimated_hours.unwrap_or(0.0).max(0.0),
        logged_hours: raw.spent_hours.unwrap_or(0.0).max(0.0),
        start_date: raw.start_date,
        due_date: raw.due_date,
        status,
        is_closed,
        assignee_id: raw.assigned_to_id,
        predecessors: raw.predecessor_ids,
        successors: raw.successor_ids,
    }
}

fn normalize_time_entry(raw: RawTimeEntry, known_items: &HashSet<u64>) -> Option<TimeLogEntry> {
    let hours = raw.hours?;
    let spent_on = raw.spent_on?;
    let user_id = raw.user_id?;
    if hours < 0.0 {
        log::warn!("negative time entry of {hours}h for user {user_id} dropped");
        return None;
    }
    // a reference to an unknown work item is degraded, not dropped; the
    // hours are still real cost
    let work_item_id = raw.work_item_id.filter(|id| known_items.contains(id));
    Some(TimeLogEntry {
        hours,
        spent_on,
        user_id,
        work_item_id,
        activity: raw.activity,
    })
}
