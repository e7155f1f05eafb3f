//! Test support: deterministic clock and snapshot builders.
//!
//! Used by unit and integration tests; not part of the stable API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::RwLock;

use crate::cache::Clock;
use crate::core::types::{ProjectSnapshot, TimeLogEntry, WorkItemAggregate};
use crate::errors::{Error, Result};
use crate::extraction::{
    AbortSignal, ProjectSource, RawBudget, RawTimeEntry, RawWorkItem,
};

/// A clock that only moves when told to
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap())
    }
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Builder for work-item rows with sensible defaults
pub struct WorkItemBuilder {
    item: WorkItemAggregate,
}

impl WorkItemBuilder {
    pub fn new(id: u64) -> Self {
        Self {
            item: WorkItemAggregate {
                id,
                title: format!("Task {id}"),
                percent_complete: 0.0,
                estimated_hours: 8.0,
                logged_hours: 0.0,
                start_date: None,
                due_date: None,
                status: "In progress".into(),
                is_closed: false,
                assignee_id: None,
                predecessors: vec![],
                successors: vec![],
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.item.title = title.to_string();
        self
    }

    pub fn complete(mut self, percent: f64) -> Self {
        self.item.percent_complete = percent;
        self
    }

    pub fn estimated(mut self, hours: f64) -> Self {
        self.item.estimated_hours = hours;
        self
    }

    pub fn logged(mut self, hours: f64) -> Self {
        self.item.logged_hours = hours;
        self
    }

    pub fn schedule(mut self, start: NaiveDate, due: NaiveDate) -> Self {
        self.item.start_date = Some(start);
        self.item.due_date = Some(due);
        self
    }

    pub fn due(mut self, due: NaiveDate) -> Self {
        self.item.due_date = Some(due);
        self
    }

    pub fn assignee(mut self, user_id: u64) -> Self {
        self.item.assignee_id = Some(user_id);
        self
    }

    pub fn closed(mut self) -> Self {
        self.item.is_closed = true;
        self.item.status = "Closed".into();
        self
    }

    pub fn after(mut self, predecessor: u64) -> Self {
        self.item.predecessors.push(predecessor);
        self
    }

    pub fn before(mut self, successor: u64) -> Self {
        self.item.successors.push(successor);
        self
    }

    pub fn build(self) -> WorkItemAggregate {
        self.item
    }
}

/// Shorthand for `WorkItemBuilder::new`
pub fn work_item(id: u64) -> WorkItemBuilder {
    WorkItemBuilder::new(id)
}

/// A logged time entry
pub fn time_entry(user_id: u64, hours: f64, spent_on: NaiveDate) -> TimeLogEntry {
    TimeLogEntry {
        hours,
        spent_on,
        user_id,
        work_item_id: None,
        activity: None,
    }
}

/// A complete snapshot from parts
pub fn snapshot(
    project_id: u64,
    work_items: Vec<WorkItemAggregate>,
    time_entries: Vec<TimeLogEntry>,
) -> ProjectSnapshot {
    ProjectSnapshot {
        project_id,
        work_items,
        time_entries,
        budgets: vec![],
        data_complete: true,
        fetched_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    }
}

/// Calendar day shorthand for tests
pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Lower an aggregate row back into the raw shape the source returns
pub fn to_raw(item: &WorkItemAggregate) -> RawWorkItem {
    RawWorkItem {
        id: Some(item.id),
        subject: Some(item.title.clone()),
        done_ratio: Some(item.percent_complete),
        estimated_hours: Some(item.estimated_hours),
        spent_hours: Some(item.logged_hours),
        start_date: item.start_date,
        due_date: item.due_date,
        status: Some(item.status.clone()),
        closed: Some(item.is_closed),
        assigned_to_id: item.assignee_id,
        predecessor_ids: item.predecessors.clone(),
        successor_ids: item.successors.clone(),
    }
}

fn to_raw_entry(entry: &TimeLogEntry) -> RawTimeEntry {
    RawTimeEntry {
        hours: Some(entry.hours),
        spent_on: Some(entry.spent_on),
        user_id: Some(entry.user_id),
        work_item_id: entry.work_item_id,
        activity: entry.activity.clone(),
    }
}

/// In-memory project source with per-project failure injection and a
/// fetch counter, for orchestrator tests
#[derive(Default)]
pub struct StaticSource {
    projects: HashMap<u64, (Vec<RawWorkItem>, Vec<RawTimeEntry>)>,
    failing: HashSet<u64>,
    pub work_item_fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(
        mut self,
        project_id: u64,
        items: Vec<WorkItemAggregate>,
        entries: Vec<TimeLogEntry>,
    ) -> Self {
        self.projects.insert(
            project_id,
            (
                items.iter().map(to_raw).collect(),
                entries.iter().map(to_raw_entry).collect(),
            ),
        );
        self
    }

    pub fn with_failing_project(mut self, project_id: u64) -> Self {
        self.failing.insert(project_id);
        self
    }

    fn rows(&self, project_id: u64) -> Result<&(Vec<RawWorkItem>, Vec<RawTimeEntry>)> {
        if self.failing.contains(&project_id) {
            return Err(Error::source_failure(
                format!("project {project_id}: injected failure"),
                Some(500),
                false,
            ));
        }
        self.projects.get(&project_id).ok_or_else(|| {
            Error::source_failure(format!("project {project_id} unknown"), Some(404), false)
        })
    }
}

#[async_trait]
impl ProjectSource for StaticSource {
    async fn list_work_items(
        &self,
        project_id: u64,
        _abort: &AbortSignal,
    ) -> Result<Vec<RawWorkItem>> {
        self.work_item_fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.rows(project_id)?.0.clone())
    }

    async fn list_time_entries(
        &self,
        project_id: u64,
        _range: Option<(NaiveDate, NaiveDate)>,
        _abort: &AbortSignal,
    ) -> Result<Vec<RawTimeEntry>> {
        Ok(self.rows(project_id)?.1.clone())
    }

    async fn list_budgets(&self, project_id: u64, _abort: &AbortSignal) -> Result<Vec<RawBudget>> {
        self.rows(project_id)?;
        Ok(vec![])
    }
}
