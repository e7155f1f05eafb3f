//! Common type definitions used across the analytics engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One schedulable unit of work, normalized from the external source.
///
/// This is an immutable snapshot row; it is rebuilt fresh on every
/// extraction and never cached, because schedule state changes
/// continuously and staleness here would corrupt every downstream
/// calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemAggregate {
    pub id: u64,
    pub title: String,
    /// Completion fraction, clamped to 0-100 at normalization
    pub percent_complete: f64,
    pub estimated_hours: f64,
    pub logged_hours: f64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub is_closed: bool,
    pub assignee_id: Option<u64>,
    pub predecessors: Vec<u64>,
    pub successors: Vec<u64>,
}

/// A single logged unit of effort. Always fetched fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLogEntry {
    pub hours: f64,
    pub spent_on: NaiveDate,
    pub user_id: u64,
    pub work_item_id: Option<u64>,
    pub activity: Option<String>,
}

/// A budget line attached to the project by the external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub id: u64,
    pub subject: String,
    pub amount: f64,
}

/// Per-project aggregate snapshot produced by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_id: u64,
    pub work_items: Vec<WorkItemAggregate>,
    pub time_entries: Vec<TimeLogEntry>,
    pub budgets: Vec<BudgetRecord>,
    /// False when malformed records or dangling relations were dropped
    /// during normalization
    pub data_complete: bool,
    pub fetched_at: DateTime<Utc>,
}

impl ProjectSnapshot {
    /// Total estimated effort across all work items, in hours
    pub fn total_estimated_hours(&self) -> f64 {
        self.work_items.iter().map(|w| w.estimated_hours).sum()
    }

    /// Effort-weighted project completion in percent. Falls back to a
    /// plain average when no item carries an estimate.
    pub fn completion_percent(&self) -> f64 {
        if self.work_items.is_empty() {
            return 0.0;
        }
        let total = self.total_estimated_hours();
        if total > 0.0 {
            self.work_items
                .iter()
                .map(|w| w.percent_complete * w.estimated_hours)
                .sum::<f64>()
                / total
        } else {
            self.work_items
                .iter()
                .map(|w| w.percent_complete)
                .sum::<f64>()
                / self.work_items.len() as f64
        }
    }
}

/// Qualitative cost position derived from CPI against the configured
/// threshold band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostStatus {
    UnderBudget,
    OverBudget,
    SeriouslyOverBudget,
}

impl CostStatus {
    pub fn display_name(&self) -> &str {
        match self {
            CostStatus::UnderBudget => "Under Budget",
            CostStatus::OverBudget => "Over Budget",
            CostStatus::SeriouslyOverBudget => "Seriously Over Budget",
        }
    }
}

/// Qualitative schedule position derived from SPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    Ahead,
    OnTrack,
    Behind,
    SeriouslyBehind,
}

impl ScheduleStatus {
    pub fn display_name(&self) -> &str {
        match self {
            ScheduleStatus::Ahead => "Ahead of Schedule",
            ScheduleStatus::OnTrack => "On Track",
            ScheduleStatus::Behind => "Behind Schedule",
            ScheduleStatus::SeriouslyBehind => "Seriously Behind",
        }
    }
}

/// Overall traffic-light health for a project or portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthTier {
    Green,
    Yellow,
    Red,
}

impl HealthTier {
    pub fn display_name(&self) -> &str {
        match self {
            HealthTier::Green => "Green",
            HealthTier::Yellow => "Yellow",
            HealthTier::Red => "Red",
        }
    }
}

/// Schedule risk tier for the critical path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScheduleRisk {
    Low,
    Medium,
    High,
}

impl ScheduleRisk {
    pub fn display_name(&self) -> &str {
        match self {
            ScheduleRisk::Low => "Low",
            ScheduleRisk::Medium => "Medium",
            ScheduleRisk::High => "High",
        }
    }
}

/// All estimate-at-completion forecast variants, kept side by side for
/// transparency. One of them is selected as the authoritative EAC per
/// the parameter set's forecast method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EacForecasts {
    pub cpi_based: f64,
    pub budget_rate: f64,
    pub spi_cpi_combined: f64,
    pub ac_plus_remaining_over_cpi: f64,
    pub custom_regression: f64,
}

/// Earned value management result for a single project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmResult {
    pub project_id: u64,
    /// Budget at completion
    pub bac: f64,
    pub planned_value: f64,
    pub earned_value: f64,
    pub actual_cost: f64,
    /// Cost performance index; 1.0 when no cost has been logged yet
    pub cpi: f64,
    /// Schedule performance index; 1.0 when no value was planned yet
    pub spi: f64,
    pub cost_variance: f64,
    pub schedule_variance: f64,
    pub forecasts: EacForecasts,
    /// The variant selected by the parameter set's forecast method
    pub estimate_at_completion: f64,
    pub estimate_to_complete: f64,
    pub variance_at_completion: f64,
    pub tcpi: f64,
    pub cost_status: CostStatus,
    pub schedule_status: ScheduleStatus,
    pub health: HealthTier,
    pub confidence: f64,
    pub data_complete: bool,
    pub calculation_date: DateTime<Utc>,
}

/// One node in the critical-path graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: u64,
    pub title: String,
    pub duration_days: f64,
    pub earliest_start: f64,
    pub earliest_finish: f64,
    pub latest_start: f64,
    pub latest_finish: f64,
    pub total_float: f64,
    pub is_critical: bool,
    pub percent_complete: f64,
    pub predecessors: Vec<u64>,
    pub successors: Vec<u64>,
}

/// Critical path method result for a single project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPathResult {
    pub project_id: u64,
    pub nodes: Vec<TaskNode>,
    /// Zero-float node ids ordered by earliest start
    pub critical_path: Vec<u64>,
    pub project_duration_days: f64,
    pub schedule_risk: ScheduleRisk,
    pub recommendations: im::Vector<String>,
    /// True when the dependency graph contained a cycle; earliest/latest
    /// times are then under-estimates produced by the fallback traversal
    pub has_cycles: bool,
    pub data_complete: bool,
    pub calculation_date: DateTime<Utc>,
}

/// Per-user utilization across one or more projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUtilization {
    pub user_id: u64,
    pub allocated_hours: f64,
    pub worked_hours: f64,
    /// Worked hours over capacity for the window
    pub utilization_rate: f64,
    pub overallocated: bool,
    /// Worked hours per contributing project
    pub by_project: HashMap<u64, f64>,
}

/// Resource utilization result; recomputed on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilizationResult {
    pub users: Vec<UserUtilization>,
    pub window_days: u32,
    pub calculation_date: DateTime<Utc>,
}

/// Coarse complexity classification of a calculation's input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplexityClass {
    Low,
    Medium,
    High,
}

impl ComplexityClass {
    /// Classify by work-item count
    pub fn from_item_count(count: usize) -> Self {
        match count {
            0..=49 => ComplexityClass::Low,
            50..=249 => ComplexityClass::Medium,
            _ => ComplexityClass::High,
        }
    }
}

/// Metadata recorded alongside every cached calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationMeta {
    pub duration_ms: u64,
    pub input_items: usize,
    pub complexity: ComplexityClass,
}

/// A calculation result plus the metadata it was stored with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCalculation<T> {
    pub result: T,
    pub meta: CalculationMeta,
}

/// Everything the engine knows about one project after an analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalytics {
    pub project_id: u64,
    pub snapshot: ProjectSnapshot,
    pub parameters: crate::config::ParameterSet,
    pub evm: EvmResult,
    pub critical_path: CriticalPathResult,
    pub resource_utilization: ResourceUtilizationResult,
    pub last_updated: DateTime<Utc>,
}

/// An upcoming deadline surfaced by the real-time status view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub work_item_id: u64,
    pub title: String,
    pub due_date: NaiveDate,
    pub days_until: i64,
}

/// Real-time project status; recomputed on every call, never cached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project_id: u64,
    pub hours_logged_today: f64,
    pub upcoming_deadlines: Vec<Deadline>,
    pub schedule_risk: ScheduleRisk,
    pub overdue_open_items: usize,
    pub alerts: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of one project inside a portfolio run. A hard failure for a
/// single project never aborts the batch; it is recorded here instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectOutcome {
    Analyzed { analytics: Box<ProjectAnalytics> },
    Failed { project_id: u64, error: String },
}

impl ProjectOutcome {
    pub fn project_id(&self) -> u64 {
        match self {
            ProjectOutcome::Analyzed { analytics } => analytics.project_id,
            ProjectOutcome::Failed { project_id, .. } => *project_id,
        }
    }

    pub fn analytics(&self) -> Option<&ProjectAnalytics> {
        match self {
            ProjectOutcome::Analyzed { analytics } => Some(analytics),
            ProjectOutcome::Failed { .. } => None,
        }
    }
}

/// A user stretched past the maximum allocation across projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub user_id: u64,
    pub combined_utilization: f64,
    pub project_ids: Vec<u64>,
}

/// Aggregated multi-project view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalytics {
    pub projects: Vec<ProjectOutcome>,
    pub total_budget: f64,
    pub total_spent: f64,
    pub average_completion: f64,
    /// Projects whose EVM health is Red
    pub projects_at_risk: Vec<u64>,
    pub health: HealthTier,
    pub resource_conflicts: Vec<ResourceConflict>,
    pub recommendations: im::Vector<String>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: u64, est: f64, pct: f64) -> WorkItemAggregate {
        WorkItemAggregate {
            id,
            title: format!("item {id}"),
            percent_complete: pct,
            estimated_hours: est,
            logged_hours: 0.0,
            start_date: None,
            due_date: None,
            status: "In progress".into(),
            is_closed: false,
            assignee_id: None,
            predecessors: vec![],
            successors: vec![],
        }
    }

    fn snapshot(items: Vec<WorkItemAggregate>) -> ProjectSnapshot {
        ProjectSnapshot {
            project_id: 1,
            work_items: items,
            time_entries: vec![],
            budgets: vec![],
            data_complete: true,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn completion_is_effort_weighted() {
        let snap = snapshot(vec![item(1, 30.0, 100.0), item(2, 10.0, 0.0)]);
        assert!((snap.completion_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn completion_falls_back_to_plain_average_without_estimates() {
        let snap = snapshot(vec![item(1, 0.0, 40.0), item(2, 0.0, 60.0)]);
        assert!((snap.completion_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn completion_of_empty_project_is_zero() {
        assert_eq!(snapshot(vec![]).completion_percent(), 0.0);
    }

    #[test]
    fn complexity_class_boundaries() {
        assert_eq!(ComplexityClass::from_item_count(0), ComplexityClass::Low);
        assert_eq!(ComplexityClass::from_item_count(49), ComplexityClass::Low);
        assert_eq!(ComplexityClass::from_item_count(50), ComplexityClass::Medium);
        assert_eq!(ComplexityClass::from_item_count(249), ComplexityClass::Medium);
        assert_eq!(ComplexityClass::from_item_count(250), ComplexityClass::High);
    }

    #[test]
    fn outcome_exposes_project_id_for_failures() {
        let outcome = ProjectOutcome::Failed {
            project_id: 7,
            error: "retries exhausted".into(),
        };
        assert_eq!(outcome.project_id(), 7);
        assert!(outcome.analytics().is_none());
    }
}
