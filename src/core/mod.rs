pub mod metrics;
pub mod types;

pub use types::{
    BudgetRecord, CachedCalculation, CalculationMeta, ComplexityClass, CostStatus,
    CriticalPathResult, Deadline, EacForecasts, EvmResult, HealthTier, PortfolioAnalytics,
    ProjectAnalytics, ProjectOutcome, ProjectSnapshot, ProjectStatus, ResourceConflict,
    ResourceUtilizationResult, ScheduleRisk, ScheduleStatus, TaskNode, TimeLogEntry,
    UserUtilization, WorkItemAggregate,
};
