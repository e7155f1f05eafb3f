// Export modules for library usage
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod extraction;
pub mod io;
pub mod orchestrator;
pub mod params;
pub mod testkit;

// Re-export commonly used types
pub use crate::core::{
    CachedCalculation, CalculationMeta, ComplexityClass, CostStatus, CriticalPathResult,
    EacForecasts, EvmResult, HealthTier, PortfolioAnalytics, ProjectAnalytics, ProjectOutcome,
    ProjectSnapshot, ProjectStatus, ResourceConflict, ResourceUtilizationResult, ScheduleRisk,
    ScheduleStatus, TaskNode, TimeLogEntry, UserUtilization, WorkItemAggregate,
};

pub use crate::cache::{AnalyticsCache, CacheHealth, CacheHealthStatus, CacheStats, KeyClass};

pub use crate::config::{ForecastMethod, ParameterOverrides, ParameterSet, RiskTolerance};

pub use crate::engine::{calculate_critical_path, calculate_evm, calculate_resource_utilization};

pub use crate::errors::{Error, Result};

pub use crate::extraction::{abort_pair, AbortHandle, AbortSignal, ProjectSource, RetryPolicy};

pub use crate::orchestrator::AnalyticsOrchestrator;

pub use crate::params::{FileParameterStore, ParameterStore, StaticParameterStore};
