//! Portfolio aggregation over per-project outcomes.
//!
//! Pure functions; the orchestrator feeds them the already-computed
//! outcomes so the aggregation itself needs no I/O and is easy to test
//! at the boundaries (the 30% red rule in particular).

use chrono::{DateTime, Utc};

use crate::config::ParameterSet;
use crate::core::types::{
    HealthTier, PortfolioAnalytics, ProjectOutcome, ResourceConflict,
};
use crate::engine::resources::{calculate_resource_utilization, DEFAULT_WINDOW_DAYS};

/// Red when strictly more than this fraction of projects are red
const RED_RATIO_LIMIT: f64 = 0.30;

/// Yellow when fewer than this fraction of projects are green
const GREEN_RATIO_FLOOR: f64 = 0.50;

pub fn aggregate(
    outcomes: Vec<ProjectOutcome>,
    params: &ParameterSet,
    now: DateTime<Utc>,
) -> PortfolioAnalytics {
    let analyzed: Vec<_> = outcomes.iter().filter_map(|o| o.analytics()).collect();
    let failed = outcomes.len() - analyzed.len();

    let total_budget: f64 = analyzed.iter().map(|a| a.evm.bac).sum();
    let total_spent: f64 = analyzed.iter().map(|a| a.evm.actual_cost).sum();
    let average_completion = if analyzed.is_empty() {
        0.0
    } else {
        analyzed
            .iter()
            .map(|a| a.snapshot.completion_percent())
            .sum::<f64>()
            / analyzed.len() as f64
    };

    let projects_at_risk: Vec<u64> = analyzed
        .iter()
        .filter(|a| a.evm.health == HealthTier::Red)
        .map(|a| a.project_id)
        .collect();

    let health = portfolio_health(&analyzed);
    let resource_conflicts = detect_conflicts(&analyzed, params, now);

    let mut recommendations = im::Vector::new();
    if !projects_at_risk.is_empty() {
        recommendations.push_back(format!(
            "{} projects are in the red; review cost and schedule recovery plans",
            projects_at_risk.len()
        ));
    }
    if !resource_conflicts.is_empty() {
        recommendations.push_back(format!(
            "{} users are allocated beyond capacity across projects",
            resource_conflicts.len()
        ));
    }
    if !analyzed.is_empty() && average_completion < 25.0 {
        recommendations.push_back(format!(
            "Average portfolio progress is {average_completion:.0}%; delivery is early and forecasts are volatile"
        ));
    }
    if failed > 0 {
        recommendations.push_back(format!("{failed} projects could not be analyzed"));
    }

    PortfolioAnalytics {
        projects: outcomes,
        total_budget,
        total_spent,
        average_completion,
        projects_at_risk,
        health,
        resource_conflicts,
        recommendations,
        generated_at: now,
    }
}

/// Red iff strictly more than 30% of analyzed projects are red; Yellow
/// when fewer than half are green; Green otherwise
fn portfolio_health(analyzed: &[&crate::core::types::ProjectAnalytics]) -> HealthTier {
    if analyzed.is_empty() {
        return HealthTier::Yellow;
    }
    let total = analyzed.len() as f64;
    let red = analyzed
        .iter()
        .filter(|a| a.evm.health == HealthTier::Red)
        .count() as f64;
    let green = analyzed
        .iter()
        .filter(|a| a.evm.health == HealthTier::Green)
        .count() as f64;

    if red / total > RED_RATIO_LIMIT {
        HealthTier::Red
    } else if green / total < GREEN_RATIO_FLOOR {
        HealthTier::Yellow
    } else {
        HealthTier::Green
    }
}

/// Users whose combined utilization across the portfolio exceeds the
/// maximum allocation fraction
fn detect_conflicts(
    analyzed: &[&crate::core::types::ProjectAnalytics],
    params: &ParameterSet,
    now: DateTime<Utc>,
) -> Vec<ResourceConflict> {
    let snapshots: Vec<_> = analyzed.iter().map(|a| a.snapshot.clone()).collect();
    let combined = calculate_resource_utilization(&snapshots, params, DEFAULT_WINDOW_DAYS, now);

    combined
        .users
        .into_iter()
        .filter(|u| u.utilization_rate > params.max_allocation)
        .map(|u| {
            let mut project_ids: Vec<u64> = u.by_project.keys().copied().collect();
            project_ids.sort_unstable();
            ResourceConflict {
                user_id: u.user_id,
                combined_utilization: u.utilization_rate,
                project_ids,
            }
        })
        .collect()
}
