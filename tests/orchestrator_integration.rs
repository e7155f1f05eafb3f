//! End-to-end orchestration over a file-backed source

mod common;

use chrono::Duration;
use pretty_assertions::assert_eq;

use common::{orchestrator_over, EXPORT};
use pmolens::extraction::AbortSignal;
use pmolens::CacheHealthStatus;

#[tokio::test]
async fn full_analysis_produces_all_three_results() {
    let (orchestrator, _) = orchestrator_over(EXPORT);
    let analytics = orchestrator
        .get_project_data(1, &AbortSignal::none())
        .await
        .unwrap();

    // 64 estimated hours at the default rate
    assert_eq!(analytics.evm.bac, 4800.0);
    assert!(analytics.evm.calculation_date == analytics.last_updated);

    // design -> build -> verify is one chain, all critical
    assert_eq!(analytics.critical_path.critical_path, vec![1, 2, 3]);
    assert!(!analytics.critical_path.has_cycles);

    // user 5 logged hours inside the window ending at the fixed clock
    assert_eq!(analytics.resource_utilization.window_days, 7);
    assert!(analytics.snapshot.data_complete);
}

#[tokio::test]
async fn cached_results_are_reused_within_their_ttl() {
    let (orchestrator, clock) = orchestrator_over(EXPORT);
    let abort = AbortSignal::none();

    let first = orchestrator.get_project_data(1, &abort).await.unwrap();
    clock.advance(Duration::hours(2));
    let second = orchestrator.get_project_data(1, &abort).await.unwrap();

    assert_eq!(second.evm.calculation_date, first.evm.calculation_date);
    assert_eq!(
        second.critical_path.calculation_date,
        first.critical_path.calculation_date
    );
    // the volatile calculation never comes from cache
    assert!(
        second.resource_utilization.calculation_date
            > first.resource_utilization.calculation_date
    );

    let health = orchestrator.get_cache_performance();
    assert!(health.stats.hits > 0);
}

#[tokio::test]
async fn staleness_is_judged_per_calculation() {
    let (orchestrator, clock) = orchestrator_over(EXPORT);
    let abort = AbortSignal::none();

    let first = orchestrator.get_project_data(1, &abort).await.unwrap();

    // 13 hours: past the CPM limit, inside the EVM limit
    clock.advance(Duration::hours(13));
    let second = orchestrator.get_project_data(1, &abort).await.unwrap();
    assert_eq!(second.evm.calculation_date, first.evm.calculation_date);
    assert!(second.critical_path.calculation_date > first.critical_path.calculation_date);

    // another 12 hours crosses the EVM limit too
    clock.advance(Duration::hours(12));
    let third = orchestrator.get_project_data(1, &abort).await.unwrap();
    assert!(third.evm.calculation_date > second.evm.calculation_date);
}

#[tokio::test]
async fn portfolio_tolerates_unknown_projects() {
    let (orchestrator, _) = orchestrator_over(EXPORT);
    let result = orchestrator
        .get_portfolio_analytics(&[1, 2, 99], &AbortSignal::none())
        .await
        .unwrap();

    assert_eq!(result.projects.len(), 3);
    let failed: Vec<u64> = result
        .projects
        .iter()
        .filter(|p| p.analytics().is_none())
        .map(|p| p.project_id())
        .collect();
    assert_eq!(failed, vec![99]);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("1 projects could not be analyzed")));

    // the two real projects still aggregated
    assert_eq!(result.total_budget, 4800.0);
}

#[tokio::test]
async fn empty_project_analyzes_cleanly() {
    let (orchestrator, _) = orchestrator_over(EXPORT);
    let analytics = orchestrator
        .get_project_data(2, &AbortSignal::none())
        .await
        .unwrap();

    assert_eq!(analytics.evm.bac, 0.0);
    assert_eq!(analytics.evm.cpi, 1.0);
    assert!(analytics.critical_path.nodes.is_empty());
    assert!(analytics.resource_utilization.users.is_empty());
}

#[tokio::test]
async fn second_pass_improves_the_hit_rate() {
    let (orchestrator, _) = orchestrator_over(EXPORT);
    let abort = AbortSignal::none();

    orchestrator
        .get_portfolio_analytics(&[1, 2], &abort)
        .await
        .unwrap();
    let cold = orchestrator.get_cache_performance().stats.hit_rate;

    orchestrator
        .get_portfolio_analytics(&[1, 2], &abort)
        .await
        .unwrap();
    let warm = orchestrator.get_cache_performance();

    assert!(warm.stats.hit_rate > cold);
    assert_eq!(warm.status, CacheHealthStatus::Healthy);
}

#[tokio::test]
async fn status_view_is_live() {
    let (orchestrator, _) = orchestrator_over(EXPORT);
    let status = orchestrator
        .get_project_status(1, &AbortSignal::none())
        .await
        .unwrap();

    // the fixture clock is 2026-03-02 09:00, with 4h logged that day
    assert_eq!(status.hours_logged_today, 4.0);
    assert_eq!(status.upcoming_deadlines.len(), 2);
    assert_eq!(status.upcoming_deadlines[0].work_item_id, 2);
    assert!(status
        .alerts
        .iter()
        .any(|a| a.contains("due in")));
}
