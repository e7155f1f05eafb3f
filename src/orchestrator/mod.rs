//! Analysis orchestration.
//!
//! The orchestrator mediates every read and write: it always fetches a
//! fresh snapshot, decides per calculation whether the cached result is
//! still serviceable, recomputes only what is stale (concurrently), and
//! writes results back with execution metadata. Cache failures are never
//! fatal; they degrade to recomputation.

pub mod portfolio;
pub mod staleness;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{AnalyticsCache, CacheHealth, Clock, SystemClock};
use crate::config::ParameterSet;
use crate::core::types::{
    CachedCalculation, CalculationMeta, ComplexityClass, CriticalPathResult, EvmResult,
    PortfolioAnalytics, ProjectAnalytics, ProjectOutcome, ProjectSnapshot, ProjectStatus,
    ResourceUtilizationResult,
};
use crate::engine::resources::DEFAULT_WINDOW_DAYS;
use crate::engine::{calculate_critical_path, calculate_evm, calculate_resource_utilization};
use crate::errors::Result;
use crate::extraction::normalize::build_snapshot;
use crate::extraction::{AbortSignal, ProjectSource};
use crate::params::ParameterStore;

fn scope_for(project_id: u64) -> String {
    format!("project:{project_id}")
}

fn portfolio_scope(project_ids: &[u64]) -> String {
    let ids: Vec<String> = project_ids.iter().map(u64::to_string).collect();
    format!("projects:{}", ids.join("+"))
}

pub struct AnalyticsOrchestrator {
    cache: Arc<AnalyticsCache>,
    source: Arc<dyn ProjectSource>,
    params: Arc<dyn ParameterStore>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsOrchestrator {
    pub fn new(
        cache: Arc<AnalyticsCache>,
        source: Arc<dyn ProjectSource>,
        params: Arc<dyn ParameterStore>,
    ) -> Self {
        Self {
            cache,
            source,
            params,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Full analysis for one project: fresh snapshot, session-cached
    /// parameters, and the three calculations with independent
    /// staleness decisions.
    pub async fn get_project_data(
        &self,
        project_id: u64,
        abort: &AbortSignal,
    ) -> Result<ProjectAnalytics> {
        let (snapshot, params) = tokio::join!(
            self.fetch_snapshot(project_id, abort),
            self.resolve_parameters(project_id)
        );
        let snapshot = snapshot?;
        let params = params?;

        let now = self.clock.now();
        let scope = scope_for(project_id);
        let completion = snapshot.completion_percent();

        let cached_evm: Option<CachedCalculation<EvmResult>> = self.read_cached("evm", &scope);
        let cached_cpm: Option<CachedCalculation<CriticalPathResult>> =
            self.read_cached("critical_path", &scope);

        let evm_stale = staleness::evm_is_stale(
            cached_evm.as_ref().map(|c| c.result.calculation_date),
            completion,
            now,
        );
        let cpm_stale = staleness::cpm_is_stale(
            cached_cpm.as_ref().map(|c| c.result.calculation_date),
            now,
        );

        let fresh_evm = (!evm_stale)
            .then(|| cached_evm.map(|c| c.result))
            .flatten();
        let fresh_cpm = (!cpm_stale)
            .then(|| cached_cpm.map(|c| c.result))
            .flatten();

        // only the stale calculations are recomputed, all of them
        // concurrently; resource utilization is always stale by policy
        let (evm, critical_path, resource_utilization) = tokio::join!(
            async {
                match fresh_evm {
                    Some(result) => result,
                    None => {
                        let started = Instant::now();
                        let result = calculate_evm(&snapshot, &params, now);
                        self.write_back("evm", &scope, &result, started, &snapshot);
                        result
                    }
                }
            },
            async {
                match fresh_cpm {
                    Some(result) => result,
                    None => {
                        let started = Instant::now();
                        let result = calculate_critical_path(&snapshot, &params, now);
                        self.write_back("critical_path", &scope, &result, started, &snapshot);
                        result
                    }
                }
            },
            async {
                compute_resource_utilization(&snapshot, &params, now)
            }
        );

        let sweep_cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            sweep_cache.maybe_sweep();
        });

        Ok(ProjectAnalytics {
            project_id,
            snapshot,
            parameters: params,
            evm,
            critical_path,
            resource_utilization,
            last_updated: now,
        })
    }

    /// Real-time status view; recomputed on every call
    pub async fn get_project_status(
        &self,
        project_id: u64,
        abort: &AbortSignal,
    ) -> Result<ProjectStatus> {
        let (snapshot, params) = tokio::join!(
            self.fetch_snapshot(project_id, abort),
            self.resolve_parameters(project_id)
        );
        let snapshot = snapshot?;
        let params = params?;
        let now = self.clock.now();

        let critical_path = calculate_critical_path(&snapshot, &params, now);
        Ok(status::build_status(
            &snapshot,
            critical_path.schedule_risk,
            now,
        ))
    }

    /// Multi-project view. Per-project analyses run concurrently; a hard
    /// failure for one project becomes an error marker instead of
    /// aborting the batch.
    pub async fn get_portfolio_analytics(
        &self,
        project_ids: &[u64],
        abort: &AbortSignal,
    ) -> Result<PortfolioAnalytics> {
        let scopes: Vec<String> = project_ids.iter().map(|id| scope_for(*id)).collect();
        self.cache.warm(&scopes);

        let outcomes = futures::future::join_all(project_ids.iter().map(|id| {
            let id = *id;
            async move {
                match self.get_project_data(id, abort).await {
                    Ok(analytics) => ProjectOutcome::Analyzed {
                        analytics: Box::new(analytics),
                    },
                    Err(e) => {
                        log::warn!("portfolio: project {id} failed: {e}");
                        ProjectOutcome::Failed {
                            project_id: id,
                            error: e.to_string(),
                        }
                    }
                }
            }
        }))
        .await;

        let params = outcomes
            .iter()
            .find_map(|o| o.analytics())
            .map(|a| a.parameters.clone())
            .unwrap_or_default();
        let result = portfolio::aggregate(outcomes, &params, self.clock.now());

        // stored for introspection; portfolio reads always recompute
        if let Ok(value) = serde_json::to_value(&result) {
            self.cache
                .set("portfolio", value, Some(&portfolio_scope(project_ids)), None);
        }
        Ok(result)
    }

    /// Cache introspection passthrough
    pub fn get_cache_performance(&self) -> CacheHealth {
        self.cache.health()
    }

    /// Drop every cached result for one project
    pub fn invalidate_project(&self, project_id: u64) -> usize {
        self.cache.clear_scope(&scope_for(project_id))
    }

    /// Snapshots are never cached: schedule state changes continuously
    async fn fetch_snapshot(
        &self,
        project_id: u64,
        abort: &AbortSignal,
    ) -> Result<ProjectSnapshot> {
        let (items, entries, budgets) = futures::try_join!(
            self.source.list_work_items(project_id, abort),
            self.source.list_time_entries(project_id, None, abort),
            self.source.list_budgets(project_id, abort)
        )?;
        Ok(build_snapshot(
            project_id,
            items,
            entries,
            budgets,
            self.clock.now(),
        ))
    }

    /// Parameters are session-cached: they change rarely and must stay
    /// internally consistent across a whole analysis run
    async fn resolve_parameters(&self, project_id: u64) -> Result<ParameterSet> {
        let scope = scope_for(project_id);
        if let Some(value) = self.cache.get("parameters", Some(&scope)) {
            match serde_json::from_value(value) {
                Ok(params) => return Ok(params),
                Err(e) => {
                    log::warn!("cached parameters for {scope} are unreadable: {e}; refetching");
                }
            }
        }

        let params = self.params.parameters_for(project_id).await?;
        match serde_json::to_value(&params) {
            Ok(value) => {
                self.cache.set("parameters", value, Some(&scope), None);
            }
            Err(e) => log::warn!("could not cache parameters for {scope}: {e}"),
        }
        Ok(params)
    }

    fn read_cached<T: DeserializeOwned>(
        &self,
        kind: &str,
        scope: &str,
    ) -> Option<CachedCalculation<T>> {
        let value = self.cache.get(kind, Some(scope))?;
        match serde_json::from_value(value) {
            Ok(cached) => Some(cached),
            Err(e) => {
                // a cache error is never fatal; treat as a miss
                log::warn!("cached {kind} for {scope} is unreadable: {e}");
                None
            }
        }
    }

    fn write_back<T: Serialize>(
        &self,
        kind: &str,
        scope: &str,
        result: &T,
        started: Instant,
        snapshot: &ProjectSnapshot,
    ) {
        let meta = CalculationMeta {
            duration_ms: started.elapsed().as_millis() as u64,
            input_items: snapshot.work_items.len(),
            complexity: ComplexityClass::from_item_count(snapshot.work_items.len()),
        };
        let cached = CachedCalculation {
            result,
            meta,
        };
        match serde_json::to_value(&cached) {
            Ok(value) => {
                self.cache.set(kind, value, Some(scope), None);
            }
            Err(e) => {
                // write failure degrades to recompute-next-time
                log::warn!("could not cache {kind} for {scope}: {e}");
            }
        }
    }
}

fn compute_resource_utilization(
    snapshot: &ProjectSnapshot,
    params: &ParameterSet,
    now: DateTime<Utc>,
) -> ResourceUtilizationResult {
    calculate_resource_utilization(
        std::slice::from_ref(snapshot),
        params,
        DEFAULT_WINDOW_DAYS,
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StaticParameterStore;
    use crate::testkit::{day, time_entry, work_item, ManualClock, StaticSource};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingParams {
        inner: StaticParameterStore,
        pub calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ParameterStore for CountingParams {
        async fn parameters_for(&self, project_id: u64) -> Result<ParameterSet> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.parameters_for(project_id).await
        }
    }

    fn fixture() -> (
        AnalyticsOrchestrator,
        Arc<ManualClock>,
        Arc<StaticSource>,
        Arc<CountingParams>,
    ) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(AnalyticsCache::with_clock(clock.clone()));
        let source = Arc::new(
            StaticSource::new()
                .with_project(
                    1,
                    vec![
                        work_item(1).estimated(10.0).complete(50.0).build(),
                        work_item(2).estimated(20.0).after(1).build(),
                    ],
                    vec![time_entry(5, 4.0, day(2026, 3, 1))],
                )
                .with_failing_project(13),
        );
        let params = Arc::new(CountingParams {
            inner: StaticParameterStore::new(ParameterSet::default()),
            calls: AtomicUsize::new(0),
        });
        let orchestrator =
            AnalyticsOrchestrator::new(cache, source.clone(), params.clone())
                .with_clock(clock.clone());
        (orchestrator, clock, source, params)
    }

    #[tokio::test]
    async fn snapshot_is_fetched_fresh_on_every_call() {
        let (orchestrator, _, source, _) = fixture();
        let abort = AbortSignal::none();

        orchestrator.get_project_data(1, &abort).await.unwrap();
        orchestrator.get_project_data(1, &abort).await.unwrap();
        assert_eq!(source.work_item_fetches.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn fresh_evm_is_served_from_cache() {
        let (orchestrator, clock, _, _) = fixture();
        let abort = AbortSignal::none();

        let first = orchestrator.get_project_data(1, &abort).await.unwrap();
        clock.advance(Duration::hours(1));
        let second = orchestrator.get_project_data(1, &abort).await.unwrap();

        // same calculation date means the cached result was reused
        assert_eq!(
            second.evm.calculation_date,
            first.evm.calculation_date
        );
        assert_eq!(
            second.critical_path.calculation_date,
            first.critical_path.calculation_date
        );
    }

    #[tokio::test]
    async fn evm_is_recomputed_after_a_day() {
        let (orchestrator, clock, _, _) = fixture();
        let abort = AbortSignal::none();

        let first = orchestrator.get_project_data(1, &abort).await.unwrap();
        clock.advance(Duration::hours(25));
        let second = orchestrator.get_project_data(1, &abort).await.unwrap();

        assert!(second.evm.calculation_date > first.evm.calculation_date);
    }

    #[tokio::test]
    async fn cpm_ages_out_before_evm() {
        let (orchestrator, clock, _, _) = fixture();
        let abort = AbortSignal::none();

        let first = orchestrator.get_project_data(1, &abort).await.unwrap();
        clock.advance(Duration::hours(13));
        let second = orchestrator.get_project_data(1, &abort).await.unwrap();

        assert_eq!(second.evm.calculation_date, first.evm.calculation_date);
        assert!(second.critical_path.calculation_date > first.critical_path.calculation_date);
    }

    #[tokio::test]
    async fn resource_utilization_is_always_recomputed() {
        let (orchestrator, clock, _, _) = fixture();
        let abort = AbortSignal::none();

        let first = orchestrator.get_project_data(1, &abort).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = orchestrator.get_project_data(1, &abort).await.unwrap();

        assert!(
            second.resource_utilization.calculation_date
                > first.resource_utilization.calculation_date
        );
    }

    #[tokio::test]
    async fn parameters_are_resolved_once_per_session() {
        let (orchestrator, clock, _, params) = fixture();
        let abort = AbortSignal::none();

        orchestrator.get_project_data(1, &abort).await.unwrap();
        clock.advance(Duration::days(3));
        orchestrator.get_project_data(1, &abort).await.unwrap();

        assert_eq!(params.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_parameter_refetch() {
        let (orchestrator, _, _, params) = fixture();
        let abort = AbortSignal::none();

        orchestrator.get_project_data(1, &abort).await.unwrap();
        orchestrator.invalidate_project(1);
        orchestrator.get_project_data(1, &abort).await.unwrap();

        assert_eq!(params.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn source_failure_is_not_cached() {
        let (orchestrator, _, _, _) = fixture();
        let abort = AbortSignal::none();

        assert!(orchestrator.get_project_data(13, &abort).await.is_err());
        let stats = orchestrator.get_cache_performance().stats;
        // nothing was written for the failed project
        assert!(!stats
            .top_kinds
            .iter()
            .any(|(kind, _)| kind == "evm" || kind == "critical_path"));
    }

    #[tokio::test]
    async fn portfolio_isolates_failing_projects() {
        let (orchestrator, _, _, _) = fixture();
        let abort = AbortSignal::none();

        let result = orchestrator
            .get_portfolio_analytics(&[1, 13], &abort)
            .await
            .unwrap();

        assert_eq!(result.projects.len(), 2);
        let failed: Vec<u64> = result
            .projects
            .iter()
            .filter(|p| p.analytics().is_none())
            .map(|p| p.project_id())
            .collect();
        assert_eq!(failed, vec![13]);
        assert!(result.total_budget > 0.0);
    }

    #[tokio::test]
    async fn project_status_reflects_todays_hours() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(AnalyticsCache::with_clock(clock.clone()));
        let source = Arc::new(StaticSource::new().with_project(
            1,
            vec![work_item(1).estimated(10.0).due(day(2026, 3, 3)).build()],
            vec![time_entry(5, 2.0, day(2026, 3, 2))],
        ));
        let params = Arc::new(StaticParameterStore::new(ParameterSet::default()));
        let orchestrator =
            AnalyticsOrchestrator::new(cache, source, params).with_clock(clock.clone());

        let status = orchestrator
            .get_project_status(1, &AbortSignal::none())
            .await
            .unwrap();
        assert_eq!(status.hours_logged_today, 2.0);
        assert_eq!(status.upcoming_deadlines.len(), 1);
        assert!(status.alerts.iter().any(|a| a.contains("due in")));
    }
}
