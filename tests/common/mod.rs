//! Shared fixtures for the integration tests

use std::sync::Arc;

use pmolens::cache::AnalyticsCache;
use pmolens::extraction::file::JsonFileSource;
use pmolens::params::StaticParameterStore;
use pmolens::testkit::ManualClock;
use pmolens::{AnalyticsOrchestrator, ParameterSet};

/// A two-project export: project 1 is a chain of design/build/verify
/// work in flight, project 2 is empty
pub const EXPORT: &str = r#"[
    {
        "project_id": 1,
        "work_items": [
            {
                "id": 1, "subject": "Design", "done_ratio": 100,
                "estimated_hours": 16,
                "start_date": "2026-02-23", "due_date": "2026-02-25"
            },
            {
                "id": 2, "subject": "Build", "done_ratio": 50,
                "estimated_hours": 40, "assigned_to_id": 5,
                "start_date": "2026-02-25", "due_date": "2026-03-04",
                "predecessor_ids": [1]
            },
            {
                "id": 3, "subject": "Verify", "done_ratio": 0,
                "estimated_hours": 8, "assigned_to_id": 5,
                "start_date": "2026-03-04", "due_date": "2026-03-05",
                "predecessor_ids": [2]
            }
        ],
        "time_entries": [
            {"hours": 8, "spent_on": "2026-02-23", "user_id": 5},
            {"hours": 8, "spent_on": "2026-02-24", "user_id": 5},
            {"hours": 4, "spent_on": "2026-03-02", "user_id": 5}
        ]
    },
    {"project_id": 2}
]"#;

pub fn orchestrator_over(export: &str) -> (AnalyticsOrchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let cache = Arc::new(AnalyticsCache::with_clock(clock.clone()));
    let source = Arc::new(JsonFileSource::from_str(export).unwrap());
    let params = Arc::new(StaticParameterStore::new(ParameterSet::default()));
    let orchestrator = AnalyticsOrchestrator::new(cache, source, params).with_clock(clock.clone());
    (orchestrator, clock)
}
