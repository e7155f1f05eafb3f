//! File-backed project source.
//!
//! Reads a JSON export of one or more projects so the engine can be
//! exercised offline by the CLI and by tests. The export shape mirrors
//! what the HTTP source returns per project.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AbortSignal, ProjectSource, RawBudget, RawTimeEntry, RawWorkItem};
use crate::errors::{Error, Result};

/// One project's worth of raw rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectExport {
    pub project_id: u64,
    #[serde(default)]
    pub work_items: Vec<RawWorkItem>,
    #[serde(default)]
    pub time_entries: Vec<RawTimeEntry>,
    #[serde(default)]
    pub budgets: Vec<RawBudget>,
}

/// In-memory source loaded from a JSON export file
pub struct JsonFileSource {
    projects: HashMap<u64, ProjectExport>,
}

impl JsonFileSource {
    /// Accepts either a single export object or an array of them
    pub fn from_str(content: &str) -> Result<Self> {
        let exports: Vec<ProjectExport> = match serde_json::from_str::<Vec<ProjectExport>>(content)
        {
            Ok(list) => list,
            Err(_) => vec![serde_json::from_str::<ProjectExport>(content)?],
        };
        Ok(Self {
            projects: exports.into_iter().map(|e| (e.project_id, e)).collect(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// All project ids present in the export, ascending
    pub fn project_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.projects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn project(&self, project_id: u64) -> Result<&ProjectExport> {
        self.projects.get(&project_id).ok_or_else(|| {
            Error::source_failure(format!("project {project_id} not in export"), Some(404), false)
        })
    }
}

#[async_trait::async_trait]
impl ProjectSource for JsonFileSource {
    async fn list_work_items(
        &self,
        project_id: u64,
        _abort: &AbortSignal,
    ) -> Result<Vec<RawWorkItem>> {
        Ok(self.project(project_id)?.work_items.clone())
    }

    async fn list_time_entries(
        &self,
        project_id: u64,
        range: Option<(NaiveDate, NaiveDate)>,
        _abort: &AbortSignal,
    ) -> Result<Vec<RawTimeEntry>> {
        let entries = self.project(project_id)?.time_entries.clone();
        Ok(match range {
            Some((from, to)) => entries
                .into_iter()
                .filter(|e| e.spent_on.is_none_or(|d| d >= from && d <= to))
                .collect(),
            None => entries,
        })
    }

    async fn list_budgets(&self, project_id: u64, _abort: &AbortSignal) -> Result<Vec<RawBudget>> {
        Ok(self.project(project_id)?.budgets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::day;

    const EXPORT: &str = r#"[
        {
            "project_id": 1,
            "work_items": [
                {"id": 1, "subject": "Design", "done_ratio": 100, "estimated_hours": 16},
                {"id": 2, "subject": "Build", "done_ratio": 30, "estimated_hours": 40, "predecessor_ids": [1]}
            ],
            "time_entries": [
                {"hours": 8, "spent_on": "2026-03-01", "user_id": 5},
                {"hours": 6, "spent_on": "2026-03-05", "user_id": 5}
            ]
        },
        {"project_id": 2}
    ]"#;

    #[tokio::test]
    async fn loads_multiple_projects() {
        let source = JsonFileSource::from_str(EXPORT).unwrap();
        assert_eq!(source.project_ids(), vec![1, 2]);

        let items = source
            .list_work_items(1, &AbortSignal::none())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].predecessor_ids, vec![1]);
    }

    #[tokio::test]
    async fn filters_time_entries_by_range() {
        let source = JsonFileSource::from_str(EXPORT).unwrap();
        let entries = source
            .list_time_entries(1, Some((day(2026, 3, 2), day(2026, 3, 9))), &AbortSignal::none())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, Some(6.0));
    }

    #[tokio::test]
    async fn unknown_project_is_a_source_error() {
        let source = JsonFileSource::from_str(EXPORT).unwrap();
        let err = source
            .list_work_items(9, &AbortSignal::none())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Source { status: Some(404), .. }));
    }

    #[tokio::test]
    async fn accepts_single_object_export() {
        let source = JsonFileSource::from_str(r#"{"project_id": 7}"#).unwrap();
        assert_eq!(source.project_ids(), vec![7]);
    }
}
