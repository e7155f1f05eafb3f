//! Parameter-store boundary.
//!
//! External stores keep tunable constants in loosely-typed custom-field
//! slots; all of that duck typing is confined to this module. Two-level
//! resolution applies organizational defaults first, then per-project
//! overrides, overrides winning per field. The calculation engine only
//! ever sees the resolved [`ParameterSet`].

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{ParameterOverrides, ParameterSet};
use crate::errors::{Error, Result};

/// Read access to the external parameter store
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// The fully resolved parameter set for one project
    async fn parameters_for(&self, project_id: u64) -> Result<ParameterSet>;
}

/// In-memory store: organizational defaults plus per-project overrides
#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    defaults: ParameterSet,
    overrides: HashMap<u64, ParameterOverrides>,
}

impl StaticParameterStore {
    pub fn new(defaults: ParameterSet) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    pub fn with_project_overrides(mut self, project_id: u64, overrides: ParameterOverrides) -> Self {
        self.overrides.insert(project_id, overrides);
        self
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn parameters_for(&self, project_id: u64) -> Result<ParameterSet> {
        let resolved = match self.overrides.get(&project_id) {
            Some(overrides) => self.defaults.merged_with(overrides),
            None => self.defaults.clone(),
        };
        resolved.validate().map_err(Error::Configuration)?;
        Ok(resolved)
    }
}

/// Shape of a parameter file: defaults plus a project-id keyed override
/// table
#[derive(Debug, Clone, Default, Deserialize)]
struct ParameterFile {
    #[serde(default)]
    defaults: Option<ParameterSet>,
    #[serde(default)]
    projects: HashMap<String, ParameterOverrides>,
}

/// Store loaded from a TOML or JSON file
#[derive(Debug, Clone)]
pub struct FileParameterStore {
    inner: StaticParameterStore,
}

impl FileParameterStore {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ParameterFile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::Configuration(format!("invalid TOML in {}: {e}", path.display()))
            })?,
            _ => serde_json::from_str(&content)?,
        };

        let mut inner = StaticParameterStore::new(file.defaults.unwrap_or_default());
        for (key, overrides) in file.projects {
            let project_id: u64 = key.parse().map_err(|_| {
                Error::Configuration(format!("project key '{key}' is not a numeric id"))
            })?;
            inner.overrides.insert(project_id, overrides);
        }
        Ok(Self { inner })
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn parameters_for(&self, project_id: u64) -> Result<ParameterSet> {
        self.inner.parameters_for(project_id).await
    }
}

/// Adapter for sources that expose parameters as string-keyed custom
/// fields. This is the only place that reads untyped key/value pairs.
pub fn overrides_from_custom_fields(fields: &HashMap<String, Value>) -> ParameterOverrides {
    let number = |key: &str| fields.get(key).and_then(Value::as_f64);

    ParameterOverrides {
        standard_labor_rate: number("standardLaborRate"),
        overtime_multiplier: number("overtimeMultiplier"),
        cost_performance_threshold: number("costPerformanceThreshold"),
        schedule_performance_threshold: number("schedulePerformanceThreshold"),
        default_allocation: number("defaultAllocation"),
        max_allocation: number("maxAllocation"),
        hours_per_day: number("workingHoursPerDay"),
        days_per_week: number("workingDaysPerWeek"),
        forecast_method: fields
            .get("forecastMethod")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        risk_tolerance: fields
            .get("riskTolerance")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        regression: None,
        user_rates: HashMap::new(),
    }
}
