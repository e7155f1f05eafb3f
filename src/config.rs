//! Parameter-set configuration consumed by the calculation engine.
//!
//! The engine never sees untyped key/value pairs; external parameter
//! stores resolve into this struct at the boundary (see `crate::params`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};

/// Which estimate-at-completion variant is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    CpiBased,
    BudgetRate,
    SpiCpiCombined,
    AcPlusRemainingOverCpi,
    CustomRegression,
}

/// Organizational appetite for schedule risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

/// Tuning for the custom-regression EAC variant. The cutoffs are
/// empirical defaults, kept configurable rather than baked into the
/// formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTuning {
    /// Average performance above this gets the optimistic multiplier
    #[serde(default = "default_high_performance_cutoff")]
    pub high_performance_cutoff: f64,

    /// Average performance below this gets the pessimistic multiplier
    #[serde(default = "default_low_performance_cutoff")]
    pub low_performance_cutoff: f64,

    #[serde(default = "default_optimistic_multiplier")]
    pub optimistic_multiplier: f64,

    #[serde(default = "default_pessimistic_multiplier")]
    pub pessimistic_multiplier: f64,
}

impl Default for RegressionTuning {
    fn default() -> Self {
        Self {
            high_performance_cutoff: default_high_performance_cutoff(),
            low_performance_cutoff: default_low_performance_cutoff(),
            optimistic_multiplier: default_optimistic_multiplier(),
            pessimistic_multiplier: default_pessimistic_multiplier(),
        }
    }
}

/// Named constants supplied externally and treated as configuration.
///
/// Cached for the lifetime of a session so a whole analysis run sees one
/// internally consistent set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Blended labor rate in currency units per hour
    #[serde(default = "default_standard_labor_rate")]
    pub standard_labor_rate: f64,

    #[serde(default = "default_overtime_multiplier")]
    pub overtime_multiplier: f64,

    /// CPI at or above this is merely over budget; below is serious
    #[serde(default = "default_cost_performance_threshold")]
    pub cost_performance_threshold: f64,

    #[serde(default = "default_schedule_performance_threshold")]
    pub schedule_performance_threshold: f64,

    /// Fraction of capacity a user is assumed to be bookable for
    #[serde(default = "default_default_allocation")]
    pub default_allocation: f64,

    /// Combined utilization above this flags overallocation
    #[serde(default = "default_max_allocation")]
    pub max_allocation: f64,

    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,

    #[serde(default = "default_days_per_week")]
    pub days_per_week: f64,

    #[serde(default = "default_forecast_method")]
    pub forecast_method: ForecastMethod,

    #[serde(default = "default_risk_tolerance")]
    pub risk_tolerance: RiskTolerance,

    #[serde(default)]
    pub regression: RegressionTuning,

    /// Per-user rate overrides; an empty map collapses actual cost to the
    /// single standard rate
    #[serde(default)]
    pub user_rates: HashMap<u64, f64>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            standard_labor_rate: default_standard_labor_rate(),
            overtime_multiplier: default_overtime_multiplier(),
            cost_performance_threshold: default_cost_performance_threshold(),
            schedule_performance_threshold: default_schedule_performance_threshold(),
            default_allocation: default_default_allocation(),
            max_allocation: default_max_allocation(),
            hours_per_day: default_hours_per_day(),
            days_per_week: default_days_per_week(),
            forecast_method: default_forecast_method(),
            risk_tolerance: default_risk_tolerance(),
            regression: RegressionTuning::default(),
            user_rates: HashMap::new(),
        }
    }
}

impl ParameterSet {
    /// The labor rate applying to a specific user
    pub fn rate_for_user(&self, user_id: u64) -> f64 {
        self.user_rates
            .get(&user_id)
            .copied()
            .unwrap_or(self.standard_labor_rate)
    }

    // Pure function: check that a value is strictly positive
    fn validate_positive(value: f64, name: &str) -> std::result::Result<(), String> {
        if value > 0.0 {
            Ok(())
        } else {
            Err(format!("{} must be positive, got {}", name, value))
        }
    }

    /// Validate internal consistency of the parameter set
    pub fn validate(&self) -> std::result::Result<(), String> {
        Self::validate_positive(self.standard_labor_rate, "standard_labor_rate")?;
        Self::validate_positive(self.overtime_multiplier, "overtime_multiplier")?;
        Self::validate_positive(self.cost_performance_threshold, "cost_performance_threshold")?;
        Self::validate_positive(
            self.schedule_performance_threshold,
            "schedule_performance_threshold",
        )?;
        Self::validate_positive(self.default_allocation, "default_allocation")?;
        Self::validate_positive(self.max_allocation, "max_allocation")?;

        if !(0.0..=24.0).contains(&self.hours_per_day) || self.hours_per_day == 0.0 {
            return Err(format!(
                "hours_per_day must be in (0, 24], got {}",
                self.hours_per_day
            ));
        }
        if !(0.0..=7.0).contains(&self.days_per_week) || self.days_per_week == 0.0 {
            return Err(format!(
                "days_per_week must be in (0, 7], got {}",
                self.days_per_week
            ));
        }
        if self.max_allocation < self.default_allocation {
            return Err(format!(
                "max_allocation ({}) must not be below default_allocation ({})",
                self.max_allocation, self.default_allocation
            ));
        }
        if self.regression.low_performance_cutoff >= self.regression.high_performance_cutoff {
            return Err(format!(
                "regression cutoffs must satisfy low < high, got {} >= {}",
                self.regression.low_performance_cutoff, self.regression.high_performance_cutoff
            ));
        }
        for (user, rate) in &self.user_rates {
            if *rate <= 0.0 {
                return Err(format!("rate override for user {} must be positive", user));
            }
        }
        Ok(())
    }

    /// Apply per-field overrides on top of this set, overrides winning
    pub fn merged_with(&self, overrides: &ParameterOverrides) -> ParameterSet {
        let mut merged = self.clone();
        if let Some(v) = overrides.standard_labor_rate {
            merged.standard_labor_rate = v;
        }
        if let Some(v) = overrides.overtime_multiplier {
            merged.overtime_multiplier = v;
        }
        if let Some(v) = overrides.cost_performance_threshold {
            merged.cost_performance_threshold = v;
        }
        if let Some(v) = overrides.schedule_performance_threshold {
            merged.schedule_performance_threshold = v;
        }
        if let Some(v) = overrides.default_allocation {
            merged.default_allocation = v;
        }
        if let Some(v) = overrides.max_allocation {
            merged.max_allocation = v;
        }
        if let Some(v) = overrides.hours_per_day {
            merged.hours_per_day = v;
        }
        if let Some(v) = overrides.days_per_week {
            merged.days_per_week = v;
        }
        if let Some(v) = overrides.forecast_method {
            merged.forecast_method = v;
        }
        if let Some(v) = overrides.risk_tolerance {
            merged.risk_tolerance = v;
        }
        if let Some(v) = &overrides.regression {
            merged.regression = v.clone();
        }
        for (user, rate) in &overrides.user_rates {
            merged.user_rates.insert(*user, *rate);
        }
        merged
    }

    /// Load a parameter set from a TOML or JSON file, keyed by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let params: ParameterSet = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::Configuration(format!("invalid TOML in {}: {e}", path.display())))?,
            _ => serde_json::from_str(&content)?,
        };
        params.validate().map_err(Error::Configuration)?;
        Ok(params)
    }
}

/// Project-level overrides; every field optional, merged per field over
/// the organizational defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    pub standard_labor_rate: Option<f64>,
    pub overtime_multiplier: Option<f64>,
    pub cost_performance_threshold: Option<f64>,
    pub schedule_performance_threshold: Option<f64>,
    pub default_allocation: Option<f64>,
    pub max_allocation: Option<f64>,
    pub hours_per_day: Option<f64>,
    pub days_per_week: Option<f64>,
    pub forecast_method: Option<ForecastMethod>,
    pub risk_tolerance: Option<RiskTolerance>,
    pub regression: Option<RegressionTuning>,
    #[serde(default)]
    pub user_rates: HashMap<u64, f64>,
}

fn default_standard_labor_rate() -> f64 {
    75.0
}

fn default_overtime_multiplier() -> f64 {
    1.5
}

fn default_cost_performance_threshold() -> f64 {
    0.9
}

fn default_schedule_performance_threshold() -> f64 {
    0.95
}

fn default_default_allocation() -> f64 {
    0.8
}

fn default_max_allocation() -> f64 {
    1.0
}

fn default_hours_per_day() -> f64 {
    8.0
}

fn default_days_per_week() -> f64 {
    5.0
}

fn default_forecast_method() -> ForecastMethod {
    ForecastMethod::CpiBased
}

fn default_risk_tolerance() -> RiskTolerance {
    RiskTolerance::Medium
}

fn default_high_performance_cutoff() -> f64 {
    1.1
}

fn default_low_performance_cutoff() -> f64 {
    0.8
}

fn default_optimistic_multiplier() -> f64 {
    1.05
}

fn default_pessimistic_multiplier() -> f64 {
    0.9
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_validate() {
        assert!(ParameterSet::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_labor_rate() {
        let params = ParameterSet {
            standard_labor_rate: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_inverted_allocations() {
        let params = ParameterSet {
            default_allocation: 1.2,
            max_allocation: 1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_inverted_regression_cutoffs() {
        let params = ParameterSet {
            regression: RegressionTuning {
                high_performance_cutoff: 0.7,
                low_performance_cutoff: 0.8,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn overrides_win_per_field() {
        let defaults = ParameterSet::default();
        let overrides = ParameterOverrides {
            standard_labor_rate: Some(120.0),
            forecast_method: Some(ForecastMethod::SpiCpiCombined),
            ..Default::default()
        };
        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.standard_labor_rate, 120.0);
        assert_eq!(merged.forecast_method, ForecastMethod::SpiCpiCombined);
        // untouched fields keep the defaults
        assert_eq!(merged.hours_per_day, defaults.hours_per_day);
    }

    #[test]
    fn user_rate_overrides_merge_into_map() {
        let mut defaults = ParameterSet::default();
        defaults.user_rates.insert(1, 60.0);
        let mut overrides = ParameterOverrides::default();
        overrides.user_rates.insert(2, 95.0);

        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.rate_for_user(1), 60.0);
        assert_eq!(merged.rate_for_user(2), 95.0);
        assert_eq!(merged.rate_for_user(3), merged.standard_labor_rate);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let params: ParameterSet =
            toml::from_str("standard_labor_rate = 100.0\nforecast_method = \"budget_rate\"\n")
                .unwrap();
        assert_eq!(params.standard_labor_rate, 100.0);
        assert_eq!(params.forecast_method, ForecastMethod::BudgetRate);
        assert_eq!(params.hours_per_day, 8.0);
    }

    #[test]
    fn serde_round_trip_preserves_forecast_method() {
        let params = ParameterSet {
            forecast_method: ForecastMethod::CustomRegression,
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
