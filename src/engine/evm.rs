//! Earned value management calculations.
//!
//! Formulas follow PMBOK: BAC from estimated effort at the standard
//! rate, PV by linear interpolation over each item's schedule window,
//! EV by budget share times completion, AC from logged hours. Zero
//! denominators resolve to identity values (CPI/SPI = 1, EV = 0) rather
//! than errors. Internal computation stays at full precision; rounding
//! happens once, when the result struct is assembled.

use chrono::{DateTime, NaiveDate, Utc};

use super::{round2, round3};
use crate::config::{ForecastMethod, ParameterSet};
use crate::core::types::{
    CostStatus, EacForecasts, EvmResult, HealthTier, ProjectSnapshot, ScheduleStatus,
    WorkItemAggregate,
};

/// Smallest divisor the forecast formulas will accept
const MIN_INDEX_DIVISOR: f64 = 0.01;

/// Compute the EVM result for one project as of `now`
pub fn calculate_evm(
    snapshot: &ProjectSnapshot,
    params: &ParameterSet,
    now: DateTime<Utc>,
) -> EvmResult {
    let report_date = now.date_naive();
    let items = &snapshot.work_items;

    let total_estimated: f64 = items.iter().map(|w| w.estimated_hours).sum();
    let bac: f64 = items
        .iter()
        .map(|w| w.estimated_hours * params.standard_labor_rate)
        .sum();

    let planned_value = items
        .iter()
        .map(|w| planned_share(w, params.standard_labor_rate, report_date))
        .sum::<f64>();

    let earned_value = if total_estimated > 0.0 {
        items
            .iter()
            .map(|w| {
                let budget_share = w.estimated_hours / total_estimated * bac;
                budget_share * (w.percent_complete.clamp(0.0, 100.0) / 100.0)
            })
            .sum()
    } else {
        // no estimates yet means no value can have been earned
        0.0
    };

    let actual_cost: f64 = snapshot
        .time_entries
        .iter()
        .map(|e| e.hours * params.rate_for_user(e.user_id))
        .sum();

    let cpi = safe_index(earned_value, actual_cost);
    let spi = safe_index(earned_value, planned_value);
    let cost_variance = earned_value - actual_cost;
    let schedule_variance = earned_value - planned_value;

    let remaining_work = bac - earned_value;
    let forecasts = EacForecasts {
        cpi_based: bac / cpi.max(MIN_INDEX_DIVISOR),
        budget_rate: actual_cost + remaining_work,
        spi_cpi_combined: actual_cost + remaining_work / (cpi * spi).max(MIN_INDEX_DIVISOR),
        ac_plus_remaining_over_cpi: actual_cost + remaining_work / cpi.max(MIN_INDEX_DIVISOR),
        custom_regression: custom_regression_eac(bac, cpi, spi, params),
    };
    let estimate_at_completion = select_eac(&forecasts, params.forecast_method);
    let estimate_to_complete = (estimate_at_completion - actual_cost).max(0.0);
    let variance_at_completion = bac - estimate_at_completion;

    let remaining_budget = bac - actual_cost;
    let tcpi = if remaining_budget > 0.0 {
        (bac - earned_value) / remaining_budget
    } else {
        1.0
    };

    let cost_status = classify_cost(cpi, params.cost_performance_threshold);
    let schedule_status = classify_schedule(spi, params.schedule_performance_threshold);
    let health = classify_health(
        cpi,
        spi,
        params.cost_performance_threshold,
        params.schedule_performance_threshold,
    );

    let completion_percent = if bac > 0.0 {
        earned_value / bac * 100.0
    } else {
        0.0
    };
    let confidence = confidence_score(snapshot, total_estimated, completion_percent);

    EvmResult {
        project_id: snapshot.project_id,
        bac: round2(bac),
        planned_value: round2(planned_value),
        earned_value: round2(earned_value),
        actual_cost: round2(actual_cost),
        cpi: round3(cpi),
        spi: round3(spi),
        cost_variance: round2(cost_variance),
        schedule_variance: round2(schedule_variance),
        forecasts: EacForecasts {
            cpi_based: round2(forecasts.cpi_based),
            budget_rate: round2(forecasts.budget_rate),
            spi_cpi_combined: round2(forecasts.spi_cpi_combined),
            ac_plus_remaining_over_cpi: round2(forecasts.ac_plus_remaining_over_cpi),
            custom_regression: round2(forecasts.custom_regression),
        },
        estimate_at_completion: round2(estimate_at_completion),
        estimate_to_complete: round2(estimate_to_complete),
        variance_at_completion: round2(variance_at_completion),
        tcpi: round3(tcpi),
        cost_status,
        schedule_status,
        health,
        confidence: round2(confidence),
        data_complete: snapshot.data_complete,
        calculation_date: now,
    }
}

/// Planned value contribution of one item as of the report date. Items
/// without both schedule dates contribute nothing.
fn planned_share(item: &WorkItemAggregate, rate: f64, report_date: NaiveDate) -> f64 {
    let (Some(start), Some(due)) = (item.start_date, item.due_date) else {
        return 0.0;
    };
    let budget = item.estimated_hours * rate;
    budget * elapsed_fraction(start, due, report_date)
}

/// Linear elapsed fraction of [start, due] as of `date`, clamped to [0, 1]
fn elapsed_fraction(start: NaiveDate, due: NaiveDate, date: NaiveDate) -> f64 {
    if date < start {
        return 0.0;
    }
    if date >= due {
        return 1.0;
    }
    let span = (due - start).num_days() as f64;
    if span <= 0.0 {
        return 1.0;
    }
    ((date - start).num_days() as f64 / span).clamp(0.0, 1.0)
}

/// EV over a denominator that may legitimately be zero; the identity
/// index means "no data yet", not an error
fn safe_index(earned_value: f64, denominator: f64) -> f64 {
    if denominator.abs() < f64::EPSILON {
        1.0
    } else {
        earned_value / denominator
    }
}

/// The custom-regression EAC variant: average the indices, nudge for
/// risk, divide BAC by the adjusted average
fn custom_regression_eac(bac: f64, cpi: f64, spi: f64, params: &ParameterSet) -> f64 {
    let average = (cpi + spi) / 2.0;
    let tuning = &params.regression;
    let adjusted = if average > tuning.high_performance_cutoff {
        average * tuning.optimistic_multiplier
    } else if average < tuning.low_performance_cutoff {
        average * tuning.pessimistic_multiplier
    } else {
        average
    };
    bac / adjusted.max(MIN_INDEX_DIVISOR)
}

fn select_eac(forecasts: &EacForecasts, method: ForecastMethod) -> f64 {
    match method {
        ForecastMethod::CpiBased => forecasts.cpi_based,
        ForecastMethod::BudgetRate => forecasts.budget_rate,
        ForecastMethod::SpiCpiCombined => forecasts.spi_cpi_combined,
        ForecastMethod::AcPlusRemainingOverCpi => forecasts.ac_plus_remaining_over_cpi,
        ForecastMethod::CustomRegression => forecasts.custom_regression,
    }
}

fn classify_cost(cpi: f64, threshold: f64) -> CostStatus {
    if cpi >= 1.0 {
        CostStatus::UnderBudget
    } else if cpi >= threshold {
        CostStatus::OverBudget
    } else {
        CostStatus::SeriouslyOverBudget
    }
}

fn classify_schedule(spi: f64, threshold: f64) -> ScheduleStatus {
    if spi >= 1.05 {
        ScheduleStatus::Ahead
    } else if spi >= threshold {
        ScheduleStatus::OnTrack
    } else if spi >= threshold * 0.9 {
        ScheduleStatus::Behind
    } else {
        ScheduleStatus::SeriouslyBehind
    }
}

fn classify_health(cpi: f64, spi: f64, cost_threshold: f64, schedule_threshold: f64) -> HealthTier {
    if cpi >= cost_threshold && spi >= schedule_threshold {
        HealthTier::Green
    } else if cpi < cost_threshold * 0.85 && spi < schedule_threshold * 0.85 {
        HealthTier::Red
    } else {
        HealthTier::Yellow
    }
}

/// Confidence starts at 0.5 and earns fixed increments for signals that
/// the inputs are substantial, capped at 1.0
fn confidence_score(snapshot: &ProjectSnapshot, total_estimated: f64, completion: f64) -> f64 {
    let mut score: f64 = 0.5;
    if !snapshot.work_items.is_empty() {
        score += 0.1;
    }
    if snapshot.time_entries.len() > 10 {
        score += 0.1;
    }
    if total_estimated > 0.0 {
        score += 0.1;
    }
    if completion > 25.0 {
        score += 0.1;
    }
    if completion > 50.0 {
        score += 0.1;
    }
    score.min(1.0)
}
