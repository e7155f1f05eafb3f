//! Result writers for the CLI: JSON for machines, colored terminal
//! sections for humans.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use colored::*;

use crate::cache::CacheHealth;
use crate::core::types::{
    HealthTier, PortfolioAnalytics, ProjectAnalytics, ProjectStatus, ScheduleRisk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Terminal,
}

pub trait AnalyticsWriter {
    fn write_project(&mut self, analytics: &ProjectAnalytics) -> anyhow::Result<()>;
    fn write_portfolio(&mut self, portfolio: &PortfolioAnalytics) -> anyhow::Result<()>;
    fn write_status(&mut self, status: &ProjectStatus) -> anyhow::Result<()>;
    fn write_cache_health(&mut self, health: &CacheHealth) -> anyhow::Result<()>;
}

/// Writer factory: JSON or terminal, to stdout or a file
pub fn create_writer(
    format: OutputFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<Box<dyn AnalyticsWriter>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    Ok(match format {
        OutputFormat::Json => Box::new(JsonWriter::new(sink)),
        OutputFormat::Terminal => Box::new(TerminalWriter::new(sink)),
    })
}

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_value<T: serde::Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> AnalyticsWriter for JsonWriter<W> {
    fn write_project(&mut self, analytics: &ProjectAnalytics) -> anyhow::Result<()> {
        self.write_value(analytics)
    }

    fn write_portfolio(&mut self, portfolio: &PortfolioAnalytics) -> anyhow::Result<()> {
        self.write_value(portfolio)
    }

    fn write_status(&mut self, status: &ProjectStatus) -> anyhow::Result<()> {
        self.write_value(status)
    }

    fn write_cache_health(&mut self, health: &CacheHealth) -> anyhow::Result<()> {
        self.write_value(health)
    }
}

pub struct TerminalWriter<W: Write> {
    writer: W,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

fn tier_label(tier: HealthTier) -> ColoredString {
    match tier {
        HealthTier::Green => tier.display_name().green(),
        HealthTier::Yellow => tier.display_name().yellow(),
        HealthTier::Red => tier.display_name().red(),
    }
}

fn risk_label(risk: ScheduleRisk) -> ColoredString {
    match risk {
        ScheduleRisk::Low => risk.display_name().green(),
        ScheduleRisk::Medium => risk.display_name().yellow(),
        ScheduleRisk::High => risk.display_name().red(),
    }
}

impl<W: Write> AnalyticsWriter for TerminalWriter<W> {
    fn write_project(&mut self, analytics: &ProjectAnalytics) -> anyhow::Result<()> {
        let evm = &analytics.evm;
        writeln!(self.writer, "{}", format!("PROJECT {} ANALYTICS", analytics.project_id).bold())?;
        writeln!(self.writer, "{}", "════════════════════════════════".dimmed())?;
        writeln!(self.writer)?;

        writeln!(self.writer, "{}", "Earned Value".bold())?;
        writeln!(
            self.writer,
            "  BAC {:>12.2}  PV {:>12.2}  EV {:>12.2}  AC {:>12.2}",
            evm.bac, evm.planned_value, evm.earned_value, evm.actual_cost
        )?;
        writeln!(
            self.writer,
            "  CPI {:.3} ({})  SPI {:.3} ({})",
            evm.cpi,
            evm.cost_status.display_name(),
            evm.spi,
            evm.schedule_status.display_name()
        )?;
        writeln!(
            self.writer,
            "  EAC {:.2}  ETC {:.2}  VAC {:.2}  TCPI {:.3}",
            evm.estimate_at_completion, evm.estimate_to_complete, evm.variance_at_completion, evm.tcpi
        )?;
        writeln!(
            self.writer,
            "  Health {}  Confidence {:.0}%",
            tier_label(evm.health),
            evm.confidence * 100.0
        )?;
        if !evm.data_complete {
            writeln!(self.writer, "  {}", "Input data was incomplete".yellow())?;
        }
        writeln!(self.writer)?;

        let cpm = &analytics.critical_path;
        writeln!(self.writer, "{}", "Critical Path".bold())?;
        writeln!(
            self.writer,
            "  {} tasks, {:.0} days end to end, risk {}",
            cpm.nodes.len(),
            cpm.project_duration_days,
            risk_label(cpm.schedule_risk)
        )?;
        if !cpm.critical_path.is_empty() {
            let path: Vec<String> = cpm.critical_path.iter().map(u64::to_string).collect();
            writeln!(self.writer, "  Path: {}", path.join(" -> "))?;
        }
        for recommendation in &cpm.recommendations {
            writeln!(self.writer, "  - {recommendation}")?;
        }
        writeln!(self.writer)?;

        writeln!(self.writer, "{}", "Resources (7-day window)".bold())?;
        for user in &analytics.resource_utilization.users {
            let rate = format!("{:.0}%", user.utilization_rate * 100.0);
            let rate = if user.overallocated { rate.red() } else { rate.normal() };
            writeln!(
                self.writer,
                "  user {:<6} worked {:>6.1}h  allocated {:>6.1}h  utilization {}",
                user.user_id, user.worked_hours, user.allocated_hours, rate
            )?;
        }
        Ok(())
    }

    fn write_portfolio(&mut self, portfolio: &PortfolioAnalytics) -> anyhow::Result<()> {
        writeln!(self.writer, "{}", "PORTFOLIO ANALYTICS".bold())?;
        writeln!(self.writer, "{}", "════════════════════════════════".dimmed())?;
        writeln!(
            self.writer,
            "  {} projects, health {}",
            portfolio.projects.len(),
            tier_label(portfolio.health)
        )?;
        writeln!(
            self.writer,
            "  Budget {:.2}  Spent {:.2}  Average completion {:.1}%",
            portfolio.total_budget, portfolio.total_spent, portfolio.average_completion
        )?;
        if !portfolio.projects_at_risk.is_empty() {
            let ids: Vec<String> = portfolio.projects_at_risk.iter().map(u64::to_string).collect();
            writeln!(self.writer, "  {} {}", "At risk:".red(), ids.join(", "))?;
        }
        for conflict in &portfolio.resource_conflicts {
            writeln!(
                self.writer,
                "  {} user {} at {:.0}% across projects {:?}",
                "Conflict:".red(),
                conflict.user_id,
                conflict.combined_utilization * 100.0,
                conflict.project_ids
            )?;
        }
        for outcome in &portfolio.projects {
            if let crate::core::types::ProjectOutcome::Failed { project_id, error } = outcome {
                writeln!(self.writer, "  {} project {project_id}: {error}", "Failed:".red())?;
            }
        }
        for recommendation in &portfolio.recommendations {
            writeln!(self.writer, "  - {recommendation}")?;
        }
        Ok(())
    }

    fn write_status(&mut self, status: &ProjectStatus) -> anyhow::Result<()> {
        writeln!(
            self.writer,
            "{}",
            format!("PROJECT {} STATUS", status.project_id).bold()
        )?;
        writeln!(
            self.writer,
            "  {:.1}h logged today, {} open items overdue, schedule risk {}",
            status.hours_logged_today,
            status.overdue_open_items,
            risk_label(status.schedule_risk)
        )?;
        if !status.upcoming_deadlines.is_empty() {
            writeln!(self.writer, "  Upcoming deadlines:")?;
            for deadline in &status.upcoming_deadlines {
                writeln!(
                    self.writer,
                    "    {} - {} ({} days)",
                    deadline.due_date, deadline.title, deadline.days_until
                )?;
            }
        }
        for alert in &status.alerts {
            writeln!(self.writer, "  {} {alert}", "!".yellow())?;
        }
        Ok(())
    }

    fn write_cache_health(&mut self, health: &CacheHealth) -> anyhow::Result<()> {
        let status = match health.status {
            crate::cache::CacheHealthStatus::Healthy => health.status.display_name().green(),
            crate::cache::CacheHealthStatus::Warning => health.status.display_name().yellow(),
            crate::cache::CacheHealthStatus::Critical => health.status.display_name().red(),
        };
        writeln!(self.writer, "{} {}", "CACHE".bold(), status)?;
        let stats = &health.stats;
        writeln!(
            self.writer,
            "  {} entries ({} expired), ~{} bytes, hit rate {:.0}% ({} hits / {} misses)",
            stats.entries,
            stats.expired_unswept,
            stats.estimated_bytes,
            stats.hit_rate * 100.0,
            stats.hits,
            stats.misses
        )?;
        for (kind, count) in &stats.top_kinds {
            writeln!(self.writer, "  {kind}: {count}")?;
        }
        for recommendation in &health.recommendations {
            writeln!(self.writer, "  - {recommendation}")?;
        }
        Ok(())
    }
}
