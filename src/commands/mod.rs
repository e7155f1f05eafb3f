//! CLI command handlers: build an orchestrator over the file-backed
//! source and hand results to the selected writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::cache::AnalyticsCache;
use crate::cli::{Cli, Commands};
use crate::config::ParameterSet;
use crate::extraction::file::JsonFileSource;
use crate::extraction::AbortSignal;
use crate::io::{create_writer, OutputFormat};
use crate::orchestrator::AnalyticsOrchestrator;
use crate::params::{FileParameterStore, ParameterStore, StaticParameterStore};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Analyze {
            export,
            project,
            format,
            output,
            params,
        } => analyze(&export, project, format, output, params.as_deref()).await,
        Commands::Portfolio {
            export,
            projects,
            format,
            output,
            params,
        } => portfolio(&export, projects, format, output, params.as_deref()).await,
        Commands::Status {
            export,
            project,
            format,
            output,
            params,
        } => status(&export, project, format, output, params.as_deref()).await,
        Commands::CacheStats {
            export,
            projects,
            params,
        } => cache_stats(&export, projects, params.as_deref()).await,
    }
}

struct Setup {
    orchestrator: AnalyticsOrchestrator,
    project_ids: Vec<u64>,
}

fn build(export: &Path, params_path: Option<&Path>) -> anyhow::Result<Setup> {
    let source = JsonFileSource::from_path(export)
        .with_context(|| format!("reading export {}", export.display()))?;
    let project_ids = source.project_ids();
    if project_ids.is_empty() {
        bail!("export {} contains no projects", export.display());
    }

    let params: Arc<dyn ParameterStore> = match params_path {
        Some(path) => Arc::new(
            FileParameterStore::from_path(path)
                .with_context(|| format!("reading parameters {}", path.display()))?,
        ),
        None => Arc::new(StaticParameterStore::new(ParameterSet::default())),
    };

    let orchestrator = AnalyticsOrchestrator::new(
        Arc::new(AnalyticsCache::new()),
        Arc::new(source),
        params,
    );
    Ok(Setup {
        orchestrator,
        project_ids,
    })
}

fn single_project(requested: Option<u64>, available: &[u64]) -> anyhow::Result<u64> {
    match requested {
        Some(id) => Ok(id),
        None if available.len() == 1 => Ok(available[0]),
        None => bail!(
            "export contains {} projects; pick one with --project",
            available.len()
        ),
    }
}

async fn analyze(
    export: &Path,
    project: Option<u64>,
    format: OutputFormat,
    output: Option<PathBuf>,
    params_path: Option<&Path>,
) -> anyhow::Result<()> {
    let setup = build(export, params_path)?;
    let project_id = single_project(project, &setup.project_ids)?;

    let analytics = setup
        .orchestrator
        .get_project_data(project_id, &AbortSignal::none())
        .await?;
    create_writer(format, output)?.write_project(&analytics)
}

async fn portfolio(
    export: &Path,
    projects: Option<Vec<u64>>,
    format: OutputFormat,
    output: Option<PathBuf>,
    params_path: Option<&Path>,
) -> anyhow::Result<()> {
    let setup = build(export, params_path)?;
    let project_ids = projects.unwrap_or_else(|| setup.project_ids.clone());

    let result = setup
        .orchestrator
        .get_portfolio_analytics(&project_ids, &AbortSignal::none())
        .await?;
    create_writer(format, output)?.write_portfolio(&result)
}

async fn status(
    export: &Path,
    project: Option<u64>,
    format: OutputFormat,
    output: Option<PathBuf>,
    params_path: Option<&Path>,
) -> anyhow::Result<()> {
    let setup = build(export, params_path)?;
    let project_id = single_project(project, &setup.project_ids)?;

    let result = setup
        .orchestrator
        .get_project_status(project_id, &AbortSignal::none())
        .await?;
    create_writer(format, output)?.write_status(&result)
}

/// Two passes over the same portfolio: the second should hit the cache,
/// which makes the hit-rate numbers meaningful
async fn cache_stats(
    export: &Path,
    projects: Option<Vec<u64>>,
    params_path: Option<&Path>,
) -> anyhow::Result<()> {
    let setup = build(export, params_path)?;
    let project_ids = projects.unwrap_or_else(|| setup.project_ids.clone());
    let abort = AbortSignal::none();

    setup
        .orchestrator
        .get_portfolio_analytics(&project_ids, &abort)
        .await?;
    setup
        .orchestrator
        .get_portfolio_analytics(&project_ids, &abort)
        .await?;

    let health = setup.orchestrator.get_cache_performance();
    create_writer(OutputFormat::Terminal, None)?.write_cache_health(&health)
}
