use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::io::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pmolens")]
#[command(about = "Earned value and critical path analytics for project portfolios", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full analysis for one project: EVM, critical path, utilization
    Analyze {
        /// JSON export with work items, time entries and budgets
        #[arg(long)]
        export: PathBuf,

        /// Project id (defaults to the only project in the export)
        #[arg(long)]
        project: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parameter file (TOML or JSON) with defaults and project overrides
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Aggregate analytics across several projects
    Portfolio {
        /// JSON export with work items, time entries and budgets
        #[arg(long)]
        export: PathBuf,

        /// Project ids (defaults to every project in the export)
        #[arg(long, value_delimiter = ',')]
        projects: Option<Vec<u64>>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parameter file (TOML or JSON) with defaults and project overrides
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Real-time status for one project
    Status {
        /// JSON export with work items, time entries and budgets
        #[arg(long)]
        export: PathBuf,

        /// Project id (defaults to the only project in the export)
        #[arg(long)]
        project: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parameter file (TOML or JSON) with defaults and project overrides
        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Run a portfolio analysis twice and report cache behavior
    CacheStats {
        /// JSON export with work items, time entries and budgets
        #[arg(long)]
        export: PathBuf,

        /// Project ids (defaults to every project in the export)
        #[arg(long, value_delimiter = ',')]
        projects: Option<Vec<u64>>,

        /// Parameter file (TOML or JSON) with defaults and project overrides
        #[arg(long)]
        params: Option<PathBuf>,
    },
}
