use anyhow::Result;
use clap::Parser;
use pmolens::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    pmolens::commands::run(cli).await
}
