//! Pixdrop CLI: maintenance commands against the configured object store.
//!
//! Reads the same environment (and `.env`) as the API server.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use pixdrop_cli::{execute, init_tracing, Commands};
use pixdrop_core::Config;
use pixdrop_services::create_storage;

#[derive(Parser)]
#[command(name = "pixdrop", about = "Pixdrop maintenance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize object store")?;

    let is_sweep = matches!(cli.command, Commands::Sweep { .. });
    let report = execute(cli.command, &config, storage, Utc::now()).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Serialize report")?
    );

    if is_sweep && report["failed_batches"].as_u64().unwrap_or(0) > 0 {
        anyhow::bail!("Sweep finished with failed batches; they are retried on the next run");
    }

    Ok(())
}
