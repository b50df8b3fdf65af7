//! `tagscan`: scan contactless tags from the command line.
//!
//! Exit status is 0 when the run ends normally or on Ctrl+C, and non-zero
//! when the config is invalid or the reader fails.

mod args;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tagscan_core::TargetCatalog;
use tagscan_hardware::AnyReader;
use tagscan_scanner::{ScanConfig, ScanLoop};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::output::{RecordPrinter, format_summary};

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_config(args: &Args, catalog: &TargetCatalog) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    args.apply(&mut config);
    config.validate(catalog).context("Invalid scan configuration")?;
    Ok(config)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, finishing current cycle");
            token.cancel();
        }
    });
    cancel
}

async fn run(args: Args) -> Result<()> {
    let catalog = TargetCatalog::standard();
    let config = load_config(&args, &catalog).await?;

    let connection = args.connection();
    let reader = AnyReader::open(&connection)
        .await
        .with_context(|| format!("Could not connect to reader {connection}"))?;

    let cancel = cancel_on_ctrl_c();
    let printer = RecordPrinter::stdout(args.json);
    let summary = ScanLoop::new(reader, catalog, config)
        .run(printer, cancel)
        .await?;

    if !args.json {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
