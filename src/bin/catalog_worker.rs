//! Catalog worker CLI
//!
//! Runs the asynchronous side of the catalog engine against Postgres and the
//! configured collaborators:
//! - `consume-audit`: audit results (JSON lines on stdin)
//! - `consume-resources`: resource change events (JSON lines on stdin)
//! - `push-all`: re-project every catalog into the search index
//!
//! Usage:
//!   CATALOG_CONFIG=config/catalog.yaml \
//!   cargo run --features cli --bin catalog_worker -- consume-audit < results.jsonl

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use dr_catalog::remote::RemoteServices;
use dr_catalog::{
    AuditProcessIndex, AuditResultHandler, CatalogEngine, EngineConfig, LookupTables,
    MessageConsumer, MessageHandler, PgCatalogStore, ResourceEventHandler,
};

/// Channel capacity between the stdin reader and the consumer.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "catalog_worker")]
#[command(about = "Catalog lifecycle worker")]
struct Args {
    /// YAML config file (overrides CATALOG_CONFIG)
    #[arg(long, short = 'c', env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply audit results read from stdin
    ConsumeAudit,
    /// Apply resource change events read from stdin
    ConsumeResources,
    /// Re-project every catalog into the search index
    PushAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let engine = Arc::new(build_engine(&args).await?);

    match args.command {
        Command::ConsumeAudit => consume(AuditResultHandler::new(engine)).await,
        Command::ConsumeResources => consume(ResourceEventHandler::new(engine)).await,
        Command::PushAll => {
            let report = engine.push_all().await.context("Push-all sweep failed")?;
            println!("pushed={} failed={}", report.pushed, report.failed);
            Ok(())
        }
    }
}

async fn build_engine(args: &Args) -> Result<CatalogEngine> {
    let config = match &args.config {
        Some(path) => {
            let mut config = EngineConfig::load_from_file(path)?;
            config.database.overlay_env();
            config
        }
        None => EngineConfig::from_env()?,
    };

    let store = PgCatalogStore::connect(&config.database)
        .await
        .context("Failed to connect to catalog database")?;

    let processes = AuditProcessIndex::from_config(&config.audit_processes);
    tracing::info!(bound = processes.bound_count(), "Audit processes loaded");

    let services = RemoteServices::new(config.services.clone())
        .context("Failed to build HTTP client")?
        .into_services(Arc::new(processes));
    let lookups = LookupTables::with_overrides(&config.labels);

    Ok(CatalogEngine::new(Arc::new(store), services, lookups))
}

/// Feed stdin lines to a consumer until EOF or Ctrl-C.
async fn consume<H: MessageHandler>(handler: H) -> Result<()> {
    let consumer = MessageConsumer::new(Arc::new(handler));
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    });

    let interrupted = shutdown_rx.clone();
    let received = consumer.run(rx, shutdown_rx).await;
    tracing::info!(received, "Consumer finished");

    // After Ctrl-C the reader may still be parked on stdin.
    if !*interrupted.borrow() {
        reader
            .await
            .context("stdin reader task failed")?
            .context("Failed to read stdin")?;
    }
    Ok(())
}
