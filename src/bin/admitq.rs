//! admitq CLI: replay queue scenarios and run a demonstration dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use admitq::config::Config;
use admitq::dispatch::{DispatchConfig, Dispatcher};
use admitq::queue::EnhancedQueue;
use admitq::scenario::Scenario;
use admitq::telemetry::{TelemetryConfig, init_telemetry};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "admitq", about = "Priority admission queue with a processing window")]
struct Cli {
    /// TOML config file. Without it, configuration comes from the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scenario file, printing each step as a JSON line
    Replay {
        /// Scenario TOML (initial window plus [[op]] entries)
        script: PathBuf,
    },
    /// Enqueue synthetic items and drain them through a dispatcher
    Drain {
        /// Number of items to enqueue
        #[arg(long, default_value_t = 20)]
        items: usize,
        /// Processing window; defaults to the configured one
        #[arg(long)]
        window: Option<i64>,
        /// Simulated execution time per item
        #[arg(long, default_value_t = 50)]
        work_ms: u64,
        /// Priorities cycle through 0..levels
        #[arg(long, default_value_t = 3)]
        levels: i64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Replay { script } => {
            let _guard = init_telemetry(telemetry_config(config.as_ref()))?;
            cmd_replay(&script)
        }
        Command::Drain {
            items,
            window,
            work_ms,
            levels,
        } => {
            let window = match (window, &config) {
                (Some(window), _) => window,
                (None, Some(config)) => config.processing_window,
                (None, None) => Config::from_env()?.processing_window,
            };
            check_drain_window(items, window)?;
            let _guard = init_telemetry(telemetry_config(config.as_ref()))?;
            cmd_drain(items, window, work_ms, levels).await
        }
        Command::Config => {
            let config = match config {
                Some(config) => config,
                None => Config::from_env()?,
            };
            println!("processing_window = {}", config.processing_window);
            println!(
                "otel_endpoint     = {}",
                config.otel_endpoint.as_deref().unwrap_or("-")
            );
            println!("log_level         = {}", config.log_level);
            println!("service_name      = {}", config.service_name);
            Ok(())
        }
    }
}

/// A zero window admits nothing, so draining a non-empty backlog would never
/// finish.
fn check_drain_window(items: usize, window: i64) -> anyhow::Result<()> {
    if items > 0 && window <= 0 {
        anyhow::bail!("--window must be positive to drain {items} items, got {window}");
    }
    Ok(())
}

fn telemetry_config(config: Option<&Config>) -> TelemetryConfig {
    match config {
        Some(config) => TelemetryConfig::from_config(config),
        None => TelemetryConfig {
            endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            service_name: "admitq".to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        },
    }
}

fn cmd_replay(script: &Path) -> anyhow::Result<()> {
    let scenario = Scenario::from_toml_file(script)?;
    let replay = scenario.replay();
    for step in &replay.steps {
        println!("{}", serde_json::to_string(step)?);
    }
    println!("{}", serde_json::to_string(&json!({ "stats": replay.stats }))?);
    Ok(())
}

async fn cmd_drain(items: usize, window: i64, work_ms: u64, levels: i64) -> anyhow::Result<()> {
    let queue = Arc::new(EnhancedQueue::new(window));
    let levels = levels.max(1);
    for (i, priority) in (0..items).zip((0..levels).cycle()) {
        queue.add(format!("item-{i:04}"), priority, Utc::now());
    }

    let dispatcher = Dispatcher::new(Arc::clone(&queue), DispatchConfig::default());

    let ctrl = dispatcher.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    let work = Duration::from_millis(work_ms);
    let started = std::time::Instant::now();
    let admitted = dispatcher
        .drain(move |_key| async move { tokio::time::sleep(work).await })
        .await;

    println!(
        "{}",
        serde_json::to_string(&json!({
            "admitted": admitted,
            "elapsed_ms": started.elapsed().as_millis() as u64,
            "stats": queue.stats(),
        }))?
    );
    Ok(())
}
