//! VFL - two-party vertical learning pipeline
//!
//! Loads the pipeline configuration, runs every stage against a local
//! cluster, prints the match report and evaluation metrics as JSON, and
//! exits as soon as the cluster is torn down.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vfl_engine::{RunOutcome, SecurePipeline};
use vfl_types::{PipelineConfig, PipelineError};

const EXIT_OK: i32 = 0;
const EXIT_RUN_FAILED: i32 = 1;
const EXIT_STARTUP: i32 = 2;

/// VFL CLI
#[derive(Parser, Debug)]
#[command(name = "vfl")]
#[command(about = "Two-party vertical federated learning pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VFL_CONFIG")]
    config: String,

    /// Log level (overrides the configured one)
    #[arg(long, env = "VFL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "VFL_LOG_JSON")]
    json: bool,
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Configuration and startup problems exit with 2, stage failures with 1
fn exit_code(err: &PipelineError) -> i32 {
    match err {
        PipelineError::Config(_) | PipelineError::ClusterInit(_) => EXIT_STARTUP,
        PipelineError::Stage { .. } | PipelineError::InvalidTransition { .. } => EXIT_RUN_FAILED,
    }
}

fn print_outcome(outcome: &RunOutcome) -> anyhow::Result<()> {
    let report = serde_json::json!({
        "match_report": outcome.match_report,
        "evaluation": outcome.evaluation,
    });
    let rendered =
        serde_json::to_string_pretty(&report).context("Failed to render the run outcome")?;
    println!("{rendered}");
    Ok(())
}

async fn run(config: PipelineConfig) -> i32 {
    let pipeline = match SecurePipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, "Invalid pipeline configuration");
            return exit_code(&e);
        }
    };

    match pipeline.run().await {
        Ok(outcome) => match print_outcome(&outcome) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Could not print results");
                EXIT_RUN_FAILED
            }
        },
        Err(e) => {
            tracing::error!(
                stage = ?e.failed_stage(),
                error = %e,
                "Pipeline run failed"
            );
            exit_code(&e)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = PipelineConfig::load(&cli.config);
    let (level, json) = match &config {
        Ok(config) => (
            cli.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone()),
            cli.json || config.logging.json,
        ),
        Err(_) => (
            cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
            cli.json,
        ),
    };
    init_tracing(&level, json);

    let code = match config {
        Ok(config) => {
            tracing::info!(
                config = %cli.config,
                role = %config.role,
                version = env!("CARGO_PKG_VERSION"),
                "Starting VFL pipeline"
            );
            run(config).await
        }
        Err(e) => {
            tracing::error!(config = %cli.config, error = %e, "Failed to load configuration");
            EXIT_STARTUP
        }
    };

    // Teardown is complete; leave without waiting on lingering tasks
    std::process::exit(code)
}
