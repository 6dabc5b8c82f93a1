//! Triage CLI
//!
//! Classifies support tickets from the command line using the triage engine.
//! Without an API key every ticket is classified by the keyword rules.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;
use triage_classifiers::{TriageConfig, TriageEngine};
use triage_telemetry::describe_metrics;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = config::load(&cli)?;

    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    match cli.command {
        Commands::Config => return commands::show_config(&config),
        Commands::Classify { text, name, email } => {
            let engine = start_engine(config)?;
            commands::classify(&engine, &text, name, email).await?;
            report(&engine);
        }
        Commands::Batch { input, concurrency } => {
            let engine = start_engine(config)?;
            commands::batch(&engine, input.as_deref(), usize::from(concurrency)).await?;
            report(&engine);
        }
    }

    if let Some(handle) = metrics_handle {
        eprint!("{}", handle.render());
    }

    Ok(())
}

/// Build the engine and start the cache sweeper when configured
fn start_engine(config: TriageConfig) -> Result<Arc<TriageEngine>> {
    let sweep_interval = config.cache.sweep_interval();
    let engine = Arc::new(TriageEngine::from_config(config)?);
    if let Some(every) = sweep_interval {
        // Stops on its own once the engine is dropped
        engine.spawn_cache_sweeper(every);
    }
    Ok(engine)
}

fn report(engine: &TriageEngine) {
    let snapshot = engine.metrics().snapshot();
    info!(
        requests = snapshot.total_requests,
        ai = snapshot.ai_results,
        rules = snapshot.rules_results,
        cooldown = snapshot.cooldown_results,
        cache_hit_rate = snapshot.cache_hit_rate(),
        fallback_rate = snapshot.fallback_rate(),
        avg_latency_us = snapshot.avg_latency_us(),
        "Done"
    );
}

/// Initialize tracing/logging on stderr so stdout stays machine-readable
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("triage=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triage=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install the Prometheus recorder and return a handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    describe_metrics();

    info!("Metrics recorder installed");
    Ok(handle)
}
