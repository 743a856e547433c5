mod cli;
mod demo;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use demo::{SplitWorker, SquareWorker, SumWorker, sum_key};
use shuttle_core::{EngineBuilder, JobState, ParamValue, Params, ShuttleConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Validate { config } => {
            let loaded = ShuttleConfig::load(&config)
                .with_context(|| format!("invalid configuration {}", config.display()))?;
            println!(
                "{}: {} workflow(s), {} worker pool(s)",
                config.display(),
                loaded.workflows.len(),
                loaded.workers.len()
            );
            Ok(())
        }
        Command::Run {
            config,
            workflow,
            params,
            start_after_secs,
            deadline_secs,
        } => {
            let loaded = ShuttleConfig::load(&config)
                .with_context(|| format!("invalid configuration {}", config.display()))?;
            run(loaded, &workflow, params, start_after_secs, deadline_secs).await
        }
    }
}

async fn run(
    config: ShuttleConfig,
    workflow: &str,
    raw_params: Vec<(String, ParamValue)>,
    start_after_secs: Option<i64>,
    deadline_secs: Option<i64>,
) -> Result<()> {
    let mut params = Params::new();
    for (name, value) in raw_params {
        params.insert(name, value)?;
    }

    let engine = EngineBuilder::new(config)
        .register("split", || SplitWorker)?
        .register("square", || SquareWorker)?
        .register("sum", || SumWorker)?
        .build()?;
    let handle = engine.spawn().await?;

    let now = Utc::now();
    let start_after = start_after_secs.map(|s| now + chrono::Duration::seconds(s));
    let finish_before = deadline_secs.map(|s| now + chrono::Duration::seconds(s));
    let job_id = engine
        .submit_job(workflow, start_after, finish_before, params)
        .await?;
    info!(%job_id, workflow, "job submitted");

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                warn!("interrupted, shutting down");
                break None;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let stats = engine.live_stats(job_id).await?;
                info!(
                    state = ?stats.state,
                    done = stats.total_done(),
                    waiting = stats.total_waiting(),
                    "progress"
                );
                if matches!(stats.state, JobState::Finished | JobState::Failed) {
                    break Some(engine.get_job(job_id).await?);
                }
            }
        }
    };
    handle.shutdown_and_join().await;

    let Some(status) = outcome else {
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    if let Some(workflow_id) = status.workflow_id
        && let Some(sum) = engine.context().blobs.get(&sum_key(workflow_id)).await?
    {
        println!("sum = {}", String::from_utf8_lossy(&sum));
    }
    if status.state == JobState::Failed {
        bail!(
            "job {job_id} failed: {}",
            status.failure.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}
