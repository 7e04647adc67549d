use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use papi::cli::{Cli, Command};
use papi::config::PapiConfig;
use papi::orchestrator::JobOrchestrator;
use papi::state_machine::JobInput;
use papi::store::JobStore;
use papi::ui::JobProgress;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = PapiConfig::load_from(&cli.config)?;
    if let Some(max) = cli.max_concurrent {
        config.max_concurrent_jobs = max;
    }
    if let Some(processor) = cli.processor {
        config.processor = processor.into();
    }

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            let orchestrator = Arc::new(build_orchestrator(&config)?);
            let listener = TcpListener::bind(config.bind_addr())
                .await
                .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Could not listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                info!("Shutdown requested");
            };
            papi::http::serve(listener, orchestrator, shutdown).await?;
        }
        Command::Run {
            source_url,
            languages,
        } => {
            let orchestrator = build_orchestrator(&config)?;
            let receipt = orchestrator
                .submit(JobInput::new(source_url.clone()).with_languages(languages))
                .await?;

            let progress = JobProgress::start(&source_url);
            let job = loop {
                let job = orchestrator.status(&receipt.job_id).await?;
                progress.update(&job);
                if job.is_terminal() {
                    break job;
                }
                sleep(POLL_INTERVAL).await;
            };
            progress.complete(&job);
            progress.print_job(&job);
        }
    }

    Ok(())
}

fn build_orchestrator(config: &PapiConfig) -> Result<JobOrchestrator> {
    let processor = config.build_processor()?;
    Ok(JobOrchestrator::new(
        Arc::new(JobStore::new()),
        processor,
        config.executor_config(),
    ))
}
