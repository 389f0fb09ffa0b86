//! taskwatch CLI - launch and follow long-running server tasks
//!
//! Main entry point for the taskwatch command-line tool. Results go to
//! stdout, logs to stderr.

mod cli;
mod output;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use output::{CliObserver, Outcome};
use serde_json::Value;
use std::process::ExitCode;
use taskwatch::{HttpTransport, TaskHandle, TaskMonitor};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_body(body: Option<&str>) -> anyhow::Result<Option<Value>> {
    body.map(|raw| serde_json::from_str(raw).context("--body is not valid JSON"))
        .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let config = cli.global.load_config()?;
    let url = config.resolve_url(cli.command.url())?;
    let transport = HttpTransport::new(config.client_config())?;

    debug!(%url, poll = ?config.poll, "Starting");
    let monitor = TaskMonitor::new(transport, url, config.poll);

    let outcome = match &cli.command {
        Commands::Status { .. } => Outcome::from_existing(monitor.check_existing_status().await),

        Commands::Launch { body, .. } => {
            let body = parse_body(body.as_deref())?;
            match monitor.launch(body.as_ref()).await {
                Ok(handle) => Outcome::Launched {
                    task_id: handle.to_string(),
                },
                Err(error) => Outcome::Failed { error },
            }
        }

        Commands::Poll { task_id, .. } => {
            let mut observer = CliObserver::default();
            let session = monitor
                .poll_with(&TaskHandle::new(task_id.as_str()), &mut observer)
                .await;
            observer.finish(Some(&session))
        }

        Commands::Run { body, fresh, .. } => {
            let body = parse_body(body.as_deref())?;
            let mut observer = CliObserver::default();

            let resumed = if *fresh {
                None
            } else {
                monitor.resume(&mut observer).await
            };

            if *fresh || observer.no_prior_task {
                let session = monitor.launch_and_poll(body.as_ref(), &mut observer).await;
                observer.finish(Some(&session))
            } else {
                observer.finish(resumed.as_ref())
            }
        }
    };

    outcome.print(cli.global.format);
    Ok(outcome.exit_code())
}
