//! gpmwatch entry point.

mod args;
mod tracker;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use gpmwatch_core::backoff::RetryPlan;
use gpmwatch_core::error::with_hint;
use gpmwatch_core::event::OutputFormat;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{error, info, warn};

use crate::args::Cli;
use crate::tracker::paths;
use crate::tracker::{ClickSlot, EventLoop, ProducerConfig, SharedChannel, SignalBank, Supervisor};

fn main() {
    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // One thread: the poll loop and the signal listeners interleave on it.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(cli));

    // Drop the runtime first so listener tasks release the mapping
    // before exit() skips destructors.
    drop(runtime);

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Convert CLI args to the producer launch config.
fn producer_config(cli: &Cli) -> ProducerConfig {
    ProducerConfig {
        binary: cli.gpm_track_binary.clone(),
        tty: paths::tty_path(&cli.tty),
        shm_name: cli.shm_name().map(String::from),
        shm_dir: paths::get_shm_dir(),
    }
}

fn output_format(cli: &Cli) -> OutputFormat {
    match cli.format {
        crate::args::OutputFormat::Text => OutputFormat::Text,
        crate::args::OutputFormat::Json => OutputFormat::Json,
    }
}

/// Register SIGINT/SIGTERM handling, then run until done or signalled.
async fn run(cli: Cli) -> Result<()> {
    // Registered before the producer exists so neither signal can take
    // its default action while the producer is running.
    let shutdown = shutdown_signal();
    let config = producer_config(&cli);
    run_until(&cli, config, shutdown).await
}

/// Start the producer, stream its events until `shutdown` resolves, and
/// always stop it afterwards.
async fn run_until<F>(cli: &Cli, config: ProducerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let plan = RetryPlan::for_handshake(cli.handshake_tries, cli.handshake_timeout)
        .map_err(|e| anyhow!(with_hint(&e, e.suggestion())))?;

    // Bank signals must be handled before the producer exists.
    let bank = SignalBank::reserve().map_err(|e| anyhow!(with_hint(&e, e.suggestion())))?;
    let mut supervisor = Supervisor::spawn(&config, &bank)?;

    let result = stream_events(cli, &mut supervisor, bank, &plan, shutdown).await;

    supervisor.terminate().await;
    result
}

async fn stream_events<F>(
    cli: &Cli,
    supervisor: &mut Supervisor,
    bank: SignalBank,
    plan: &RetryPlan,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let shm_path = tokio::select! {
        result = supervisor.handshake(plan) => {
            result.map_err(|e| anyhow!(with_hint(&e, e.suggestion())))?
        }
        _ = &mut shutdown => {
            info!("Interrupted during handshake");
            return Ok(());
        }
    };

    let channel = Arc::new(SharedChannel::open(&shm_path)?);
    let slot = ClickSlot::new();
    let _listeners = bank.activate(channel.clone(), slot.clone());

    info!("Tracking mouse events from {:?}", channel.path());

    let mut event_loop = EventLoop::new(channel, slot, std::io::stdout(), output_format(cli));
    let interval = Duration::from_secs_f64(cli.interval);

    tokio::select! {
        result = event_loop.run(interval) => {
            result.map_err(|e| anyhow!("Failed to write events: {}", e))?;
        }
        status = supervisor.wait() => {
            return Err(match status {
                Ok(status) => anyhow!("gpm-track exited unexpectedly ({})", status),
                Err(e) => anyhow!("Failed to wait on gpm-track: {}", e),
            });
        }
        _ = &mut shutdown => {}
    }

    Ok(())
}

/// Resolve on the first SIGINT or SIGTERM.
///
/// Both handlers are installed when this is called, not when the future is
/// first polled. If one cannot be registered, logs a warning and only
/// the other one is honoured.
fn shutdown_signal() -> impl Future<Output = ()> {
    let interrupt = register(SignalKind::interrupt(), "SIGINT");
    let terminate = register(SignalKind::terminate(), "SIGTERM");

    async move {
        tokio::select! {
            _ = recv(interrupt) => info!("Received SIGINT, shutting down"),
            _ = recv(terminate) => info!("Received SIGTERM, shutting down"),
        }
    }
}

fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Failed to register {} handler: {}", name, e);
            None
        }
    }
}

/// Wait for the next delivery, or forever without a stream.
async fn recv(stream: Option<Signal>) {
    match stream {
        Some(mut stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
