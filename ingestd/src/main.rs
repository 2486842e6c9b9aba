//! ingestd - priority-ordered, rate-limited batch ingestion
//!
//! CLI entry point for serving the scheduler and talking to a running server.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use ingestd::cli::{Cli, Command, OutputFormat};
use ingestd::config::Config;
use ingestd::domain::{AggregateStatus, BatchStatus, Priority, RequestId, RequestStatus};
use ingestd::ipc::{self, IngestClient};
use ingestd::scheduler::{QueueState, Scheduler};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ingestd")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("ingestd.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        addr = %config.server.addr(),
        batch_size = config.scheduler.batch_size,
        rate_limit_ms = config.scheduler.rate_limit_ms,
        "ingestd loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::Submit { priority, ids } => cmd_submit(&config, ids, priority).await,
        Command::Status { id, format } => cmd_status(&config, &id, format).await,
        Command::Stats { format } => cmd_stats(&config, format).await,
        Command::Ping => cmd_ping(&config).await,
        Command::Run { priority, format, ids } => cmd_run(&config, ids, priority, format).await,
    }
}

fn client(config: &Config) -> IngestClient {
    IngestClient::new(config.server.addr())
}

/// Run the drain loop and the listener until SIGINT / SIGTERM
async fn cmd_serve(config: &Config) -> Result<()> {
    let scheduler = Arc::new(Scheduler::new(config.scheduler.clone()));
    let drain = scheduler.clone().spawn();

    let addr = config.server.addr();
    let listener = ipc::create_listener(&addr).await?;
    let (listener_tx, listener_rx) = tokio::sync::mpsc::channel(1);
    let listener_handle = tokio::spawn(ipc::serve(listener, scheduler.clone(), listener_rx));

    println!("ingestd listening on {}", addr.cyan());
    info!(%addr, "Server running. Press Ctrl+C to stop.");

    wait_for_shutdown_signal().await?;

    info!("Server shutting down...");
    let _ = listener_tx.send(()).await;
    match listener_handle.await {
        Ok(Err(e)) => warn!(error = %e, "Listener exited with error"),
        Err(e) => warn!(error = %e, "Listener task failed"),
        Ok(Ok(())) => {}
    }

    drain.shutdown().await?;

    let stats = scheduler.stats().await;
    info!(
        dispatched = stats.total_dispatched,
        completed = stats.total_completed,
        failed = stats.total_failed,
        "Shutdown complete"
    );
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received");
    }

    Ok(())
}

async fn cmd_submit(config: &Config, ids: Vec<i64>, priority: Priority) -> Result<()> {
    let ingestion_id = client(config).ingest(ids, priority).await?;
    println!("{}", ingestion_id);
    Ok(())
}

async fn cmd_status(config: &Config, id: &str, format: OutputFormat) -> Result<()> {
    let status = client(config).status(&RequestId::from(id)).await?;
    print_status(&status, &format)
}

async fn cmd_stats(config: &Config, format: OutputFormat) -> Result<()> {
    let state = client(config).stats().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => print_queue_state(&state),
    }
    Ok(())
}

async fn cmd_ping(config: &Config) -> Result<()> {
    let client = client(config);
    match client.ping().await {
        Ok(version) => {
            println!("ingestd at {} is alive and responsive", client.addr());
            println!("Version: {}", version);
        }
        Err(e) => {
            debug!(error = %e, "cmd_ping: ping failed");
            println!("ingestd at {} is not responding", client.addr());
            println!("Error: {}", e);
        }
    }
    Ok(())
}

/// Submit, drain in-process, and print the final status
async fn cmd_run(config: &Config, ids: Vec<i64>, priority: Priority, format: OutputFormat) -> Result<()> {
    let scheduler = Arc::new(Scheduler::new(config.scheduler.clone()));
    let drain = scheduler.clone().spawn();

    let result = async {
        let ingestion_id = scheduler.submit(ids, priority).await?;
        if format == OutputFormat::Text {
            println!("Ingestion id: {}", ingestion_id.to_string().cyan());
        }
        let poll = config.scheduler.poll_interval().max(Duration::from_millis(10));
        Ok::<_, eyre::Report>(scheduler.wait_for_request(&ingestion_id, poll).await?)
    }
    .await;

    drain.shutdown().await?;

    let status = result?;
    print_status(&status, &format)?;
    if status.status == AggregateStatus::Failed {
        return Err(eyre::eyre!("Ingestion {} failed", status.ingestion_id));
    }
    Ok(())
}

fn print_status(status: &RequestStatus, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(status)?),
        OutputFormat::Text => {
            println!("Ingestion {}: {}", status.ingestion_id, color_aggregate(status.status));
            for batch in &status.batches {
                println!("  {}  {:<12} {:?}", batch.batch_id, color_batch(batch.status), batch.ids);
            }
        }
    }
    Ok(())
}

fn print_queue_state(state: &QueueState) {
    println!("Queued:           {}", state.queued);
    println!("In progress:      {}", state.in_progress);
    println!("Rate limited:     {}", state.rate_limited);
    println!("Requests:         {}", state.stats.total_requests);
    println!("Batches:          {}", state.stats.total_batches);
    println!("Dispatched:       {}", state.stats.total_dispatched);
    println!("Completed:        {}", state.stats.total_completed.to_string().green());
    println!("Failed:           {}", state.stats.total_failed.to_string().red());
    println!("Peak queue depth: {}", state.stats.peak_queue_depth);
}

fn color_aggregate(status: AggregateStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        AggregateStatus::NotStarted => text.normal(),
        AggregateStatus::InProgress => text.yellow(),
        AggregateStatus::Done => text.green(),
        AggregateStatus::Failed => text.red(),
    }
}

fn color_batch(status: BatchStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        BatchStatus::NotStarted => text.normal(),
        BatchStatus::InProgress => text.yellow(),
        BatchStatus::Done => text.green(),
        BatchStatus::Failed => text.red(),
    }
}
