use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use subsys_control::{
    create_subsystem, list_registered_subsystems, register_builtin_subsystems, AgentConfig,
    HealthStatus, Subsystem, SubsystemError,
};

/// Consecutive failed health checks before a subsystem is reported unhealthy
const FAILURE_THRESHOLD: u32 = 3;

/// Subsystem agent - starts, watches and stops supervised subsystems
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Run duration in seconds (for testing)
    #[arg(long)]
    run_duration: Option<u64>,
}

struct Supervised {
    subsystem: Arc<dyn Subsystem>,
    health: HealthStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AgentConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    initialize_logging(args.debug, &config.agent.log_level)?;

    info!("Starting subsystem agent");
    info!("Config file: {}", args.config);

    register_builtin_subsystems()?;
    debug!(kinds = ?list_registered_subsystems(), "Registered subsystem kinds");

    let subsystems = config
        .subsystems
        .iter()
        .map(|c| {
            create_subsystem(c).with_context(|| format!("Failed to create subsystem {}", c.name))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded configuration for {} subsystems", subsystems.len());

    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(supervise(
        subsystems.clone(),
        config.agent.health_check_interval,
        cancel.clone(),
    ));

    if let Some(duration) = args.run_duration {
        info!("Running for {} seconds (test mode)", duration);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
            result = shutdown_signal() => result?,
        }
    } else {
        shutdown_signal().await?;
    }

    info!("Shutting down subsystems...");
    // Abandons any start or health check still waiting.
    cancel.cancel();
    if let Err(e) = supervisor.await {
        error!("Supervisor task failed: {}", e);
    }

    stop_all(&subsystems).await
}

/// Start every subsystem, then health-check them on `interval`, restarting
/// any that went away while still meant to run.
async fn supervise(
    subsystems: Vec<Arc<dyn Subsystem>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut supervised: Vec<Supervised> = subsystems
        .into_iter()
        .map(|subsystem| Supervised {
            subsystem,
            health: HealthStatus::new(),
        })
        .collect();

    for entry in &supervised {
        let name = entry.subsystem.name();
        match entry.subsystem.start(&cancel).await {
            Ok(()) => info!(subsystem = %name, "Subsystem started"),
            Err(e) => error!(subsystem = %name, error = %e, "Failed to start subsystem"),
        }
    }

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        for entry in supervised.iter_mut() {
            check_one(entry, &cancel).await;
        }
    }
}

async fn check_one(entry: &mut Supervised, cancel: &CancellationToken) {
    let name = entry.subsystem.name().to_string();

    if entry.subsystem.status().needs_restart() {
        if let Err(e) = entry.subsystem.start(cancel).await {
            error!(subsystem = %name, error = %e, "Restart failed");
            entry.health.record_failure(e.to_string(), FAILURE_THRESHOLD);
        }
        return;
    }

    match entry.subsystem.health_check(cancel).await {
        Ok(()) => {
            if !entry.health.is_healthy {
                info!(subsystem = %name, "Subsystem healthy again");
            }
            entry.health.record_success();
        }
        Err(e) => {
            let was_healthy = entry.health.is_healthy;
            entry.health.record_failure(e.to_string(), FAILURE_THRESHOLD);
            if was_healthy && !entry.health.is_healthy {
                error!(
                    subsystem = %name,
                    failures = entry.health.consecutive_failures,
                    error = %e,
                    "Subsystem unhealthy"
                );
            } else {
                warn!(subsystem = %name, error = %e, "Health check failed");
            }

            // A start that timed out or was cancelled leaves the child running
            // without an endpoint; only a full stop clears that.
            if matches!(e, SubsystemError::NoEndpoint { .. }) && !entry.health.is_healthy {
                recycle(entry, cancel).await;
            }
        }
    }
}

async fn recycle(entry: &mut Supervised, cancel: &CancellationToken) {
    let name = entry.subsystem.name().to_string();
    warn!(subsystem = %name, "Never became ready, recycling");

    if let Err(e) = entry.subsystem.stop(cancel).await {
        error!(subsystem = %name, error = %e, "Stop before recycle failed");
        return;
    }
    entry.health = HealthStatus::new();
    match entry.subsystem.start(cancel).await {
        Ok(()) => info!(subsystem = %name, "Subsystem recycled"),
        Err(e) => error!(subsystem = %name, error = %e, "Start after recycle failed"),
    }
}

async fn stop_all(subsystems: &[Arc<dyn Subsystem>]) -> Result<()> {
    // Stops are bounded by each subsystem's own stop timeout.
    let cancel = CancellationToken::new();
    let mut failed = 0;

    for subsystem in subsystems.iter().rev() {
        let name = subsystem.name();
        match subsystem.stop(&cancel).await {
            Ok(()) => info!(subsystem = %name, "Subsystem stopped"),
            Err(e) => {
                error!(subsystem = %name, error = %e, "Failed to stop subsystem");
                failed += 1;
            }
        }
        debug!(
            subsystem = %name,
            status = %serde_json::to_string(&subsystem.status())?,
            "Final status"
        );
    }

    if failed > 0 {
        anyhow::bail!("{} subsystem(s) failed to stop", failed);
    }
    info!("All subsystems stopped");
    Ok(())
}

fn initialize_logging(debug: bool, configured_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { configured_level };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}
