mod metrics;
mod status;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livedash_core::{load_config, validate_config, JobId, JobProgress, LiveEngine};

/// How often job progress is checked for changes worth logging.
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("LIVEDASH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("livedash.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Configuration loaded (hash {}): backend {}, push {}, synced domains {:?}",
        &config_hash[..16],
        config.backend.base_url,
        if config.push.enabled { "on" } else { "off" },
        config.sync.domains
    );

    once_cell::sync::Lazy::force(&metrics::REGISTRY);

    let engine = Arc::new(
        LiveEngine::from_config(config.clone()).context("Failed to create live engine")?,
    );
    engine.start().await;

    let (stop_tx, stop_rx) = watch::channel(false);
    let status_server = if config.status.enabled {
        let addr = SocketAddr::new(config.status.host, config.status.port);
        let engine = Arc::clone(&engine);
        let mut stop_rx = stop_rx.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = status::serve(addr, engine, shutdown).await {
                error!("Status endpoint failed: {}", e);
            }
        }))
    } else {
        None
    };
    drop(stop_rx);

    report_until_shutdown(&engine).await;

    info!("Shutting down");
    engine.stop().await;
    let _ = stop_tx.send(true);
    if let Some(server) = status_server {
        if let Err(e) = server.await {
            warn!("Status endpoint task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log each job's progress whenever its summary line changes.
async fn report_until_shutdown(engine: &LiveEngine) {
    let mut last: HashMap<JobId, String> = HashMap::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(REPORT_INTERVAL) => {
                let snapshot = engine.snapshot().await;
                for job in &snapshot.jobs {
                    let line = summary(job);
                    if last.get(&job.job_id) != Some(&line) {
                        if step_failed(job) {
                            warn!(job_id = job.job_id, "{}", line);
                        } else {
                            info!(job_id = job.job_id, "{}", line);
                        }
                        last.insert(job.job_id, line);
                    }
                }
                last.retain(|id, _| snapshot.jobs.iter().any(|j| j.job_id == *id));
            }
        }
    }
}

fn summary(job: &JobProgress) -> String {
    let mut line = format!(
        "{} [{}/{}] file {:.0}% overall {:.0}%",
        job.status,
        job.file_index,
        job.file_total,
        job.file_ratio * 100.0,
        job.overall * 100.0
    );
    if let Some(name) = &job.current_file {
        line.push_str(&format!(" {}", name));
    }
    if let Some(mini) = &job.mini {
        line.push_str(&format!(" - {}", mini.describe()));
    }
    if let Some(err) = &job.error {
        line.push_str(&format!(" (error: {})", err));
    }
    line
}

/// Whether the job's latest step reported a failure (miss, crawler error,
/// failed translation or artwork).
fn step_failed(job: &JobProgress) -> bool {
    job.mini.as_ref().map(|m| m.key.is_failure()).unwrap_or(false)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
