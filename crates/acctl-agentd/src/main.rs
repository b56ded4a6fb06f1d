mod config;
mod failures;
mod http;
mod pool;

use std::sync::Arc;

use acctl_core::{AccountController, AccountGate, ErrorStateStore, Subscribe};
use acctl_observe::{Journal, logger_init};
use acctl_prometheus::PrometheusMetrics;
use taskvisor::{Supervisor, SupervisorConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{config::AgentConfig, failures::FailurePolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config + logger
    let cfg = AgentConfig::from_env()?;
    logger_init(&cfg.logger)?;
    info!(addr = %cfg.http_addr, accounts = cfg.accounts.len(), "config loaded");

    // 2) Controller
    let errors = ErrorStateStore::new();
    let metrics = Arc::new(PrometheusMetrics::new()?);
    let journal: Arc<dyn Subscribe> = Arc::new(Journal::new());
    let exporter: Arc<dyn Subscribe> = metrics.clone();
    let controller = Arc::new(
        AccountController::builder()
            .with_error_source(Arc::new(errors.clone()))
            .with_subscribers(vec![journal, exporter])
            .build(),
    );
    let gate = AccountGate::new(controller.clone());
    info!("controller ready");

    // 3) Pump + runner pools
    let token = CancellationToken::new();
    let pump = gate.spawn_pump(cfg.pump_interval(), token.child_token());

    let policy = Arc::new(FailurePolicy::new(gate.clone(), errors));
    let mut specs = Vec::new();
    for pool in &cfg.pools {
        specs.extend(pool::specs(pool, &cfg.accounts, gate.clone(), policy.clone()));
        info!(pool = %pool.name, workers = pool.workers, "runner pool prepared");
    }

    // 4) HTTP
    let listener = tokio::net::TcpListener::bind(cfg.http_addr).await?;
    let app = http::router(controller, metrics);
    let shutdown = token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });
    info!(addr = %cfg.http_addr, "http api listening");

    // 5) Supervise runners until Ctrl+C
    info!("press Ctrl+C to stop");
    let sup = Supervisor::builder(SupervisorConfig::default()).build();
    let run = sup.run(specs).await;
    info!("shutting down...");
    token.cancel();

    run.map_err(|e| anyhow::anyhow!("supervisor: {e}"))?;
    pump.await?;
    server.await??;

    info!("stopped");
    Ok(())
}
