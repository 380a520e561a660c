mod bootstrap;
mod health;
mod routes;
mod service;
mod signature;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use oncall_core::config::{AppConfig, LoadOptions};
use oncall_core::pending::PendingSelectionStore;
use oncall_slack::flow::SchedulingFlow;
use oncall_slack::SlackApiClient;

use crate::routes::AppState;
use crate::service::BufferedScheduleService;

fn init_logging(config: &AppConfig) {
    use oncall_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other work.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let flush_period = Duration::from_secs(app.config.buffer.flush_interval_secs);
    let flush_task = app.writer.spawn_scheduled_flush(flush_period);

    let eviction_age = Duration::from_secs(app.config.pending.eviction_secs);
    let eviction_task = spawn_pending_eviction(Arc::clone(&app.pending), eviction_age);

    let client = SlackApiClient::new(
        app.config.slack.bot_token.clone(),
        app.config.slack.directory_token.clone(),
    );
    let settle_minutes = app.config.buffer.flush_interval_secs.div_ceil(60).max(1);
    let flow = SchedulingFlow::new(
        client.clone(),
        client,
        BufferedScheduleService::new(Arc::clone(&app.writer)),
        Arc::clone(&app.pending),
        settle_minutes,
    );

    let state =
        AppState { flow: Arc::new(flow), signing_secret: app.config.slack.signing_secret.clone() };
    let router = routes::router(state).merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(event_name = "system.server.started", bind_address = %address, "oncall-server listening");

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    info!(event_name = "system.server.stopping", "oncall-server stopping");
    flush_task.abort();
    eviction_task.abort();

    // Push whatever is still buffered before the process exits.
    app.writer.flush().await?;

    Ok(())
}

fn spawn_pending_eviction(
    pending: Arc<PendingSelectionStore>,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(max_age);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = pending.evict_stale(max_age);
            if !evicted.is_empty() {
                info!(
                    event_name = "system.pending.evicted",
                    count = evicted.len(),
                    "dropped abandoned scheduling selections"
                );
            }
        }
    })
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
