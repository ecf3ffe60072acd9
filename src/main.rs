//! Hostbot entry point.

use std::sync::Arc;

use log::{error, info};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod aggregator;
mod bot;
mod config;
mod deletion;
mod error;
mod gateway;
mod paginator;
mod scheduler;
mod source;
mod types;

use bot::{run_dispatcher, Bot};
use config::Config;
use deletion::DeletionQueue;
use gateway::{EventStream, MessagingGateway, TelegramGateway};
use scheduler::CleanupScheduler;
use source::{CompositeSource, DirectorySource, HttpSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting hostbot with config: {:?}", cfg);

    // Messaging gateway
    let telegram = Arc::new(TelegramGateway::new(
        cfg.api_url.clone(),
        cfg.bot_token.clone(),
        cfg.poll_timeout(),
        cfg.request_timeout(),
    )?);
    let gateway: Arc<dyn MessagingGateway> = telegram.clone();

    // Directory sources
    let http = reqwest::Client::builder()
        .timeout(cfg.request_timeout())
        .build()?;
    let sources = cfg
        .directory_sources
        .iter()
        .map(|url| Box::new(HttpSource::new(http.clone(), url.clone())) as Box<dyn DirectorySource>)
        .collect();
    let source: Arc<dyn DirectorySource> = Arc::new(CompositeSource::new(sources));
    info!("Directory sources: {}", source.describe());

    // Shared state
    let queue = Arc::new(DeletionQueue::new(cfg.debounce_ticks));
    let shutdown = CancellationToken::new();

    // Event channel
    let (event_tx, event_rx) = mpsc::channel(128);

    // Update polling
    let monitor_handle = tokio::spawn(async move {
        if let Err(e) = telegram.monitor(event_tx).await {
            error!("Update polling failed: {}", e);
        }
    });

    // Dispatcher
    let bot = Arc::new(Bot::new(
        Arc::clone(&gateway),
        source,
        Arc::clone(&queue),
        cfg.page_size,
    ));
    let dispatcher_handle = tokio::spawn(run_dispatcher(bot, event_rx, shutdown.clone()));

    // Cleanup scheduler
    let scheduler = CleanupScheduler::new(Arc::clone(&queue), gateway, cfg.sweep_interval());
    let scheduler_token = shutdown.clone();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_token).await });

    // Graceful Shutdown
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down...");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    // Polling holds no state worth finishing; the others drain first.
    monitor_handle.abort();
    shutdown.cancel();
    if let Err(e) = dispatcher_handle.await {
        error!("Dispatcher task failed: {}", e);
    }
    if let Err(e) = scheduler_handle.await {
        error!("Cleanup scheduler task failed: {}", e);
    }

    info!("Shutdown complete.");
    Ok(())
}
