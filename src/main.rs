use anyhow::Result;
use price_feed::{
    cex::{BitgetConnector, session::FeedContext, supervisor},
    config::AppConfig,
    notify::WatchNotifier,
    store::PriceStore,
    utils,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = AppConfig::load();
    let connector = BitgetConnector::from_config(&config)?;
    tracing::info!(
        ws_url = %config.ws_url,
        heartbeat_secs = config.heartbeat_interval().as_secs(),
        initial_backoff_secs = config.initial_backoff().as_secs(),
        "[INIT] price-feed starting"
    );

    // Shared state
    let store = Arc::new(PriceStore::new());
    let (notifier, mut display_rx) = WatchNotifier::channel(store.snapshot());
    let shutdown = CancellationToken::new();

    let ctx = FeedContext {
        store,
        notifier: Arc::new(notifier),
        heartbeat_interval: config.heartbeat_interval(),
        shutdown: shutdown.clone(),
    };
    let feed_task = tokio::spawn(supervisor::run(connector, ctx, config.initial_backoff()));

    // Display consumer ------------------------------------------------------
    let display_task = tokio::spawn(async move {
        while display_rx.changed().await.is_ok() {
            let update = display_rx.borrow_and_update().clone();
            tracing::info!(
                title = %update.title,
                last_update = %update.snapshot.last_update_label(),
                "[DISPLAY] price-update"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("[SHUTDOWN] ctrl-c received");
    shutdown.cancel();

    feed_task.await?;
    display_task.abort();
    Ok(())
}
