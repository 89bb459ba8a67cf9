//! Keep-alive pings on the live connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cex::bitget::encode_ping;
use crate::config::MAX_PERIOD_SECS;
use crate::store::PriceStore;

/// Why the heartbeat stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    Cancelled,
    /// The store no longer holds this session's connection.
    ConnectionGone,
    SendFailed,
}

/// Send a ping every `period` on connection `connection_id` until cancelled.
///
/// A single failed send ends the loop; the session notices the broken
/// connection through its own read.
pub async fn run(
    store: Arc<PriceStore>,
    connection_id: u64,
    period: Duration,
    cancel: CancellationToken,
) -> HeartbeatExit {
    let period = period.clamp(Duration::from_millis(1), Duration::from_secs(MAX_PERIOD_SECS));
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return HeartbeatExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let Some(handle) = store.connection().filter(|c| c.id() == connection_id) else {
            debug!(connection_id, "[HEARTBEAT] connection gone, stopping");
            return HeartbeatExit::ConnectionGone;
        };
        if let Err(e) = handle.send(Message::Text(encode_ping())) {
            warn!(connection_id, error = %e, "[HEARTBEAT] ping failed, stopping");
            return HeartbeatExit::SendFailed;
        }
        debug!(connection_id, "[HEARTBEAT] ping sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PERIOD: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn sends_pings_until_cancelled() {
        let store = Arc::new(PriceStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = store.attach_connection(tx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(store.clone(), id, PERIOD, cancel.clone()));

        for _ in 0..2 {
            let msg = rx.recv().await.expect("ping");
            assert_eq!(msg, Message::Text(r#"{"op":"ping"}"#.to_string()));
        }
        cancel.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatExit::Cancelled);
    }

    #[tokio::test]
    async fn stops_without_connection() {
        let store = Arc::new(PriceStore::new());
        let exit = run(store, 7, PERIOD, CancellationToken::new()).await;
        assert_eq!(exit, HeartbeatExit::ConnectionGone);
    }

    #[tokio::test]
    async fn stops_when_connection_replaced() {
        let store = Arc::new(PriceStore::new());
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let old = store.attach_connection(tx1);
        store.attach_connection(tx2);
        let exit = run(store, old, PERIOD, CancellationToken::new()).await;
        assert_eq!(exit, HeartbeatExit::ConnectionGone);
    }

    #[tokio::test]
    async fn stops_after_first_failed_send() {
        let store = Arc::new(PriceStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let id = store.attach_connection(tx);
        drop(rx);
        let exit = run(store, id, PERIOD, CancellationToken::new()).await;
        assert_eq!(exit, HeartbeatExit::SendFailed);
    }

    #[tokio::test]
    async fn parent_shutdown_cancels_child() {
        let store = Arc::new(PriceStore::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = store.attach_connection(tx);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            store,
            id,
            Duration::from_secs(30),
            shutdown.child_token(),
        ));
        shutdown.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatExit::Cancelled);
    }

    #[tokio::test]
    async fn oversized_period_is_clamped() {
        let store = Arc::new(PriceStore::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(store, 1, Duration::MAX, cancel.clone()));
        tokio::time::sleep(PERIOD).await;
        cancel.cancel();
        assert_eq!(task.await.unwrap(), HeartbeatExit::Cancelled);
    }
}
