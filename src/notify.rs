//! Hand-off point to the display layer.

use tokio::sync::watch;

use crate::models::PriceSnapshot;

/// What the display receives after each accepted ticker frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    pub snapshot: PriceSnapshot,
    pub title: String,
}

/// Receives a fresh snapshot whenever prices change.
pub trait PriceNotifier: Send + Sync {
    fn price_changed(&self, snapshot: &PriceSnapshot, title: &str);
}

/// Publishes updates on a `watch` channel; receivers only see the latest one.
#[derive(Debug)]
pub struct WatchNotifier {
    tx: watch::Sender<DisplayUpdate>,
}

impl WatchNotifier {
    /// Create a notifier seeded with `initial` and the receiver the display polls.
    pub fn channel(initial: PriceSnapshot) -> (Self, watch::Receiver<DisplayUpdate>) {
        let title = initial.title();
        let (tx, rx) = watch::channel(DisplayUpdate {
            snapshot: initial,
            title,
        });
        (Self { tx }, rx)
    }
}

impl PriceNotifier for WatchNotifier {
    fn price_changed(&self, snapshot: &PriceSnapshot, title: &str) {
        // Kept even with no receivers so a late subscriber sees the latest value.
        self.tx.send_replace(DisplayUpdate {
            snapshot: snapshot.clone(),
            title: title.to_string(),
        });
    }
}
