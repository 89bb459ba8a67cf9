//! Concurrency-safe holder of the latest prices and the live connection.
//!
//! The stream handler writes, the display layer reads. Quotes, the
//! last-update timestamp and the current connection handle all live behind
//! one read/write lock so a reader never pairs state from different frames.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::errors::{AppError, Result};
use crate::models::{BTC_INSTRUMENT, ETH_INSTRUMENT, PriceSnapshot, Quote, TickerQuote};

/// Cloneable handle used to queue outbound frames on the active connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a frame for the connection writer. Fails once the writer is gone.
    pub fn send(&self, msg: Message) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| AppError::ConnectionClosed(format!("connection {} writer gone", self.id)))
    }
}

#[derive(Debug)]
struct Inner {
    btc: Quote,
    eth: Quote,
    last_update: Option<DateTime<Utc>>,
    connection: Option<ConnectionHandle>,
}

impl Inner {
    fn slot_mut(&mut self, instrument_id: &str) -> Option<&mut Quote> {
        match instrument_id {
            BTC_INSTRUMENT => Some(&mut self.btc),
            ETH_INSTRUMENT => Some(&mut self.eth),
            _ => None,
        }
    }

    /// Replace one quote; returns true if the displayed value changed.
    fn replace(&mut self, instrument_id: &str, raw_price: &str) -> bool {
        let Some(slot) = self.slot_mut(instrument_id) else {
            debug!(instrument_id, "[STORE] ignoring untracked instrument");
            return false;
        };
        let quote = Quote::new(instrument_id, raw_price);
        if *slot == quote {
            return false;
        }
        *slot = quote;
        true
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.last_update = Some(match self.last_update {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }
}

#[derive(Debug)]
pub struct PriceStore {
    inner: RwLock<Inner>,
    next_connection_id: AtomicU64,
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceStore {
    /// Store seeded with loading placeholders and no connection.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                btc: Quote::placeholder(BTC_INSTRUMENT),
                eth: Quote::placeholder(ETH_INSTRUMENT),
                last_update: None,
                connection: None,
            }),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Format `raw_price` and replace the quote for `instrument_id`.
    ///
    /// Returns true if the stored value changed (and the timestamp advanced).
    pub fn update(&self, instrument_id: &str, raw_price: &str) -> bool {
        let mut inner = self.inner.write();
        let changed = inner.replace(instrument_id, raw_price);
        if changed {
            inner.touch();
        }
        changed
    }

    /// Apply every record of one ticker push under a single write lock.
    ///
    /// Returns the number of quotes whose value changed.
    pub fn apply(&self, quotes: &[TickerQuote]) -> usize {
        let mut inner = self.inner.write();
        let changed = quotes
            .iter()
            .filter(|q| inner.replace(&q.inst_id, &q.last_price))
            .count();
        if changed > 0 {
            inner.touch();
        }
        changed
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        let inner = self.inner.read();
        PriceSnapshot {
            btc: inner.btc.last_price.clone(),
            eth: inner.eth.last_price.clone(),
            last_update: inner.last_update,
        }
    }

    /// Register a new live connection, replacing any previous one.
    pub fn attach_connection(&self, outbound: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        if let Some(prev) = inner.connection.replace(ConnectionHandle { id, outbound }) {
            debug!(prev = prev.id, id, "[STORE] replaced connection handle");
        }
        id
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.inner.read().connection.clone()
    }

    /// Clear the connection handle if it still belongs to connection `id`.
    pub fn detach_connection(&self, id: u64) {
        let mut inner = self.inner.write();
        if inner.connection.as_ref().is_some_and(|c| c.id == id) {
            inner.connection = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn quote(id: &str, price: &str) -> TickerQuote {
        TickerQuote {
            inst_id: id.to_string(),
            last_price: price.to_string(),
        }
    }

    #[test]
    fn starts_with_placeholders() {
        let store = PriceStore::new();
        let snap = store.snapshot();
        assert_eq!(snap.btc, "Loading...");
        assert_eq!(snap.eth, "Loading...");
        assert!(snap.last_update.is_none());
    }

    #[test]
    fn update_formats_and_advances_timestamp() {
        let store = PriceStore::new();
        let before = store.snapshot().last_update;
        assert!(store.update("BTCUSDT", "60000.123"));
        let snap = store.snapshot();
        assert_eq!(snap.btc, "60000.12");
        assert!(snap.last_update > before);
    }

    #[test]
    fn timestamp_never_goes_backwards() {
        let store = PriceStore::new();
        let ahead = Utc::now() + chrono::Duration::hours(1);
        store.inner.write().last_update = Some(ahead);
        assert!(store.update("BTCUSDT", "61000.5"));
        assert_eq!(store.snapshot().last_update, Some(ahead));
        assert_eq!(store.apply(&[quote("ETHUSDT", "3100")]), 1);
        assert_eq!(store.snapshot().last_update, Some(ahead));
    }

    #[test]
    fn unchanged_value_keeps_timestamp() {
        let store = PriceStore::new();
        store.update("ETHUSDT", "3000.555");
        let first = store.snapshot().last_update;
        // Same value after truncation.
        assert!(!store.update("ETHUSDT", "3000.559"));
        assert_eq!(store.snapshot().last_update, first);
    }

    #[test]
    fn untracked_instrument_ignored() {
        let store = PriceStore::new();
        assert_eq!(store.apply(&[quote("SOLUSDT", "150.00")]), 0);
        assert!(store.snapshot().last_update.is_none());
    }

    #[test]
    fn apply_updates_both_instruments() {
        let store = PriceStore::new();
        let n = store.apply(&[quote("BTCUSDT", "1.234"), quote("ETHUSDT", "")]);
        assert_eq!(n, 2);
        let snap = store.snapshot();
        assert_eq!(snap.btc, "1.23");
        assert_eq!(snap.eth, "N/A");
    }

    #[test]
    fn detach_ignores_stale_connection_id() {
        let store = PriceStore::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let first = store.attach_connection(tx1);
        let second = store.attach_connection(tx2);
        store.detach_connection(first);
        assert_eq!(store.connection().map(|c| c.id()), Some(second));
        store.detach_connection(second);
        assert!(store.connection().is_none());
    }

    #[test]
    fn concurrent_readers_never_see_torn_frames() {
        let store = Arc::new(PriceStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..5_000u32 {
                    let price = format!("{i}.00");
                    store.apply(&[quote("BTCUSDT", &price), quote("ETHUSDT", &price)]);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        let snap = store.snapshot();
                        assert_eq!(snap.btc, snap.eth, "torn snapshot: {snap:?}");
                    }
                })
            })
            .collect();
        writer.join().expect("writer panicked");
        for r in readers {
            r.join().expect("reader panicked");
        }
        assert_eq!(store.snapshot().btc, "4999.00");
    }
}
