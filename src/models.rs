//! Shared data structures used throughout the application.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_price;

pub const BTC_INSTRUMENT: &str = "BTCUSDT";
pub const ETH_INSTRUMENT: &str = "ETHUSDT";

/// Instruments the feed subscribes to for the whole process lifetime.
pub const TRACKED_INSTRUMENTS: [&str; 2] = [BTC_INSTRUMENT, ETH_INSTRUMENT];

/// Shown until the first ticker push for an instrument arrives.
pub const LOADING_PLACEHOLDER: &str = "Loading...";

/// Latest formatted price of one instrument.
///
/// Never mutated in place; the store swaps in a new value on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub instrument_id: String,
    pub last_price: String,
}

impl Quote {
    /// Build a quote from an exchange price string, truncating it for display.
    pub fn new(instrument_id: &str, raw_price: &str) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            last_price: format_price(raw_price),
        }
    }

    pub fn placeholder(instrument_id: &str) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            last_price: LOADING_PLACEHOLDER.to_string(),
        }
    }
}

/// Read-only view of the store handed to the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSnapshot {
    pub btc: String,
    pub eth: String,
    /// `None` until the first quote is accepted.
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    /// Short window title, e.g. `BTC: $60000.12 | ETH: $3000.50`.
    pub fn title(&self) -> String {
        format!("BTC: ${} | ETH: ${}", self.btc, self.eth)
    }

    /// Wall-clock label of the last update in local time (`HH:MM:SS`).
    pub fn last_update_label(&self) -> String {
        match self.last_update {
            Some(ts) => ts.with_timezone(&Local).format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }
}

/// One entry of the `args` array of a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTarget {
    pub inst_type: String,
    pub channel: String,
    pub inst_id: String,
}

impl SubscriptionTarget {
    pub fn spot_ticker(inst_id: &str) -> Self {
        Self {
            inst_type: "SPOT".to_string(),
            channel: "ticker".to_string(),
            inst_id: inst_id.to_string(),
        }
    }
}

/// Spot ticker subscriptions for every tracked instrument.
pub fn default_targets() -> Vec<SubscriptionTarget> {
    TRACKED_INSTRUMENTS
        .iter()
        .map(|id| SubscriptionTarget::spot_ticker(id))
        .collect()
}

/// Raw ticker record carried in the `data` array of a push.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerQuote {
    #[serde(rename = "instId")]
    pub inst_id: String,
    /// Missing prices decode as empty and display as `N/A`.
    #[serde(rename = "lastPr", default)]
    pub last_price: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_both_prices() {
        let snap = PriceSnapshot {
            btc: "60000.12".into(),
            eth: "3000.50".into(),
            last_update: None,
        };
        assert_eq!(snap.title(), "BTC: $60000.12 | ETH: $3000.50");
        assert_eq!(snap.last_update_label(), "--:--:--");
    }

    #[test]
    fn snapshot_serializes_for_display() {
        let snap = PriceSnapshot {
            btc: "1.00".into(),
            eth: "2.00".into(),
            last_update: None,
        };
        let json = serde_json::to_value(&snap).expect("serialize");
        assert_eq!(json["btc"], "1.00");
        assert!(json.get("lastUpdate").is_some());
    }

    #[test]
    fn targets_cover_tracked_instruments() {
        let targets = default_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].inst_id, BTC_INSTRUMENT);
        assert_eq!(targets[1].inst_id, ETH_INSTRUMENT);
        assert!(targets.iter().all(|t| t.inst_type == "SPOT" && t.channel == "ticker"));
    }
}
