//! Core library for the price-feed project.
//!
//! Keeps a live BTC / ETH spot price feed from the exchange WebSocket and
//! hands snapshots to the display layer.

pub mod cex;
pub mod config;
pub mod errors;
pub mod models;
pub mod notify;
pub mod store;
pub mod utils;
