//! Bitget public WebSocket protocol: outbound control frames and inbound
//! frame classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{AppError, Result};
use crate::models::{SubscriptionTarget, TickerQuote};

#[derive(Debug, Serialize)]
struct OutboundOp<'a> {
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a [SubscriptionTarget]>,
}

/// Wire shape of every inbound frame; which fields are present decides the kind.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrame {
    op: Option<String>,
    event: Option<String>,
    code: Option<Value>,
    msg: Option<String>,
    action: Option<String>,
    arg: Option<Value>,
    data: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    Snapshot,
    Update,
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Pong,
    SubscribeAck { arg: Option<SubscriptionTarget> },
    /// `code == "0"` is success; anything else is a failure report.
    ErrorAck { code: String, msg: String },
    TickerPush {
        action: PushAction,
        quotes: Vec<TickerQuote>,
    },
    /// Well-formed JSON matching none of the known shapes.
    Ignored,
}

pub fn encode_subscribe(targets: &[SubscriptionTarget]) -> Result<String> {
    Ok(serde_json::to_string(&OutboundOp {
        op: "subscribe",
        args: Some(targets),
    })?)
}

pub fn encode_ping() -> String {
    r#"{"op":"ping"}"#.to_string()
}

/// Codes arrive either as strings (`"0"`) or numbers (`30001`).
fn code_text(code: &Value) -> Option<String> {
    match code {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Classify an inbound payload. First match wins: pong, subscribe ack,
/// code ack, ticker push. Malformed JSON is an error, unknown shapes are
/// [`InboundFrame::Ignored`].
pub fn decode(payload: &[u8]) -> Result<InboundFrame> {
    // The exchange also answers keep-alives with a bare `pong` text frame.
    if payload.trim_ascii() == b"pong" {
        return Ok(InboundFrame::Pong);
    }
    let raw: RawFrame =
        serde_json::from_slice(payload).map_err(|e| AppError::Decode(e.to_string()))?;

    if raw.op.as_deref() == Some("pong") {
        return Ok(InboundFrame::Pong);
    }
    if raw.event.as_deref() == Some("subscribe") {
        let arg = raw.arg.and_then(|v| serde_json::from_value(v).ok());
        return Ok(InboundFrame::SubscribeAck { arg });
    }
    if let Some(code) = raw.code.as_ref().and_then(code_text) {
        return Ok(InboundFrame::ErrorAck {
            code,
            msg: raw.msg.unwrap_or_default(),
        });
    }
    let action = match raw.action.as_deref() {
        Some("snapshot") => PushAction::Snapshot,
        Some("update") => PushAction::Update,
        _ => return Ok(InboundFrame::Ignored),
    };
    // Records are decoded one by one so a bad entry does not drop its siblings.
    let quotes = raw
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<TickerQuote>(record) {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!(error = %e, "[FEED] skipping malformed ticker record");
                None
            }
        })
        .collect();
    Ok(InboundFrame::TickerPush { action, quotes })
}
