//! One connected-and-streaming lifetime of the exchange transport.
//!
//! A session walks `Connecting → Subscribing → Streaming → Closed` and always
//! ends in `Closed` with the error that ended it. The supervisor decides
//! whether to start another one.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cex::bitget::{self, InboundFrame};
use crate::cex::{Connector, heartbeat};
use crate::errors::AppError;
use crate::models::{SubscriptionTarget, default_targets};
use crate::notify::PriceNotifier;
use crate::store::PriceStore;

/// Time allowed for the writer to flush its close frame at teardown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a session shares with the rest of the process.
#[derive(Clone)]
pub struct FeedContext {
    pub store: Arc<PriceStore>,
    pub notifier: Arc<dyn PriceNotifier>,
    pub heartbeat_interval: Duration,
    /// Process-wide shutdown; sessions derive child tokens from it.
    pub shutdown: CancellationToken,
}

pub enum SessionState<T> {
    Connecting,
    Subscribing(T),
    Streaming(T),
    Closed(AppError),
}

impl<T> SessionState<T> {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Subscribing(_) => "subscribing",
            SessionState::Streaming(_) => "streaming",
            SessionState::Closed(_) => "closed",
        }
    }
}

pub struct Session<'a, C: Connector> {
    connector: &'a C,
    ctx: &'a FeedContext,
    targets: Vec<SubscriptionTarget>,
}

impl<'a, C: Connector> Session<'a, C> {
    pub fn new(connector: &'a C, ctx: &'a FeedContext) -> Self {
        Self {
            connector,
            ctx,
            targets: default_targets(),
        }
    }

    /// Drive the state machine to `Closed` and return the reason.
    pub async fn run(self) -> AppError {
        let mut state = SessionState::Connecting;
        loop {
            debug!(state = state.name(), "[FEED] session state");
            state = match state {
                SessionState::Connecting => self.connect().await,
                SessionState::Subscribing(ws) => self.subscribe(ws).await,
                SessionState::Streaming(ws) => self.stream(ws).await,
                SessionState::Closed(err) => return err,
            };
        }
    }

    pub async fn connect(&self) -> SessionState<C::Transport> {
        let attempt = tokio::select! {
            biased;
            _ = self.ctx.shutdown.cancelled() => Err(AppError::Shutdown),
            res = self.connector.connect() => res,
        };
        match attempt {
            Ok(ws) => {
                info!("[FEED] connected");
                SessionState::Subscribing(ws)
            }
            Err(e) => SessionState::Closed(e),
        }
    }

    pub async fn subscribe(&self, mut ws: C::Transport) -> SessionState<C::Transport> {
        let sent = match bitget::encode_subscribe(&self.targets) {
            Ok(text) => ws.send(Message::Text(text)).await.map_err(AppError::from),
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => {
                info!(instruments = self.targets.len(), "[FEED] subscribe sent");
                SessionState::Streaming(ws)
            }
            Err(e) => {
                let _ = ws.close().await;
                SessionState::Closed(AppError::Subscription(e.to_string()))
            }
        }
    }

    /// Register the connection, start writer and heartbeat as children, and
    /// read frames until the connection fails or shutdown fires.
    pub async fn stream(&self, ws: C::Transport) -> SessionState<C::Transport> {
        let (sink, mut source) = ws.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection_id = self.ctx.store.attach_connection(outbound_tx);
        let children = self.ctx.shutdown.child_token();

        let writer = tokio::spawn(pump_outbound(sink, outbound_rx, children.clone()));
        let heartbeat = tokio::spawn(heartbeat::run(
            Arc::clone(&self.ctx.store),
            connection_id,
            self.ctx.heartbeat_interval,
            children.clone(),
        ));
        info!(connection_id, "[FEED] streaming");

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = self.ctx.shutdown.cancelled() => Err(AppError::Shutdown),
                next = source.next() => Ok(next),
            };
            match next {
                Err(e) => break e,
                Ok(None) => break AppError::StreamEnded,
                Ok(Some(Err(e))) => break AppError::from(e),
                Ok(Some(Ok(msg))) => {
                    if let Some(e) = self.handle_message(msg) {
                        break e;
                    }
                }
            }
        };
        // The writer closes the socket on shutdown, so the peer's close reply
        // can race the token; shutdown always wins.
        let outcome = if self.ctx.shutdown.is_cancelled() {
            AppError::Shutdown
        } else {
            outcome
        };

        children.cancel();
        self.ctx.store.detach_connection(connection_id);
        match heartbeat.await {
            Ok(exit) => debug!(connection_id, ?exit, "[HEARTBEAT] stopped"),
            Err(e) => warn!(connection_id, error = %e, "[HEARTBEAT] task failed"),
        }
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
            debug!(connection_id, "[FEED] writer did not drain in time");
        }
        SessionState::Closed(outcome)
    }

    /// Returns the error that ends the session, if the message is terminal.
    fn handle_message(&self, msg: Message) -> Option<AppError> {
        match msg {
            Message::Text(text) => self.dispatch(text.as_bytes()),
            Message::Binary(bytes) => self.dispatch(&bytes),
            Message::Ping(_) | Message::Pong(_) => trace!("[FEED] transport ping/pong"),
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Some(AppError::ConnectionClosed(reason));
            }
            Message::Frame(_) => {}
        }
        None
    }

    /// Decode one payload and apply it. Never ends the session.
    pub fn dispatch(&self, payload: &[u8]) {
        let frame = match bitget::decode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "[FEED] dropping malformed frame");
                return;
            }
        };
        match frame {
            InboundFrame::Pong => trace!("[FEED] pong"),
            InboundFrame::SubscribeAck { arg } => {
                info!(inst_id = ?arg.map(|a| a.inst_id), "[FEED] subscription acknowledged");
            }
            InboundFrame::ErrorAck { code, msg } if code == "0" => {
                info!(%code, %msg, "[FEED] exchange ack");
            }
            InboundFrame::ErrorAck { code, msg } => {
                warn!(%code, %msg, "[FEED] exchange reported error");
            }
            InboundFrame::TickerPush { action, quotes } => {
                let changed = self.ctx.store.apply(&quotes);
                let snapshot = self.ctx.store.snapshot();
                trace!(?action, records = quotes.len(), changed, "[FEED] ticker push");
                self.ctx.notifier.price_changed(&snapshot, &snapshot.title());
            }
            InboundFrame::Ignored => {
                warn!(
                    payload = %String::from_utf8_lossy(payload),
                    "[FEED] dropping unrecognized frame"
                );
            }
        }
    }
}

/// Forward queued frames to the transport until cancelled or the sink fails.
async fn pump_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) where
    S: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = outbound.recv() => msg,
        };
        let Some(msg) = msg else { break };
        if let Err(e) = sink.send(msg).await {
            warn!(error = %e, "[FEED] outbound send failed");
            break;
        }
    }
    let _ = sink.close().await;
}
