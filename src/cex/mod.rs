//! CEX WebSocket client.
//!
//! Responsibilities:
//! • Maintain a connection to the exchange public ticker feed.
//! • Keep the latest BTC / ETH prices in the shared store.
//! • Handle heartbeats, reconnection and backoff.

use std::future::Future;
use std::time::Duration;

use futures::{Sink, Stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, client_async_tls, connect_async};
use tracing::info;
use url::Url;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

pub mod bitget;
pub mod heartbeat;
pub mod proxy;
pub mod session;
pub mod supervisor;

/// Opens one transport to the exchange per call.
pub trait Connector: Send + Sync {
    type Transport: Stream<Item = std::result::Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Transport>> + Send;
}

/// Connects to the Bitget public endpoint, optionally through an HTTP proxy.
#[derive(Debug, Clone)]
pub struct BitgetConnector {
    url: Url,
    proxy: Option<Url>,
    connect_timeout: Duration,
}

impl BitgetConnector {
    pub fn new(url: Url, proxy: Option<Url>, connect_timeout: Duration) -> Self {
        Self {
            url,
            proxy,
            connect_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.ws_url()?,
            config.resolve_proxy(),
            config.connect_timeout(),
        ))
    }

    async fn handshake(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let ws = match &self.proxy {
            Some(proxy) => {
                let tunnel = proxy::connect_via_proxy(proxy, &self.url).await?;
                client_async_tls(self.url.as_str(), tunnel).await?.0
            }
            None => connect_async(self.url.as_str()).await?.0,
        };
        Ok(ws)
    }
}

impl Connector for BitgetConnector {
    type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn connect(&self) -> impl Future<Output = Result<Self::Transport>> + Send {
        async move {
            info!(url = %self.url, proxy = ?self.proxy.as_ref().map(Url::as_str), "[FEED] connecting");
            tokio::time::timeout(self.connect_timeout, self.handshake())
                .await
                .map_err(|_| {
                    AppError::Timeout(format!("handshake exceeded {:?}", self.connect_timeout))
                })?
        }
    }
}
