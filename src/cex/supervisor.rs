//! Reconnect loop around [`Session`].

use std::time::Duration;

use tracing::{info, warn};

use crate::cex::Connector;
use crate::cex::session::{FeedContext, Session};

/// The backoff cap is this many times the initial delay.
pub const MAX_BACKOFF_FACTOR: u32 = 30;

/// Doubling delay capped at `MAX_BACKOFF_FACTOR` times the initial value.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            current: initial,
            max: initial
                .checked_mul(MAX_BACKOFF_FACTOR)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Delay to wait now; the following call returns double, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        delay
    }
}

/// Run sessions back to back until shutdown, sleeping with backoff in between.
///
/// The backoff is never reset, even after a long healthy session.
pub async fn run<C: Connector>(connector: C, ctx: FeedContext, initial_backoff: Duration) {
    let mut backoff = Backoff::new(initial_backoff);
    let mut attempt: u64 = 0;

    while !ctx.shutdown.is_cancelled() {
        attempt += 1;
        let outcome = Session::new(&connector, &ctx).run().await;

        if ctx.shutdown.is_cancelled() {
            info!(attempt, "[SUPERVISOR] shutdown observed, stopping");
            break;
        }

        let delay = backoff.next_delay();
        warn!(attempt, error = %outcome, ?delay, "[SUPERVISOR] session ended, reconnecting");
        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => {
                info!(attempt, "[SUPERVISOR] shutdown during backoff, stopping");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
