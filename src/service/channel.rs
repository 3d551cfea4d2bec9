//! Channel-backed tile service.
//!
//! Request/reply over crossbeam channels: the backend side sends a
//! [`TileRequest`] carrying a one-shot reply sender; whoever services the
//! request (a transport thread, a test harness) answers on it. The fetch
//! waits in short slices so shutdown can interrupt a pending request, and
//! gives up at the configured deadline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use super::{ServiceError, TileDelta, TileQuery, TileService};
use crate::config::StreamingConfig;

/// A pending differential request with its reply channel.
pub struct TileRequest {
    /// The query to answer.
    pub query: TileQuery,
    /// Send the response here. Dropping the sender without answering makes
    /// the fetch fail as unavailable.
    pub reply: Sender<TileDelta>,
}

/// [`TileService`] implementation over a request channel.
pub struct ChannelTileService {
    requests: Sender<TileRequest>,
    timeout: Duration,
    wait_slice: Duration,
    cancel: Arc<AtomicBool>,
}

impl ChannelTileService {
    /// Create a service that sends requests on `requests` and waits up to
    /// `timeout` for each reply, polling in `wait_slice` increments.
    pub fn new(requests: Sender<TileRequest>, timeout: Duration, wait_slice: Duration) -> Self {
        Self {
            requests,
            timeout,
            wait_slice: wait_slice.max(Duration::from_millis(1)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a service with timing taken from a [`StreamingConfig`].
    pub fn from_config(requests: Sender<TileRequest>, config: &StreamingConfig) -> Self {
        Self::new(requests, config.request_timeout(), config.wait_slice())
    }

    /// Handle for interrupting in-flight fetches. Set it to `true` during
    /// shutdown; pending and future fetches return [`ServiceError::Cancelled`].
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }
}

impl TileService for ChannelTileService {
    fn fetch_differential(&self, query: &TileQuery) -> Result<TileDelta, ServiceError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(ServiceError::Cancelled);
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(TileRequest {
                query: query.clone(),
                reply: reply_tx,
            })
            .map_err(|_| ServiceError::Unavailable("request channel disconnected".to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(ServiceError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ServiceError::Timeout(self.timeout));
            }
            let slice = self.wait_slice.min(deadline - now);
            match reply_rx.recv_timeout(slice) {
                Ok(delta) => return Ok(delta),
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("Waiting for tile service response ...");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ServiceError::Unavailable(
                        "reply channel dropped without a response".to_string(),
                    ));
                }
            }
        }
    }
}
