//! Polls a readiness endpoint until it answers, refuses, or a deadline passes.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_client::{OperationName, Requester, TransportError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

pub const READY_PATH: &str = "/alertmanager/-/ready";
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a readiness probe stands. Everything but `Polling` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Polling,
    Ready,
    /// The backend answered with a 4xx; retrying will not help.
    Failed(StatusCode),
    TimedOut,
}

impl ProbeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProbeState::Polling)
    }

    /// Transition taken after one poll.
    pub fn after_poll(outcome: &Result<StatusCode, TransportError>) -> ProbeState {
        match outcome {
            Ok(status) if *status == StatusCode::OK => ProbeState::Ready,
            Ok(status) if status.is_client_error() => ProbeState::Failed(*status),
            _ => ProbeState::Polling,
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            ProbeState::Ready => Ok(()),
            ProbeState::Failed(status) => Err(Error::NotReady(status.as_u16())),
            ProbeState::Polling | ProbeState::TimedOut => Err(Error::ReadyTimeout),
        }
    }
}

pub struct ReadinessProber<R> {
    requester: R,
    url: Url,
    interval: Duration,
    timeout: Duration,
}

impl<R: Requester> ReadinessProber<R> {
    pub fn new(requester: R, url: Url) -> Self {
        Self {
            requester,
            url,
            interval: READY_POLL_INTERVAL,
            timeout: READY_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    /// Poll every interval until a terminal state is reached.
    ///
    /// The first poll happens one interval after the call. An in-flight poll
    /// is dropped when the deadline passes.
    pub async fn run(&self) -> ProbeState {
        let polling = async {
            let mut ticker = tokio::time::interval(self.interval);
            // A slow poll must not be followed by a burst of catch-up polls.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let state = ProbeState::after_poll(&self.poll_once().await);
                if state.is_terminal() {
                    return state;
                }
            }
        };

        match tokio::time::timeout(self.timeout, polling).await {
            Ok(state) => state,
            Err(_) => {
                warn!(url = %self.url, timeout = ?self.timeout, "readiness check timed out");
                ProbeState::TimedOut
            }
        }
    }

    async fn poll_once(&self) -> Result<StatusCode, TransportError> {
        let mut req = http::Request::get(self.url.as_str()).body(Bytes::new())?;
        req.extensions_mut().insert(OperationName("ready"));

        match self.requester.execute(req).await {
            Ok(resp) => {
                let status = resp.status();
                if status != StatusCode::OK {
                    debug!(
                        url = %self.url,
                        status = status.as_u16(),
                        "readiness check returned non-ready status"
                    );
                }
                Ok(status)
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "readiness check failed");
                Err(e)
            }
        }
    }
}
