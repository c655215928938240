use http_client::TransportError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid credentials: {0}")]
    InvalidCredentials(#[from] http::header::InvalidHeaderValue),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] TransportError),
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("{method} {path} failed: {source}")]
    Transport {
        method: http::Method,
        path: String,
        #[source]
        source: TransportError,
    },
    #[error("{method} {path} returned status {status}: {message}")]
    Protocol {
        method: http::Method,
        path: String,
        status: u16,
        message: String,
    },
    #[error("failed to decode response of {method} {path} (status {status}): {source}")]
    Decode {
        method: http::Method,
        path: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method} {path} succeeded but carried no data")]
    MissingData { method: http::Method, path: String },

    #[error("Alertmanager is not ready, unexpected status code {0}")]
    NotReady(u16),
    #[error("timed out waiting for Alertmanager to become ready")]
    ReadyTimeout,
}
