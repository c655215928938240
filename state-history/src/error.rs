use chrono::{DateTime, Utc};
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

    #[error("failed to encode streams: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("sample timestamp {0} is outside the nanosecond epoch range")]
    TimestampOutOfRange(DateTime<Utc>),
    #[error("failed to compress streams: {0}")]
    Compress(#[from] snap::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),
    #[error("error sending request to loki: {0}")]
    Transport(#[source] TransportError),
    #[error("received a non-200 response from loki, status: {status}{}", body_suffix(.body))]
    Status { status: u16, body: String },
    #[error("error parsing response from loki: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("start time cannot be after end time (start: {start}, end: {end})")]
    InvalidRange { start: i64, end: i64 },
    #[error("query size {size} exceeds limit {limit}")]
    QueryTooLarge { size: usize, limit: usize },
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(", body: {body}")
    }
}
