//! Composable HTTP request executors.
//!
//! Every layer implements [`Requester`], so the decorators can be stacked in
//! any order without knowing what they wrap:
//!
//! ```text
//! TimedClient -> TracedClient -> (auth layer) -> ReqwestTransport
//! ```
//!
//! Requests and responses carry fully buffered [`Bytes`] bodies. The
//! transport reads the whole response before returning, so no caller ever has
//! to remember to release a connection.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod fake;
pub mod timed;
pub mod traced;
pub mod transport;

pub use fake::{FakeRequester, RecordedRequest};
pub use timed::{duration_histogram, TimedClient};
pub use traced::TracedClient;
pub use transport::ReqwestTransport;

pub type Request = http::Request<Bytes>;
pub type Response = http::Response<Bytes>;

// ------------------------------------------------------------------ //
//  Errors                                                             //
// ------------------------------------------------------------------ //

/// A failure to obtain any HTTP response at all.
///
/// Non-2xx statuses are *not* transport errors; they come back as `Ok`
/// responses and are interpreted by the protocol clients.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid HTTP message: {0}")]
    InvalidMessage(#[from] http::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------ //
//  Requester capability                                               //
// ------------------------------------------------------------------ //

/// Executes one HTTP request.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn execute(&self, req: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for Arc<R> {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        (**self).execute(req).await
    }
}

#[async_trait]
impl<R: Requester + ?Sized> Requester for Box<R> {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        (**self).execute(req).await
    }
}

/// Logical operation name attached to a request as an extension.
///
/// Used by the timing and tracing layers in place of the raw path so that
/// metrics stay low-cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationName(pub &'static str);

/// The request's [`OperationName`], or its URI path when none is attached.
pub fn operation_name(req: &Request) -> String {
    match req.extensions().get::<OperationName>() {
        Some(OperationName(name)) => (*name).to_string(),
        None => req.uri().path().to_string(),
    }
}

/// Append `path` to the path of `base`, keeping any prefix the base URL has.
///
/// `http://host/prefix` joined with `/api/v1/limits` yields
/// `http://host/prefix/api/v1/limits`. The query string of `base` is kept.
pub fn join_path(base: &url::Url, path: &str) -> url::Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}
