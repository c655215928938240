//! The wire-level executor backed by a pooled `reqwest::Client`.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Request, Requester, Response, TransportError};

/// Sends requests with `reqwest` and buffers the full response body.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport whose requests fail once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Requester for ReqwestTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let req = reqwest::Request::try_from(req)?;
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        let version = resp.version();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        let mut out = http::Response::new(body);
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
