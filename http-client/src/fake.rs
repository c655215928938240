//! Scripted in-memory [`Requester`] for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};

use crate::{OperationName, Request, Requester, Response, TransportError};

/// A request as seen by [`FakeRequester`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub operation: Option<&'static str>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a query parameter, without percent-decoding.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key).then(|| v.to_string())
        })
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(StatusCode, Bytes),
    Fail(String),
    Hang,
}

/// Replays scripted responses in order and records every request.
///
/// Once the script is exhausted every further request gets the fallback
/// response (`200` with an empty body unless changed).
#[derive(Debug, Clone)]
pub struct FakeRequester {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Arc<Mutex<Scripted>>,
}

impl Default for FakeRequester {
    fn default() -> Self {
        Self {
            requests: Arc::default(),
            script: Arc::default(),
            fallback: Arc::new(Mutex::new(Scripted::Respond(StatusCode::OK, Bytes::new()))),
        }
    }
}

impl FakeRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, status: StatusCode, body: impl Into<Bytes>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Respond(status, body.into()));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// The next request never completes.
    pub fn push_hang(&self) {
        self.script.lock().unwrap().push_back(Scripted::Hang);
    }

    pub fn set_fallback(&self, status: StatusCode, body: impl Into<Bytes>) {
        *self.fallback.lock().unwrap() = Scripted::Respond(status, body.into());
    }

    /// Non-destructive snapshot of the requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Requester for FakeRequester {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let operation = req.extensions().get::<OperationName>().map(|op| op.0);
        let (parts, body) = req.into_parts();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            operation,
        });

        let next = self.script.lock().unwrap().pop_front();
        let next = next.unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        match next {
            Scripted::Respond(status, body) => {
                let mut resp = http::Response::new(body);
                *resp.status_mut() = status;
                Ok(resp)
            }
            Scripted::Fail(message) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message,
            ))),
            Scripted::Hang => std::future::pending().await,
        }
    }
}
