//! Request latency instrumentation.

use async_trait::async_trait;
use prometheus::{HistogramOpts, HistogramVec};
use tokio::time::Instant;

use crate::{operation_name, Request, Requester, Response, TransportError};

/// Label names of histograms accepted by [`TimedClient`].
pub const DURATION_LABELS: [&str; 3] = ["method", "route", "status_code"];

/// Build an unregistered request-duration histogram with the labels
/// [`TimedClient`] expects. The caller registers it.
pub fn duration_histogram(name: &str, help: &str) -> prometheus::Result<HistogramVec> {
    HistogramVec::new(HistogramOpts::new(name, help), &DURATION_LABELS)
}

/// Observes how long each request takes, labelled by method, operation and
/// status code (`"error"` when no response was received).
pub struct TimedClient<R> {
    inner: R,
    histogram: HistogramVec,
}

impl<R> TimedClient<R> {
    pub fn new(inner: R, histogram: HistogramVec) -> Self {
        Self { inner, histogram }
    }
}

#[async_trait]
impl<R: Requester> Requester for TimedClient<R> {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let method = req.method().to_string();
        let route = operation_name(&req);
        let start = Instant::now();

        let result = self.inner.execute(req).await;

        let status = match &result {
            Ok(resp) => resp.status().as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        self.histogram
            .with_label_values(&[method.as_str(), route.as_str(), status.as_str()])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FakeRequester, OperationName};
    use bytes::Bytes;
    use http::StatusCode;

    fn histogram() -> HistogramVec {
        duration_histogram("test_request_duration_seconds", "test").unwrap()
    }

    #[tokio::test]
    async fn observes_status_code_and_operation() {
        let fake = FakeRequester::new();
        fake.push_response(StatusCode::NOT_FOUND, "nope");
        let hist = histogram();
        let client = TimedClient::new(fake, hist.clone());

        let mut req = http::Request::get("http://am/api/v1/limits").body(Bytes::new()).unwrap();
        req.extensions_mut().insert(OperationName("get_limits"));
        let resp = client.execute(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.body().as_ref(), b"nope");
        let count = hist
            .with_label_values(&["GET", "get_limits", "404"])
            .get_sample_count();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn transport_failures_are_timed_as_error() {
        let fake = FakeRequester::new();
        fake.push_transport_error("connection refused");
        let hist = histogram();
        let client = TimedClient::new(fake, hist.clone());

        let req = http::Request::post("http://loki/loki/api/v1/push").body(Bytes::new()).unwrap();
        assert!(client.execute(req).await.is_err());

        let count = hist
            .with_label_values(&["POST", "/loki/api/v1/push", "error"])
            .get_sample_count();
        assert_eq!(count, 1);
    }
}
