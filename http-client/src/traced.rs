//! Span propagation around each request.

use async_trait::async_trait;
use tracing::{field, Instrument};

use crate::{operation_name, Request, Requester, Response, TransportError};

/// Wraps every request in a `tracing` span named `"<METHOD> <operation>"`.
///
/// The span is entered for the lifetime of the inner future, so dropping the
/// caller's future (cancellation, timeout) ends the span along with the call.
pub struct TracedClient<R> {
    inner: R,
    component: &'static str,
}

impl<R> TracedClient<R> {
    pub fn new(inner: R, component: &'static str) -> Self {
        Self { inner, component }
    }
}

#[async_trait]
impl<R: Requester> Requester for TracedClient<R> {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let name = format!("{} {}", req.method(), operation_name(&req));
        let span = tracing::info_span!(
            "http.client",
            otel.name = %name,
            component = self.component,
            http.status_code = field::Empty,
            error = field::Empty,
        );

        let result = self.inner.execute(req).instrument(span.clone()).await;

        match &result {
            Ok(resp) => {
                span.record("http.status_code", resp.status().as_u16());
            }
            Err(e) => {
                span.record("error", field::display(e));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FakeRequester;
    use bytes::Bytes;
    use http::StatusCode;

    #[tokio::test]
    async fn passes_response_through_untouched() {
        let fake = FakeRequester::new();
        fake.push_response(StatusCode::OK, r#"{"status":"success"}"#);
        let client = TracedClient::new(fake.clone(), "test");

        let req = http::Request::delete("http://am/api/v1/grafana/state")
            .body(Bytes::new())
            .unwrap();
        let resp = client.execute(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_ref(), br#"{"status":"success"}"#);
        assert_eq!(fake.requests()[0].method, http::Method::DELETE);
    }

    #[tokio::test]
    async fn passes_errors_through_untouched() {
        let fake = FakeRequester::new();
        fake.push_transport_error("reset by peer");
        let client = TracedClient::new(fake, "test");

        let req = http::Request::get("http://am/").body(Bytes::new()).unwrap();
        let err = client.execute(req).await.unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }
}
