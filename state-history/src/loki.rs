//! HTTP client for the log backend's push and query APIs.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http_client::{
    join_path, OperationName, ReqwestTransport, Request, Requester, Response, TimedClient,
    TracedClient,
};
use prometheus::IntCounter;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::encoder::{Encoder, EncoderKind};
use crate::error::{Error, Result};
use crate::metrics::HistoryMetrics;
use crate::stream::Stream;

pub const PUSH_PATH: &str = "/loki/api/v1/push";
pub const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";
pub const LABELS_PATH: &str = "/loki/api/v1/labels";

pub const DEFAULT_PAGE_SIZE: i64 = 1000;
pub const MAXIMUM_PAGE_SIZE: i64 = 5000;

const TENANT_HEADER: &str = "x-scope-orgid";

// ------------------------------------------------------------------ //
//  Configuration                                                      //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Default)]
pub struct LokiConfig {
    pub read_path_url: String,
    pub write_path_url: String,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
    pub tenant_id: Option<String>,
    pub encoder: EncoderKind,
    /// Longest time window a range query may span. Zero disables clamping.
    pub max_query_length: Duration,
    /// Longest LogQL query accepted, in bytes. Zero disables the check.
    pub max_query_size: usize,
    /// Per-request timeout of the underlying transport.
    pub timeout: Option<Duration>,
}

// ------------------------------------------------------------------ //
//  Query response                                                     //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryRes {
    pub data: QueryData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryData {
    #[serde(default)]
    pub result: Vec<Stream>,
}

// ------------------------------------------------------------------ //
//  Range & page clamping                                              //
// ------------------------------------------------------------------ //

/// Shrink `[start, end]` to at most `max` nanoseconds wide, keeping `end`.
/// A `max` of zero leaves the range unchanged.
pub fn clamp_range(start: i64, end: i64, max: i64) -> (i64, i64) {
    if max > 0 && end.saturating_sub(start) > max {
        (end - max, end)
    } else {
        (start, end)
    }
}

/// Page size actually requested for a caller-supplied `limit`.
pub fn clamp_limit(limit: i64) -> i64 {
    if limit < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAXIMUM_PAGE_SIZE)
    }
}

// ------------------------------------------------------------------ //
//  Client                                                             //
// ------------------------------------------------------------------ //

pub struct LokiClient {
    read_url: Url,
    write_url: Url,
    requester: Arc<dyn Requester>,
    auth_headers: Vec<(HeaderName, HeaderValue)>,
    encoder: Box<dyn Encoder>,
    max_query_length: Duration,
    max_query_size: usize,
    bytes_written: IntCounter,
}

impl LokiClient {
    pub fn new(cfg: LokiConfig, metrics: &HistoryMetrics) -> Result<Self> {
        let transport = match cfg.timeout {
            Some(timeout) => ReqwestTransport::with_timeout(timeout).map_err(Error::Client)?,
            None => ReqwestTransport::new(),
        };
        Self::with_transport(cfg, transport, metrics)
    }

    pub fn with_transport<R>(
        cfg: LokiConfig,
        transport: R,
        metrics: &HistoryMetrics,
    ) -> Result<Self>
    where
        R: Requester + 'static,
    {
        let read_url = parse_url(&cfg.read_path_url)?;
        let write_url = parse_url(&cfg.write_path_url)?;
        let requester: Arc<dyn Requester> = Arc::new(TimedClient::new(
            TracedClient::new(transport, "state-history"),
            metrics.write_duration.clone(),
        ));

        Ok(Self {
            read_url,
            write_url,
            requester,
            auth_headers: auth_headers(&cfg)?,
            encoder: cfg.encoder.build(),
            max_query_length: cfg.max_query_length,
            max_query_size: cfg.max_query_size,
            bytes_written: metrics.bytes_written.clone(),
        })
    }

    /// Check the read path answers with any 2xx.
    pub async fn ping(&self) -> Result<()> {
        let url = join_path(&self.read_url, LABELS_PATH);
        let req = self.request(http::Method::GET, &url, "loki_ping", Bytes::new(), &[])?;
        let resp = self.send(req).await?;
        check_status(&resp)?;
        debug!(url = %url, "ping to loki succeeded");
        Ok(())
    }

    /// Encode `streams` with the configured encoder and write them.
    pub async fn push(&self, streams: &[Stream]) -> Result<()> {
        let body = self.encoder.encode(streams)?;
        let len = body.len();
        let url = join_path(&self.write_url, PUSH_PATH);
        let req = self.request(
            http::Method::POST,
            &url,
            "loki_push",
            Bytes::from(body),
            self.encoder.headers(),
        )?;

        self.bytes_written.inc_by(len as u64);
        let resp = self.send(req).await?;
        check_status(&resp)?;
        debug!(streams = streams.len(), bytes = len, "pushed streams to loki");
        Ok(())
    }

    /// Run a LogQL query over `[start, end]` (Unix nanoseconds).
    ///
    /// The window is narrowed to the configured maximum query length, keeping
    /// `end`, and `limit` is clamped to `[1, MAXIMUM_PAGE_SIZE]`.
    pub async fn range_query(
        &self,
        query: &str,
        start: i64,
        end: i64,
        limit: i64,
    ) -> Result<QueryRes> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        if self.max_query_size > 0 && query.len() > self.max_query_size {
            return Err(Error::QueryTooLarge {
                size: query.len(),
                limit: self.max_query_size,
            });
        }

        let max = i64::try_from(self.max_query_length.as_nanos()).unwrap_or(i64::MAX);
        let (start, end) = clamp_range(start, end, max);
        let limit = clamp_limit(limit);

        let mut url = join_path(&self.read_url, QUERY_RANGE_PATH);
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("start", &start.to_string())
            .append_pair("end", &end.to_string())
            .append_pair("limit", &limit.to_string());

        let req = self.request(http::Method::GET, &url, "loki_query_range", Bytes::new(), &[])?;
        let resp = self.send(req).await?;
        check_status(&resp)?;

        serde_json::from_slice(resp.body()).map_err(Error::Decode)
    }

    fn request(
        &self,
        method: http::Method,
        url: &Url,
        operation: &'static str,
        body: Bytes,
        headers: &[(&'static str, &'static str)],
    ) -> Result<Request> {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .extension(OperationName(operation));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        for (name, value) in &self.auth_headers {
            builder = builder.header(name.clone(), value.clone());
        }
        Ok(builder.body(body)?)
    }

    async fn send(&self, req: Request) -> Result<Response> {
        self.requester.execute(req).await.map_err(Error::Transport)
    }
}

/// Tenant header whenever a tenant is set, plus Basic credentials whenever a
/// user or password is set. Unlike the Alertmanager path these are independent.
fn auth_headers(cfg: &LokiConfig) -> Result<Vec<(HeaderName, HeaderValue)>> {
    let mut headers = Vec::with_capacity(2);

    let user = cfg.basic_auth_user.as_deref().unwrap_or("");
    let password = cfg.basic_auth_password.as_deref().unwrap_or("");
    if !user.is_empty() || !password.is_empty() {
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        value.set_sensitive(true);
        headers.push((AUTHORIZATION, value));
    }

    if let Some(tenant) = cfg.tenant_id.as_deref().filter(|t| !t.is_empty()) {
        headers.push((HeaderName::from_static(TENANT_HEADER), HeaderValue::from_str(tenant)?));
    }

    Ok(headers)
}

fn check_status(resp: &Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }

    let body = String::from_utf8_lossy(resp.body()).trim().to_string();
    if !body.is_empty() {
        error!(status = status.as_u16(), body = %body, "error response from loki");
    }
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: "expected an http or https base URL".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Sample;
    use chrono::{TimeZone, Utc};
    use http::StatusCode;
    use http_client::FakeRequester;
    use prometheus::Registry;
    use std::collections::BTreeMap;

    fn config() -> LokiConfig {
        LokiConfig {
            read_path_url: "http://loki-read:3100".into(),
            write_path_url: "http://loki-write:3100".into(),
            tenant_id: Some("tenant-1".into()),
            encoder: EncoderKind::Json,
            ..Default::default()
        }
    }

    fn setup(cfg: LokiConfig) -> (LokiClient, FakeRequester, HistoryMetrics) {
        let metrics = HistoryMetrics::new(&Registry::new()).unwrap();
        let fake = FakeRequester::new();
        let client = LokiClient::with_transport(cfg, fake.clone(), &metrics).unwrap();
        (client, fake, metrics)
    }

    fn stream() -> Stream {
        Stream {
            labels: BTreeMap::from([("from".to_string(), "evaluation-history".to_string())]),
            values: vec![Sample {
                t: Utc.timestamp_nanos(42),
                v: "line".to_string(),
            }],
        }
    }

    // ------------------------------------------------------------------ //
    //  Clamping                                                           //
    // ------------------------------------------------------------------ //

    #[test]
    fn clamp_range_right_anchors_window() {
        assert_eq!(clamp_range(0, 100, 30), (70, 100));
        assert_eq!(clamp_range(-50, 50, 10), (40, 50));
    }

    #[test]
    fn clamp_range_leaves_small_or_unlimited_ranges() {
        assert_eq!(clamp_range(0, 100, 0), (0, 100));
        assert_eq!(clamp_range(0, 100, 100), (0, 100));
        assert_eq!(clamp_range(10, 20, 1000), (10, 20));
    }

    #[test]
    fn clamp_limit_table() {
        assert_eq!(clamp_limit(1100), 1100);
        assert_eq!(clamp_limit(0), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(-100), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(6000), MAXIMUM_PAGE_SIZE);
        assert_eq!(clamp_limit(1), 1);
    }

    // ------------------------------------------------------------------ //
    //  Push                                                               //
    // ------------------------------------------------------------------ //

    #[tokio::test]
    async fn push_posts_encoded_body_with_headers() {
        let cfg = LokiConfig {
            basic_auth_user: Some("user".into()),
            basic_auth_password: Some("pass".into()),
            ..config()
        };
        let (client, fake, metrics) = setup(cfg);
        fake.push_response(StatusCode::NO_CONTENT, "");

        client.push(&[stream()]).await.unwrap();

        let req = &fake.requests()[0];
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.uri.to_string(), "http://loki-write:3100/loki/api/v1/push");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("X-Scope-OrgID"), Some("tenant-1"));
        let expected = format!("Basic {}", STANDARD.encode("user:pass"));
        assert_eq!(req.header("authorization"), Some(expected.as_str()));
        assert_eq!(metrics.bytes_written.get(), req.body.len() as u64);

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["streams"][0]["values"][0], serde_json::json!(["42", "line"]));
    }

    #[tokio::test]
    async fn push_of_empty_stream_still_framed_and_counted() {
        let cfg = LokiConfig {
            encoder: EncoderKind::SnappyProto,
            ..config()
        };
        let (client, fake, metrics) = setup(cfg);

        client.push(&[Stream::default()]).await.unwrap();

        let req = &fake.requests()[0];
        assert_eq!(req.header("content-type"), Some("application/x-protobuf"));
        assert_eq!(req.header("content-encoding"), Some("snappy"));
        assert!(!req.body.is_empty());
        assert_eq!(metrics.bytes_written.get(), req.body.len() as u64);
    }

    #[tokio::test]
    async fn push_error_includes_status_and_body() {
        let (client, fake, _metrics) = setup(config());
        fake.push_response(StatusCode::TOO_MANY_REQUESTS, "ingestion rate limit exceeded");

        let err = client.push(&[stream()]).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 429, .. }));
        let msg = err.to_string();
        assert!(msg.contains("429"), "{msg}");
        assert!(msg.contains("ingestion rate limit exceeded"), "{msg}");
    }

    #[tokio::test]
    async fn push_transport_error_is_returned() {
        let (client, fake, _metrics) = setup(config());
        fake.push_transport_error("connection reset");

        let err = client.push(&[stream()]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    // ------------------------------------------------------------------ //
    //  Query                                                              //
    // ------------------------------------------------------------------ //

    #[tokio::test]
    async fn range_query_clamps_limit() {
        for (limit, sent) in [(1100, "1100"), (0, "1000"), (-100, "1000"), (6000, "5000")] {
            let (client, fake, _metrics) = setup(config());
            fake.push_response(StatusCode::OK, r#"{"data":{"result":[]}}"#);

            client.range_query("{from=\"x\"}", 0, 10, limit).await.unwrap();
            assert_eq!(fake.requests()[0].query_param("limit").as_deref(), Some(sent));
        }
    }

    #[tokio::test]
    async fn range_query_clamps_window_to_max_query_length() {
        let cfg = LokiConfig {
            max_query_length: Duration::from_secs(60),
            ..config()
        };
        let (client, fake, _metrics) = setup(cfg);
        fake.push_response(StatusCode::OK, r#"{"data":{"result":[]}}"#);

        let end = 1_700_000_000_000_000_000;
        let start = end - 3_600_000_000_000;
        client.range_query("{a=\"b\"}", start, end, 10).await.unwrap();

        let req = &fake.requests()[0];
        assert_eq!(req.uri.path(), "/loki/api/v1/query_range");
        assert_eq!(req.query_param("start"), Some((end - 60_000_000_000).to_string()));
        assert_eq!(req.query_param("end"), Some(end.to_string()));
        assert_eq!(req.header("X-Scope-OrgID"), Some("tenant-1"));
    }

    #[tokio::test]
    async fn range_query_rejects_inverted_range_without_request() {
        let (client, fake, _metrics) = setup(config());

        let err = client.range_query("{}", 10, 5, 100).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRange { start: 10, end: 5 }));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn range_query_rejects_oversized_query() {
        let cfg = LokiConfig {
            max_query_size: 8,
            ..config()
        };
        let (client, fake, _metrics) = setup(cfg);

        let err = client.range_query("{from=\"long\"}", 0, 1, 1).await.unwrap_err();
        assert!(matches!(err, Error::QueryTooLarge { limit: 8, .. }));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn range_query_decodes_streams() {
        let (client, fake, _metrics) = setup(config());
        fake.push_response(
            StatusCode::OK,
            r#"{"status":"success","data":{"resultType":"streams","result":[
                {"stream":{"orgID":"1"},"values":[["1234","{\"ruleUID\":\"abc\"}"]]}
            ]}}"#,
        );

        let res = client.range_query("{orgID=\"1\"}", 0, 2000, 10).await.unwrap();
        assert_eq!(res.data.result.len(), 1);
        let stream = &res.data.result[0];
        assert_eq!(stream.labels["orgID"], "1");
        assert_eq!(stream.values[0].unix_nanos(), Some(1234));
        assert_eq!(stream.values[0].v, r#"{"ruleUID":"abc"}"#);
    }

    #[tokio::test]
    async fn range_query_malformed_body_is_decode_error() {
        let (client, fake, _metrics) = setup(config());
        fake.push_response(
            StatusCode::OK,
            r#"{"data":{"result":[{"stream":{},"values":[{"key":"wrong shape"}]}]}}"#,
        );

        let err = client.range_query("{}", 0, 1, 1).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().contains("failed to deserialize sample"), "{err}");
    }

    // ------------------------------------------------------------------ //
    //  Ping & construction                                                //
    // ------------------------------------------------------------------ //

    #[tokio::test]
    async fn ping_hits_labels_on_read_path() {
        let (client, fake, _metrics) = setup(config());
        fake.push_response(StatusCode::OK, r#"{"status":"success","data":[]}"#);
        fake.push_response(StatusCode::SERVICE_UNAVAILABLE, "");

        client.ping().await.unwrap();
        assert!(matches!(client.ping().await, Err(Error::Status { status: 503, .. })));

        let req = &fake.requests()[0];
        assert_eq!(req.uri.to_string(), "http://loki-read:3100/loki/api/v1/labels");
    }

    #[test]
    fn rejects_malformed_urls() {
        let metrics = HistoryMetrics::new(&Registry::new()).unwrap();
        let cfg = LokiConfig {
            write_path_url: "::not a url".into(),
            ..config()
        };
        let res = LokiClient::with_transport(cfg, FakeRequester::new(), &metrics);
        assert!(matches!(res, Err(Error::InvalidUrl { .. })));
    }
}
