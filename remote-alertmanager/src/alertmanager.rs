//! The remote Alertmanager facade.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http_client::{
    duration_histogram, join_path, ReqwestTransport, Requester, TimedClient, TracedClient,
};
use prometheus::{HistogramVec, Registry};
use tracing::info;
use url::Url;

use crate::auth::MimirAuth;
use crate::error::{Error, Result};
use crate::mimir::MimirClient;
use crate::models::{
    config_hash, GrafanaAlertmanagerConfig, Receiver, SmtpConfig, TenantLimits,
    UserGrafanaConfig, UserGrafanaState,
};
use crate::readiness::{ReadinessProber, READY_PATH};

// ------------------------------------------------------------------ //
//  Configuration & metrics                                            //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Default)]
pub struct RemoteAlertmanagerConfig {
    /// Base URL of the remote backend, e.g. `http://mimir:8080`.
    pub url: String,
    pub tenant_id: Option<String>,
    pub password: Option<String>,
    /// Marks uploaded configurations as promoted (actively used for routing).
    pub promote_config: bool,
    /// Grafana's public URL, used by the backend to render links.
    pub external_url: String,
    pub smtp: SmtpConfig,
    pub static_headers: BTreeMap<String, String>,
    /// Per-request timeout of the underlying transport.
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct AlertmanagerMetrics {
    pub request_latency: HistogramVec,
}

impl AlertmanagerMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let request_latency = duration_histogram(
            "remote_alertmanager_request_duration_seconds",
            "Histogram of requests to the remote Alertmanager.",
        )?;
        registry.register(Box::new(request_latency.clone()))?;
        Ok(Self { request_latency })
    }
}

// ------------------------------------------------------------------ //
//  Facade                                                             //
// ------------------------------------------------------------------ //

/// Remote Alertmanager client.
///
/// Requests pass through `TimedClient -> TracedClient -> MimirAuth -> transport`,
/// so auth headers are added closest to the wire and every failure is timed.
pub struct RemoteAlertmanager {
    url: Url,
    tenant_id: Option<String>,
    client: Arc<dyn Requester>,
    mimir: MimirClient,
    promote_config: bool,
    external_url: String,
    smtp: SmtpConfig,
    static_headers: BTreeMap<String, String>,
}

impl RemoteAlertmanager {
    pub fn new(cfg: RemoteAlertmanagerConfig, metrics: &AlertmanagerMetrics) -> Result<Self> {
        let transport = match cfg.timeout {
            Some(timeout) => ReqwestTransport::with_timeout(timeout).map_err(Error::Client)?,
            None => ReqwestTransport::new(),
        };
        Self::with_transport(cfg, transport, metrics)
    }

    /// Build the facade on top of an arbitrary wire-level executor.
    pub fn with_transport<R>(
        cfg: RemoteAlertmanagerConfig,
        transport: R,
        metrics: &AlertmanagerMetrics,
    ) -> Result<Self>
    where
        R: Requester + 'static,
    {
        let url = parse_base_url(&cfg.url)?;
        let auth = MimirAuth::new(transport, cfg.tenant_id.as_deref(), cfg.password.as_deref())?;
        let client: Arc<dyn Requester> = Arc::new(TimedClient::new(
            TracedClient::new(auth, "remote-alertmanager"),
            metrics.request_latency.clone(),
        ));
        let mimir = MimirClient::new(url.clone(), client.clone());

        info!(
            url = %url,
            tenant = cfg.tenant_id.as_deref().unwrap_or(""),
            "remote Alertmanager client configured"
        );

        Ok(Self {
            url,
            tenant_id: cfg.tenant_id,
            client,
            mimir,
            promote_config: cfg.promote_config,
            external_url: cfg.external_url,
            smtp: cfg.smtp,
            static_headers: cfg.static_headers,
        })
    }

    /// The fully decorated executor, for callers issuing their own requests.
    pub fn authed_client(&self) -> Arc<dyn Requester> {
        self.client.clone()
    }

    pub fn mimir(&self) -> &MimirClient {
        &self.mimir
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Wait for `/alertmanager/-/ready` to return 200.
    ///
    /// Fails at once on a 4xx and after ten seconds otherwise.
    pub async fn is_ready_with_backoff(&self) -> Result<()> {
        let prober = ReadinessProber::new(self.client.clone(), join_path(&self.url, READY_PATH));
        prober.run().await.into_result()
    }

    // ------------------------------------------------------------------ //
    //  Configuration & state                                              //
    // ------------------------------------------------------------------ //

    pub async fn get_grafana_alertmanager_config(&self) -> Result<UserGrafanaConfig> {
        self.mimir.get_grafana_alertmanager_config().await
    }

    /// Upload `config` as the tenant's complete configuration.
    ///
    /// The hash, promotion flag, external URL and SMTP settings are filled in
    /// from this client's configuration.
    pub async fn create_grafana_alertmanager_config(
        &self,
        config: &GrafanaAlertmanagerConfig,
        created_at: i64,
        is_default: bool,
    ) -> Result<()> {
        let payload = UserGrafanaConfig {
            grafana_alertmanager_config: config.clone(),
            hash: config_hash(config).map_err(Error::Encode)?,
            created_at,
            default: is_default,
            promoted: self.promote_config,
            external_url: self.external_url.clone(),
            smtp_config: self.smtp.clone(),
            static_headers: self.static_headers.clone(),
        };
        self.mimir.create_grafana_alertmanager_config(&payload).await
    }

    pub async fn delete_grafana_alertmanager_config(&self) -> Result<()> {
        self.mimir.delete_grafana_alertmanager_config().await
    }

    pub async fn get_grafana_alertmanager_state(&self) -> Result<UserGrafanaState> {
        self.mimir.get_grafana_alertmanager_state().await
    }

    pub async fn create_grafana_alertmanager_state(&self, state: &str) -> Result<()> {
        self.mimir.create_grafana_alertmanager_state(state).await
    }

    pub async fn delete_grafana_alertmanager_state(&self) -> Result<()> {
        self.mimir.delete_grafana_alertmanager_state().await
    }

    pub async fn get_limits(&self) -> Result<TenantLimits> {
        self.mimir.get_limits().await
    }

    pub async fn get_receivers(&self) -> Result<Vec<Receiver>> {
        self.mimir.get_receivers().await
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
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
    use bytes::Bytes;
    use http::StatusCode;
    use http_client::FakeRequester;
    use serde_json::json;

    fn setup(cfg: RemoteAlertmanagerConfig) -> (RemoteAlertmanager, FakeRequester, Registry) {
        let registry = Registry::new();
        let metrics = AlertmanagerMetrics::new(&registry).unwrap();
        let fake = FakeRequester::new();
        let am = RemoteAlertmanager::with_transport(cfg, fake.clone(), &metrics).unwrap();
        (am, fake, registry)
    }

    fn base_cfg() -> RemoteAlertmanagerConfig {
        RemoteAlertmanagerConfig {
            url: "http://mimir:8080".into(),
            tenant_id: Some("tenant-1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_malformed_base_url() {
        let registry = Registry::new();
        let metrics = AlertmanagerMetrics::new(&registry).unwrap();
        for url in ["not a url", "mailto:ops@example.com", "ftp://mimir"] {
            let cfg = RemoteAlertmanagerConfig {
                url: url.into(),
                ..Default::default()
            };
            let res = RemoteAlertmanager::with_transport(cfg, FakeRequester::new(), &metrics);
            assert!(matches!(res, Err(Error::InvalidUrl { .. })), "{url}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_uses_authed_chain_and_ready_path() {
        let (am, fake, registry) = setup(base_cfg());
        fake.push_response(StatusCode::SERVICE_UNAVAILABLE, "");
        fake.push_response(StatusCode::OK, "");

        am.is_ready_with_backoff().await.unwrap();

        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].uri.path(), "/alertmanager/-/ready");
        assert_eq!(requests[0].header("X-Scope-OrgID"), Some("tenant-1"));

        let families = registry.gather();
        let latency = families
            .iter()
            .find(|f| f.get_name() == "remote_alertmanager_request_duration_seconds")
            .unwrap();
        assert_eq!(latency.get_metric().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_reports_unauthorized_without_retrying() {
        let (am, fake, _registry) = setup(base_cfg());
        fake.push_response(StatusCode::UNAUTHORIZED, "");

        let err = am.is_ready_with_backoff().await.unwrap_err();
        assert!(matches!(err, Error::NotReady(401)));
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn create_config_fills_envelope_from_client_settings() {
        let cfg = RemoteAlertmanagerConfig {
            promote_config: true,
            external_url: "https://grafana.example".into(),
            password: Some("s3cret".into()),
            ..base_cfg()
        };
        let (am, fake, _registry) = setup(cfg);
        fake.push_response(StatusCode::CREATED, r#"{"status":"success"}"#);

        let config = GrafanaAlertmanagerConfig {
            alertmanager_config: json!({"route": {"receiver": "email"}}),
            ..Default::default()
        };
        am.create_grafana_alertmanager_config(&config, 1_700_000_000, false)
            .await
            .unwrap();

        let req = &fake.requests()[0];
        assert_eq!(req.uri.path(), "/api/v1/grafana/config");
        assert!(req.header("authorization").unwrap().starts_with("Basic "));
        assert_eq!(req.header("X-Scope-OrgID"), None);

        let body: UserGrafanaConfig = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body.hash, config_hash(&config).unwrap());
        assert_eq!(body.created_at, 1_700_000_000);
        assert!(body.promoted);
        assert!(!body.default);
        assert_eq!(body.external_url, "https://grafana.example");
        assert_eq!(body.grafana_alertmanager_config, config);
    }

    #[tokio::test]
    async fn authed_client_injects_credentials() {
        let (am, fake, _registry) = setup(base_cfg());

        let req = http::Request::get("http://mimir:8080/alertmanager/api/v2/status")
            .body(Bytes::new())
            .unwrap();
        am.authed_client().execute(req).await.unwrap();

        assert_eq!(fake.requests()[0].header("X-Scope-OrgID"), Some("tenant-1"));
    }
}
