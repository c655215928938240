//! Envelope protocol client for the remote Alertmanager's Grafana API.
//!
//! Every response is wrapped as `{"status":"success","data":...}` or
//! `{"status":"error","error":"..."}`. The `status` field is authoritative: a
//! 2xx response with `status="error"` is still a failure.

use std::sync::Arc;

use bytes::Bytes;
use http::{header, Method, StatusCode};
use http_client::{join_path, OperationName, Requester};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{Receiver, TenantLimits, UserGrafanaConfig, UserGrafanaState};

pub const GRAFANA_CONFIG_PATH: &str = "/api/v1/grafana/config";
pub const GRAFANA_STATE_PATH: &str = "/api/v1/grafana/state";
pub const GRAFANA_RECEIVERS_PATH: &str = "/api/v1/grafana/receivers";
pub const LIMITS_PATH: &str = "/api/v1/limits";

const STATUS_SUCCESS: &str = "success";

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[allow(dead_code)]
    status: String,
    error: String,
}

/// Issues envelope-protocol requests against one base URL.
#[derive(Clone)]
pub struct MimirClient {
    base: Url,
    requester: Arc<dyn Requester>,
}

impl MimirClient {
    pub fn new(base: Url, requester: Arc<dyn Requester>) -> Self {
        Self { base, requester }
    }

    // ------------------------------------------------------------------ //
    //  Grafana Alertmanager configuration                                 //
    // ------------------------------------------------------------------ //

    pub async fn get_grafana_alertmanager_config(&self) -> Result<UserGrafanaConfig> {
        self.get(GRAFANA_CONFIG_PATH, "get_grafana_alertmanager_config").await
    }

    /// Replace the stored configuration with `config`.
    pub async fn create_grafana_alertmanager_config(
        &self,
        config: &UserGrafanaConfig,
    ) -> Result<()> {
        let body = encode(config)?;
        self.do_ok(
            Method::POST,
            GRAFANA_CONFIG_PATH,
            "create_grafana_alertmanager_config",
            body,
        )
        .await
    }

    pub async fn delete_grafana_alertmanager_config(&self) -> Result<()> {
        self.do_ok(
            Method::DELETE,
            GRAFANA_CONFIG_PATH,
            "delete_grafana_alertmanager_config",
            Bytes::new(),
        )
        .await
    }

    // ------------------------------------------------------------------ //
    //  Grafana Alertmanager state                                         //
    // ------------------------------------------------------------------ //

    pub async fn get_grafana_alertmanager_state(&self) -> Result<UserGrafanaState> {
        self.get(GRAFANA_STATE_PATH, "get_grafana_alertmanager_state").await
    }

    /// Replace the stored state snapshot with `state`.
    pub async fn create_grafana_alertmanager_state(&self, state: &str) -> Result<()> {
        let body = encode(&UserGrafanaState {
            state: state.to_string(),
        })?;
        self.do_ok(
            Method::POST,
            GRAFANA_STATE_PATH,
            "create_grafana_alertmanager_state",
            body,
        )
        .await
    }

    pub async fn delete_grafana_alertmanager_state(&self) -> Result<()> {
        self.do_ok(
            Method::DELETE,
            GRAFANA_STATE_PATH,
            "delete_grafana_alertmanager_state",
            Bytes::new(),
        )
        .await
    }

    // ------------------------------------------------------------------ //
    //  Read-only tenant information                                       //
    // ------------------------------------------------------------------ //

    pub async fn get_limits(&self) -> Result<TenantLimits> {
        self.get(LIMITS_PATH, "get_limits").await
    }

    pub async fn get_receivers(&self) -> Result<Vec<Receiver>> {
        self.get(GRAFANA_RECEIVERS_PATH, "get_receivers").await
    }

    // ------------------------------------------------------------------ //
    //  Envelope handling                                                  //
    // ------------------------------------------------------------------ //

    async fn get<T: DeserializeOwned>(&self, path: &str, operation: &'static str) -> Result<T> {
        self.do_request(Method::GET, path, operation, Bytes::new())
            .await?
            .ok_or_else(|| Error::MissingData {
                method: Method::GET,
                path: path.to_string(),
            })
    }

    /// For operations whose success envelope carries no meaningful data.
    async fn do_ok(
        &self,
        method: Method,
        path: &str,
        operation: &'static str,
        body: Bytes,
    ) -> Result<()> {
        self.do_request::<IgnoredAny>(method, path, operation, body).await?;
        Ok(())
    }

    /// Send one request and unwrap the response envelope.
    ///
    /// Returns the `data` member of a success envelope, `None` when absent.
    pub async fn do_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        operation: &'static str,
        body: Bytes,
    ) -> Result<Option<T>> {
        let url = join_path(&self.base, path);
        let mut builder = http::Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json")
            .extension(OperationName(operation));
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let req = builder.body(body)?;

        let resp = self
            .requester
            .execute(req)
            .await
            .map_err(|source| Error::Transport {
                method: method.clone(),
                path: path.to_string(),
                source,
            })?;

        let status = resp.status();
        debug!(%method, path, status = status.as_u16(), "remote Alertmanager response");
        decode_envelope(method, path, status, resp.body())
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Bytes> {
    serde_json::to_vec(payload)
        .map(Bytes::from)
        .map_err(Error::Encode)
}

fn decode_envelope<T: DeserializeOwned>(
    method: Method,
    path: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<Option<T>> {
    if !status.is_success() {
        return match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => Err(Error::Protocol {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                message: envelope.error,
            }),
            Err(source) => Err(Error::Decode {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                source,
            }),
        };
    }

    let envelope: Envelope<T> = serde_json::from_slice(body).map_err(|source| Error::Decode {
        method: method.clone(),
        path: path.to_string(),
        status: status.as_u16(),
        source,
    })?;

    if envelope.status != STATUS_SUCCESS {
        return Err(Error::Protocol {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| format!("unexpected envelope status {:?}", envelope.status)),
        });
    }
    Ok(envelope.data)
}
