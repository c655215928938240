//! Environment-driven configuration.
//!
//! Values come from the process environment (after `.env` is loaded by
//! `dotenvy`). Blank variables count as unset. Passwords are left empty by
//! [`AgentConfig::from_lookup`] and filled in by
//! [`AgentConfig::resolve_passwords`].

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use remote_alertmanager::RemoteAlertmanagerConfig;
use state_history::{EncoderKind, LokiConfig};

use crate::secrets::{optional_secret, SecretsClient};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// 721 hours: thirty days plus one hour of slack.
pub const DEFAULT_MAX_QUERY_LENGTH: Duration = Duration::from_secs(721 * 60 * 60);
pub const DEFAULT_MAX_QUERY_SIZE: usize = 65_536;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub alertmanager: RemoteAlertmanagerConfig,
    /// `None` when neither Loki URL is set.
    pub loki: Option<LokiConfig>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse(&raw, "HTTP_TIMEOUT_SECS")?),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        let alertmanager = RemoteAlertmanagerConfig {
            url: get("ALERTMANAGER_URL").context("ALERTMANAGER_URL must be set")?,
            tenant_id: get("ALERTMANAGER_TENANT_ID"),
            promote_config: match get("ALERTMANAGER_PROMOTE_CONFIG") {
                Some(raw) => parse_bool(&raw, "ALERTMANAGER_PROMOTE_CONFIG")?,
                None => false,
            },
            external_url: get("ALERTMANAGER_EXTERNAL_URL").unwrap_or_default(),
            timeout: Some(timeout),
            ..Default::default()
        };

        let read = get("LOKI_READ_URL");
        let write = get("LOKI_WRITE_URL");
        let loki = match (read, write) {
            (None, None) => None,
            (read, write) => {
                let read_path_url = read.clone().or_else(|| write.clone()).unwrap_or_default();
                let write_path_url = write.or(read).unwrap_or_default();
                Some(LokiConfig {
                    read_path_url,
                    write_path_url,
                    basic_auth_user: get("LOKI_BASIC_AUTH_USER"),
                    basic_auth_password: None,
                    tenant_id: get("LOKI_TENANT_ID"),
                    encoder: match get("LOKI_ENCODER") {
                        Some(raw) => raw
                            .parse::<EncoderKind>()
                            .map_err(|e| anyhow!("LOKI_ENCODER: {e}"))?,
                        None => EncoderKind::default(),
                    },
                    max_query_length: match get("LOKI_MAX_QUERY_LENGTH_SECS") {
                        Some(raw) => {
                            Duration::from_secs(parse(&raw, "LOKI_MAX_QUERY_LENGTH_SECS")?)
                        }
                        None => DEFAULT_MAX_QUERY_LENGTH,
                    },
                    max_query_size: match get("LOKI_MAX_QUERY_SIZE") {
                        Some(raw) => parse(&raw, "LOKI_MAX_QUERY_SIZE")?,
                        None => DEFAULT_MAX_QUERY_SIZE,
                    },
                    timeout: Some(timeout),
                })
            }
        };

        Ok(Self { alertmanager, loki })
    }

    /// Fill in both passwords: Bitwarden first, then `ALERTMANAGER_PASSWORD`
    /// and `LOKI_BASIC_AUTH_PASSWORD`.
    pub async fn resolve_passwords(&mut self, secrets: &SecretsClient) {
        let id = secret_id("BWS_ALERTMANAGER_PASSWORD_ID", "alertmanager-password");
        self.alertmanager.password = optional_secret(secrets, &id, "ALERTMANAGER_PASSWORD").await;

        if let Some(loki) = self.loki.as_mut() {
            let id = secret_id("BWS_LOKI_PASSWORD_ID", "loki-password");
            loki.basic_auth_password =
                optional_secret(secrets, &id, "LOKI_BASIC_AUTH_PASSWORD").await;
        }
    }
}

fn secret_id(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} has an invalid value {raw:?}"))
}

fn parse_bool(raw: &str, key: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(anyhow!("{key} has an invalid boolean value {raw:?}")),
    }
}
