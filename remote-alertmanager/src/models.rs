//! JSON bodies exchanged with the remote Alertmanager's Grafana endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ------------------------------------------------------------------ //
//  Configuration                                                      //
// ------------------------------------------------------------------ //

/// Grafana's Alertmanager configuration. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GrafanaAlertmanagerConfig {
    #[serde(default)]
    pub template_files: BTreeMap<String, String>,
    /// Routing tree, receivers and inhibition rules. Opaque to this client.
    #[serde(default)]
    pub alertmanager_config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<PostableApiTemplate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PostableApiTemplate {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub kind: TemplateKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Grafana,
    Mimir,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub ehlo_identity: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub start_tls_policy: String,
    #[serde(default)]
    pub static_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub user: String,
}

/// The envelope the backend stores per tenant around a [`GrafanaAlertmanagerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserGrafanaConfig {
    #[serde(rename = "configuration")]
    pub grafana_alertmanager_config: GrafanaAlertmanagerConfig,
    #[serde(rename = "configuration_hash")]
    pub hash: String,
    /// Unix seconds.
    #[serde(rename = "created")]
    pub created_at: i64,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub promoted: bool,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub smtp_config: SmtpConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_headers: BTreeMap<String, String>,
}

/// Hex SHA-256 of the configuration's JSON form.
///
/// Map keys serialize in sorted order, so equal configurations hash equally.
pub fn config_hash(config: &GrafanaAlertmanagerConfig) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(config)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

// ------------------------------------------------------------------ //
//  State                                                              //
// ------------------------------------------------------------------ //

/// Opaque serialized silences + notification log snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserGrafanaState {
    pub state: String,
}

// ------------------------------------------------------------------ //
//  Limits                                                             //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TenantLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silences: Option<SilenceLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<TemplateLimits>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SilenceLimits {
    pub max_count: i64,
    pub max_size_bytes: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TemplateLimits {
    pub max_count: i64,
    pub max_size_bytes: i64,
}

// ------------------------------------------------------------------ //
//  Receivers                                                          //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Receiver {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

/// Delivery status of one notifier inside a receiver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Integration {
    pub name: String,
    #[serde(default)]
    pub send_resolved: bool,
    #[serde(default)]
    pub last_notify_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_notify_attempt_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notify_attempt_error: Option<String>,
}
