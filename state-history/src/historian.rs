//! Best-effort shipping of rule evaluation records.
//!
//! Each evaluation becomes one stream with one sample. Failures are logged and
//! counted but never returned: losing history must not fail an evaluation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prometheus::IntCounterVec;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::loki::LokiClient;
use crate::metrics::HistoryMetrics;
use crate::stream::{Sample, Stream};

pub const HISTORY_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
pub const SCHEMA_VERSION: u32 = 1;

pub const FROM_LABEL: &str = "from";
pub const FROM_VALUE: &str = "evaluation-history";
pub const ORG_ID_LABEL: &str = "orgID";
pub const GROUP_LABEL: &str = "group";
pub const FOLDER_UID_LABEL: &str = "folderUID";

// ------------------------------------------------------------------ //
//  Input                                                              //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub org_id: i64,
    pub namespace_uid: String,
    pub rule_group: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Success,
    Failure,
}

/// Outcome of one rule evaluation, produced by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub group_key: GroupKey,
    pub rule_uid: String,
    pub rule_version: i64,
    pub rule_fingerprint: String,
    pub attempt: i64,
    pub status: EvaluationStatus,
    pub error: Option<String>,
    pub duration: Duration,
    /// Scheduler tick that triggered the evaluation; used as the sample time.
    pub tick: DateTime<Utc>,
    pub evaluation_time: DateTime<Utc>,
}

/// JSON line stored for each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub schema_version: u32,
    #[serde(rename = "ruleUID")]
    pub rule_uid: String,
    pub version: String,
    /// Unix seconds.
    pub evaluation_time: i64,
    pub fingerprint: String,
    pub attempt: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds.
    pub duration: i64,
    pub status: EvaluationStatus,
}

impl From<&Record> for Entry {
    fn from(rec: &Record) -> Self {
        Entry {
            schema_version: SCHEMA_VERSION,
            rule_uid: rec.rule_uid.clone(),
            version: rec.rule_version.to_string(),
            evaluation_time: rec.evaluation_time.timestamp(),
            fingerprint: rec.rule_fingerprint.clone(),
            attempt: rec.attempt,
            error: rec.error.clone().filter(|e| !e.is_empty()),
            duration: i64::try_from(rec.duration.as_millis()).unwrap_or(i64::MAX),
            status: rec.status,
        }
    }
}

// ------------------------------------------------------------------ //
//  Historian                                                          //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone)]
pub struct HistorianConfig {
    /// Labels added to every stream, e.g. `cluster` or `env`. The historian's
    /// own labels win on collision.
    pub external_labels: BTreeMap<String, String>,
    pub write_timeout: Duration,
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            external_labels: BTreeMap::new(),
            write_timeout: HISTORY_WRITE_TIMEOUT,
        }
    }
}

/// Cheap to clone; clones share the client and counters.
#[derive(Clone)]
pub struct Historian {
    client: Arc<LokiClient>,
    external_labels: Arc<BTreeMap<String, String>>,
    write_timeout: Duration,
    writes_total: IntCounterVec,
    writes_failed: IntCounterVec,
}

impl Historian {
    pub fn new(client: Arc<LokiClient>, cfg: HistorianConfig, metrics: &HistoryMetrics) -> Self {
        Self {
            client,
            external_labels: Arc::new(cfg.external_labels),
            write_timeout: cfg.write_timeout,
            writes_total: metrics.writes_total.clone(),
            writes_failed: metrics.writes_failed.clone(),
        }
    }

    /// Build the single stream written for `rec`.
    pub fn prepare_stream(&self, rec: &Record) -> Result<Stream, serde_json::Error> {
        let mut labels = (*self.external_labels).clone();
        labels.insert(FROM_LABEL.to_string(), FROM_VALUE.to_string());
        labels.insert(ORG_ID_LABEL.to_string(), rec.group_key.org_id.to_string());
        labels.insert(GROUP_LABEL.to_string(), rec.group_key.rule_group.clone());
        labels.insert(FOLDER_UID_LABEL.to_string(), rec.group_key.namespace_uid.clone());

        let line = serde_json::to_string(&Entry::from(rec))?;
        Ok(Stream {
            labels,
            values: vec![Sample { t: rec.tick, v: line }],
        })
    }

    /// Write `rec` to the log backend, waiting at most the write timeout.
    pub async fn record(&self, rec: &Record) {
        let stream = match self.prepare_stream(rec) {
            Ok(stream) => stream,
            Err(e) => {
                error!(
                    rule_uid = %rec.rule_uid,
                    error = %e,
                    "failed to encode evaluation history entry"
                );
                return;
            }
        };

        let org = rec.group_key.org_id.to_string();
        self.writes_total.with_label_values(&[org.as_str()]).inc();

        let outcome = tokio::time::timeout(self.write_timeout, self.client.push(&[stream])).await;
        let err = match outcome {
            Ok(Ok(())) => {
                debug!(rule_uid = %rec.rule_uid, "saved evaluation history");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.write_timeout),
        };

        self.writes_failed.with_label_values(&[org.as_str()]).inc();
        error!(
            org_id = rec.group_key.org_id,
            rule_uid = %rec.rule_uid,
            error = %err,
            "failed to save evaluation history"
        );
    }

    /// Like [`Historian::record`] but on a detached task, so the caller never waits.
    pub fn spawn_record(&self, rec: Record) -> JoinHandle<()> {
        let historian = self.clone();
        tokio::spawn(async move { historian.record(&rec).await })
    }
}
