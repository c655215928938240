//! One-shot consistency check against the remote Alertmanager.

use anyhow::{Context, Result};
use remote_alertmanager::models::TenantLimits;
use remote_alertmanager::{Error, RemoteAlertmanager};
use tracing::info;

/// What the remote side currently holds for this tenant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// `None` when the tenant has no stored configuration.
    pub config_hash: Option<String>,
    pub config_promoted: bool,
    /// Length of the stored state blob, `None` when there is none.
    pub state_bytes: Option<usize>,
    pub limits: TenantLimits,
    pub receivers: usize,
    pub active_receivers: usize,
}

impl SyncReport {
    pub fn log(&self) {
        info!(
            config_hash = self.config_hash.as_deref().unwrap_or("<none>"),
            promoted = self.config_promoted,
            state_bytes = self.state_bytes.unwrap_or(0),
            max_silences = self.limits.silences.as_ref().map(|l| l.max_count).unwrap_or(0),
            max_templates = self.limits.templates.as_ref().map(|l| l.max_count).unwrap_or(0),
            receivers = self.receivers,
            active_receivers = self.active_receivers,
            "remote Alertmanager sync report"
        );
    }
}

pub async fn report(am: &RemoteAlertmanager) -> Result<SyncReport> {
    let config = absent_on_404(am.get_grafana_alertmanager_config().await)
        .context("fetching Grafana Alertmanager configuration")?;
    let state = absent_on_404(am.get_grafana_alertmanager_state().await)
        .context("fetching Grafana Alertmanager state")?;
    let limits = am.get_limits().await.context("fetching tenant limits")?;
    let receivers = am.get_receivers().await.context("fetching receivers")?;

    Ok(SyncReport {
        config_promoted: config.as_ref().map(|c| c.promoted).unwrap_or(false),
        config_hash: config.map(|c| c.hash),
        state_bytes: state.map(|s| s.state.len()),
        limits,
        active_receivers: receivers.iter().filter(|r| r.active).count(),
        receivers: receivers.len(),
    })
}

fn absent_on_404<T>(res: remote_alertmanager::Result<T>) -> remote_alertmanager::Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(Error::Protocol { status: 404, .. } | Error::Decode { status: 404, .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
