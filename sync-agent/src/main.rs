//! Sync agent: checks a tenant's remote Alertmanager and history backend.
//!
//! Waits for the remote Alertmanager to report ready, logs what it holds for
//! the tenant (configuration hash, state size, limits, receivers) and pings
//! the Loki-compatible history backend when one is configured.
//!
//! # Configuration
//! Passwords are resolved via Bitwarden Secrets Manager (when
//! `BWS_ACCESS_TOKEN` is set) or plain environment variables.
//!
//! | Env var                          | Default                |
//! |----------------------------------|------------------------|
//! | `ALERTMANAGER_URL`               | required               |
//! | `ALERTMANAGER_TENANT_ID`         | unset                  |
//! | `ALERTMANAGER_PASSWORD`          | unset                  |
//! | `BWS_ALERTMANAGER_PASSWORD_ID`   | `alertmanager-password`|
//! | `ALERTMANAGER_EXTERNAL_URL`      | empty                  |
//! | `ALERTMANAGER_PROMOTE_CONFIG`    | `false`                |
//! | `LOKI_READ_URL`                  | `LOKI_WRITE_URL`       |
//! | `LOKI_WRITE_URL`                 | `LOKI_READ_URL`        |
//! | `LOKI_TENANT_ID`                 | unset                  |
//! | `LOKI_BASIC_AUTH_USER`           | unset                  |
//! | `LOKI_BASIC_AUTH_PASSWORD`       | unset                  |
//! | `BWS_LOKI_PASSWORD_ID`           | `loki-password`        |
//! | `LOKI_ENCODER`                   | `snappy`               |
//! | `LOKI_MAX_QUERY_LENGTH_SECS`     | `2595600` (721h)       |
//! | `LOKI_MAX_QUERY_SIZE`            | `65536`                |
//! | `HTTP_TIMEOUT_SECS`              | `30`                   |

use anyhow::{Context, Result};
use prometheus::{Encoder as _, Registry, TextEncoder};
use remote_alertmanager::{AlertmanagerMetrics, RemoteAlertmanager};
use state_history::{HistoryMetrics, LokiClient};
use tracing::{debug, info, warn};

use sync_agent::config::AgentConfig;
use sync_agent::secrets::SecretsClient;
use sync_agent::sync;

// ------------------------------------------------------------------ //
//  Entry point                                                        //
// ------------------------------------------------------------------ //

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sync_agent=info".parse()?),
        )
        .json()
        .init();

    let mut cfg = AgentConfig::from_env()?;

    // Passwords: Bitwarden → env fallback.
    cfg.resolve_passwords(&SecretsClient::from_env()).await;

    let registry = Registry::new();

    // ---------------------------------------------------------------- //
    //  Remote Alertmanager                                             //
    // ---------------------------------------------------------------- //

    let am_metrics = AlertmanagerMetrics::new(&registry)?;
    let am = RemoteAlertmanager::new(cfg.alertmanager, &am_metrics)
        .context("building remote Alertmanager client")?;

    am.is_ready_with_backoff()
        .await
        .with_context(|| format!("remote Alertmanager at {} is not ready", am.url()))?;
    info!(url = %am.url(), "remote Alertmanager is ready");

    sync::report(&am).await?.log();

    // ---------------------------------------------------------------- //
    //  History backend                                                 //
    // ---------------------------------------------------------------- //

    match cfg.loki {
        Some(loki_cfg) => {
            let history_metrics = HistoryMetrics::new(&registry)?;
            let loki = LokiClient::new(loki_cfg, &history_metrics)
                .context("building Loki client")?;
            match loki.ping().await {
                Ok(()) => info!("history backend is reachable"),
                Err(e) => warn!(error = %e, "history backend ping failed"),
            }
        }
        None => info!("no history backend configured"),
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    debug!(metrics = %String::from_utf8_lossy(&buf), "request metrics");

    Ok(())
}
