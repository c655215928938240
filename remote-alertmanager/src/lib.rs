//! Client for a multi-tenant remote Alertmanager (Mimir-style).
//!
//! [`RemoteAlertmanager`] is the entry point: it builds the authenticated,
//! traced and timed request chain, exposes the Grafana configuration/state
//! operations of [`MimirClient`], and can wait for the backend to report
//! ready.

pub mod alertmanager;
pub mod auth;
pub mod error;
pub mod mimir;
pub mod models;
pub mod readiness;

pub use alertmanager::{AlertmanagerMetrics, RemoteAlertmanager, RemoteAlertmanagerConfig};
pub use auth::MimirAuth;
pub use error::{Error, Result};
pub use mimir::MimirClient;
pub use readiness::{ProbeState, ReadinessProber};
