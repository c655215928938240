//! Tenant authentication for the remote Alertmanager.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http_client::{Request, Requester, Response, TransportError};

pub const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Injects tenant credentials into every request before handing it to the
/// wrapped transport.
///
/// With a tenant and a password the request carries HTTP Basic credentials
/// (`tenant:password`) and no tenant header. With only a tenant it carries
/// `X-Scope-OrgID`. With neither it is left untouched.
pub struct MimirAuth<R> {
    inner: R,
    header: Option<(HeaderName, HeaderValue)>,
}

impl<R> MimirAuth<R> {
    pub fn new(
        inner: R,
        tenant_id: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, http::header::InvalidHeaderValue> {
        let tenant_id = tenant_id.filter(|s| !s.is_empty());
        let password = password.filter(|s| !s.is_empty());

        let header = match (tenant_id, password) {
            (Some(tenant), Some(password)) => {
                let encoded = STANDARD.encode(format!("{tenant}:{password}"));
                let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
                value.set_sensitive(true);
                Some((AUTHORIZATION, value))
            }
            (Some(tenant), None) => Some((
                HeaderName::from_static("x-scope-orgid"),
                HeaderValue::from_str(tenant)?,
            )),
            _ => None,
        };

        Ok(Self { inner, header })
    }
}

#[async_trait]
impl<R: Requester> Requester for MimirAuth<R> {
    async fn execute(&self, mut req: Request) -> Result<Response, TransportError> {
        if let Some((name, value)) = &self.header {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.execute(req).await
    }
}
