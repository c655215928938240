//! Bitwarden Secrets Manager lookup for credentials.
//!
//! Secrets are fetched with the machine-account token in `BWS_ACCESS_TOKEN`.
//! Without a token, or when Bitwarden fails, the named environment variable
//! is used instead so local runs need no Bitwarden account.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION};
use http::Method;
use http_client::{OperationName, ReqwestTransport, Requester};
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://api.bitwarden.com";

pub struct SecretsClient {
    access_token: Option<String>,
    api_url: String,
    requester: Arc<dyn Requester>,
}

#[derive(Deserialize)]
struct BwsSecretResponse {
    value: String,
}

impl SecretsClient {
    /// Reads `BWS_ACCESS_TOKEN` and `BWS_API_URL` from the environment.
    pub fn from_env() -> Self {
        Self::with_requester(
            std::env::var("BWS_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
            std::env::var("BWS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            Arc::new(ReqwestTransport::new()),
        )
    }

    pub fn with_requester(
        access_token: Option<String>,
        api_url: impl Into<String>,
        requester: Arc<dyn Requester>,
    ) -> Self {
        Self {
            access_token,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            requester,
        }
    }

    /// Resolve a secret: Bitwarden first, then the `env_fallback` variable.
    pub async fn get_secret(&self, secret_id: &str, env_fallback: &str) -> Result<String> {
        if let Some(token) = &self.access_token {
            match self.fetch_from_bitwarden(token, secret_id).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        secret_id,
                        error = %e,
                        "failed to fetch secret from Bitwarden, falling back to env var"
                    );
                }
            }
        }

        std::env::var(env_fallback).with_context(|| {
            format!(
                "secret '{secret_id}' not found in Bitwarden and env var '{env_fallback}' \
                 is not set"
            )
        })
    }

    async fn fetch_from_bitwarden(&self, token: &str, secret_id: &str) -> Result<String> {
        let mut req = http::Request::builder()
            .method(Method::GET)
            .uri(format!("{}/secrets/{}", self.api_url, secret_id))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .body(Bytes::new())?;
        req.extensions_mut().insert(OperationName("bitwarden.get_secret"));

        let resp = self
            .requester
            .execute(req)
            .await
            .context("request to Bitwarden Secrets Manager failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Bitwarden API returned status {}", resp.status()));
        }

        let body: BwsSecretResponse =
            serde_json::from_slice(resp.body()).context("failed to parse Bitwarden response")?;
        Ok(body.value)
    }
}

/// Resolve an optional secret, returning `None` when neither source has it.
pub async fn optional_secret(
    client: &SecretsClient,
    secret_id: &str,
    env_fallback: &str,
) -> Option<String> {
    client
        .get_secret(secret_id, env_fallback)
        .await
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_client::FakeRequester;

    fn client(token: Option<&str>, fake: &FakeRequester) -> SecretsClient {
        SecretsClient::with_requester(
            token.map(str::to_string),
            "https://vault.example.com/",
            Arc::new(fake.clone()),
        )
    }

    #[tokio::test]
    async fn fetches_from_bitwarden_with_bearer_token() {
        let fake = FakeRequester::new();
        fake.push_response(StatusCode::OK, r#"{"id":"abc","value":"s3cret"}"#);

        let value = client(Some("tok"), &fake)
            .get_secret("abc", "SYNC_AGENT_TEST_UNSET_1")
            .await
            .unwrap();
        assert_eq!(value, "s3cret");

        let reqs = fake.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].uri, "https://vault.example.com/secrets/abc");
        assert_eq!(reqs[0].header("authorization"), Some("Bearer tok"));
        assert_eq!(reqs[0].operation, Some("bitwarden.get_secret"));
    }

    #[tokio::test]
    async fn falls_back_to_env_when_bitwarden_fails() {
        std::env::set_var("SYNC_AGENT_TEST_FALLBACK_2", "from-env");
        let fake = FakeRequester::new();
        fake.push_response(StatusCode::FORBIDDEN, "");

        let value = client(Some("tok"), &fake)
            .get_secret("abc", "SYNC_AGENT_TEST_FALLBACK_2")
            .await
            .unwrap();
        assert_eq!(value, "from-env");
    }

    #[tokio::test]
    async fn skips_bitwarden_without_token() {
        std::env::set_var("SYNC_AGENT_TEST_FALLBACK_3", "local");
        let fake = FakeRequester::new();

        let value = client(None, &fake)
            .get_secret("abc", "SYNC_AGENT_TEST_FALLBACK_3")
            .await
            .unwrap();
        assert_eq!(value, "local");
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_everywhere_is_an_error() {
        let fake = FakeRequester::new();
        fake.push_transport_error("connection refused");

        let c = client(Some("tok"), &fake);
        let err = c.get_secret("abc", "SYNC_AGENT_TEST_UNSET_4").await.unwrap_err();
        assert!(err.to_string().contains("SYNC_AGENT_TEST_UNSET_4"));
        assert_eq!(optional_secret(&c, "abc", "SYNC_AGENT_TEST_UNSET_4").await, None);
    }
}
