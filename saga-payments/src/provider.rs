//! Payment service provider adapter contract (`spec.md` §6): stateless,
//! free of business logic, and the only place that talks to the outside
//! world on behalf of the state machine.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProviderError;

pub struct ProviderRequest {
    pub amount_minor: i64,
    pub currency_code: String,
    pub reference: String,
    pub method: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResult {
    pub ok: bool,
    pub external_ref: Option<String>,
    pub failure_code: Option<String>,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub requires_action: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn authorize(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError>;
    async fn capture(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError>;
    async fn refund(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError>;
}

/// Always succeeds with a deterministic-looking reference. Used in tests and
/// in local/demo deployments with no real PSP configured.
pub struct StubProviderAdapter;

#[async_trait]
impl ProviderAdapter for StubProviderAdapter {
    async fn authorize(&self, _request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        Ok(ProviderResult {
            ok: true,
            external_ref: Some(format!("stub-auth-{}", Uuid::new_v4())),
            ..Default::default()
        })
    }

    async fn capture(&self, _request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        Ok(ProviderResult {
            ok: true,
            external_ref: Some(format!("stub-cap-{}", Uuid::new_v4())),
            ..Default::default()
        })
    }

    async fn refund(&self, _request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        Ok(ProviderResult {
            ok: true,
            external_ref: Some(format!("stub-refund-{}", Uuid::new_v4())),
            ..Default::default()
        })
    }
}

#[derive(Serialize)]
struct ProviderRequestBody<'a> {
    amount_minor: i64,
    currency_code: &'a str,
    reference: &'a str,
    method: Option<&'a str>,
    idempotency_key: &'a str,
}

/// Calls a PSP-fronting HTTP service. Adapters are stateless; every method
/// is a single POST with the full request in the body and the caller's
/// idempotency key echoed so the remote side can dedup retries too.
pub struct HttpProviderAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderAdapter {
    pub fn new(base_url: impl Into<String>, read_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(read_timeout)
            .build()
            .expect("reqwest client config is static and always valid");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn post(&self, path: &str, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        let body = ProviderRequestBody {
            amount_minor: request.amount_minor,
            currency_code: &request.currency_code,
            reference: &request.reference,
            method: request.method.as_deref(),
            idempotency_key: &request.idempotency_key,
        };

        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|error| ProviderError::Transport(error.into()))?;

        response
            .json::<ProviderResult>()
            .await
            .map_err(|error| ProviderError::Malformed(error.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    async fn authorize(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        self.post("/authorize", request).await
    }

    async fn capture(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        self.post("/capture", request).await
    }

    async fn refund(&self, request: ProviderRequest) -> Result<ProviderResult, ProviderError> {
        self.post("/refund", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_adapter_always_succeeds() {
        let adapter = StubProviderAdapter;
        let request = ProviderRequest {
            amount_minor: 1000,
            currency_code: "USD".to_string(),
            reference: "order-1".to_string(),
            method: None,
            idempotency_key: "key-1".to_string(),
        };
        let result = adapter.authorize(request).await.unwrap();
        assert!(result.ok);
        assert!(result.external_ref.is_some());
    }
}
