use crate::domain::checksum::FormPayload;
use crate::domain::ports::HttpTransport;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The production transport, backed by a shared `reqwest::Client`.
///
/// `Clone` shares the client's connection pool. No timeout or retry
/// policy is configured; callers that need one can pass a tuned client to
/// [`ReqwestTransport::with_client`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_form(&self, url: &str, form: &FormPayload) -> Result<String> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}
