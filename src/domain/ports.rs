use super::checksum::FormPayload;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The HTTP seam between the gateways and the provider.
///
/// Implementations surface network failures and non-2xx statuses as
/// errors; they do not interpret provider result codes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POSTs a JSON body and returns the decoded JSON response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;

    /// POSTs a form-encoded body and returns the raw response text.
    async fn post_form(&self, url: &str, form: &FormPayload) -> Result<String>;
}

pub type TransportHandle = Arc<dyn HttpTransport>;
