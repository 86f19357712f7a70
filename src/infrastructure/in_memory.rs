use crate::domain::checksum::FormPayload;
use crate::domain::ports::HttpTransport;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBody {
    Json(Value),
    Form(FormPayload),
}

/// A request captured by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub body: RecordedBody,
}

impl RecordedRequest {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RecordedBody::Json(value) => Some(value),
            RecordedBody::Form(_) => None,
        }
    }

    pub fn form(&self) -> Option<&FormPayload> {
        match &self.body {
            RecordedBody::Form(form) => Some(form),
            RecordedBody::Json(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum ScriptedReply {
    Json(Value),
    Form(String),
}

/// A transport that answers from a script instead of the network.
///
/// Replies are registered per endpoint (matched as a URL suffix) and each
/// one is consumed by the first request that matches it. Every request is
/// recorded so tests can inspect what would have been sent.
#[derive(Default, Clone)]
pub struct InMemoryTransport {
    replies: Arc<RwLock<Vec<(String, ScriptedReply)>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON reply for the next request to `endpoint`.
    pub async fn reply_json(&self, endpoint: &str, body: Value) {
        self.replies
            .write()
            .await
            .push((endpoint.to_string(), ScriptedReply::Json(body)));
    }

    /// Queues a raw text reply for the next form request to `endpoint`.
    pub async fn reply_form(&self, endpoint: &str, body: impl Into<String>) {
        self.replies
            .write()
            .await
            .push((endpoint.to_string(), ScriptedReply::Form(body.into())));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn requests_to(&self, endpoint: &str) -> Vec<RecordedRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|request| request.url.ends_with(endpoint))
            .cloned()
            .collect()
    }

    async fn record(&self, url: &str, body: RecordedBody) {
        let request = RecordedRequest {
            url: url.to_string(),
            body,
        };
        self.requests.write().await.push(request);
    }

    async fn take_reply(&self, url: &str) -> Result<ScriptedReply> {
        let mut replies = self.replies.write().await;
        let position = replies
            .iter()
            .position(|(endpoint, _)| url.ends_with(endpoint.as_str()));
        let Some(position) = position else {
            let message = format!("no scripted reply for {url}");
            return Err(GatewayError::MalformedResponse(message));
        };
        Ok(replies.remove(position).1)
    }
}

#[async_trait]
impl HttpTransport for InMemoryTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.record(url, RecordedBody::Json(body.clone())).await;
        match self.take_reply(url).await? {
            ScriptedReply::Json(value) => Ok(value),
            ScriptedReply::Form(_) => {
                let message = format!("scripted reply for {url} is not JSON");
                Err(GatewayError::MalformedResponse(message))
            }
        }
    }

    async fn post_form(&self, url: &str, form: &FormPayload) -> Result<String> {
        self.record(url, RecordedBody::Form(form.clone())).await;
        match self.take_reply(url).await? {
            ScriptedReply::Form(text) => Ok(text),
            ScriptedReply::Json(value) => Ok(value.to_string()),
        }
    }
}
