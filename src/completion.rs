//! Chat completion providers used to generate grounded answers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::retry::{RetryPolicy, send_with_retry};
use crate::types::RagError;
use crate::util::join_endpoint;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;

    /// Generates a reply to `user` under the given `system` instructions.
    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiChat {
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RagError::Completion(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError> {
        let endpoint = join_endpoint(&self.base_url, &["chat", "completions"])?;
        let request = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
            }));

        let response = send_with_retry(request, &self.retry, "openai.chat")
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::Completion(format!(
                "chat request failed with status {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| RagError::Completion(err.to_string()))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::Completion("response carried no choices".to_string()))?;

        debug!(model = %self.model, chars = answer.len(), "generated completion");
        Ok(answer)
    }
}

/// Canned completion provider for tests.
///
/// With a fixed reply it returns that reply; in echo mode it returns the
/// full prompt so tests can assert the retrieved context actually reached
/// the model.
pub struct MockCompletionProvider {
    reply: Option<String>,
}

impl MockCompletionProvider {
    /// Echoes the prompt back as the answer.
    pub fn echo() -> Self {
        Self { reply: None }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn model_id(&self) -> &str {
        "mock-completion"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError> {
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Ok(format!("{system}\n{user}")),
        }
    }
}
