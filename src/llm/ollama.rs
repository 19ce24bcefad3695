//! Local Ollama backend.
//!
//! When the daemon answers 404 the model has not been downloaded yet. The
//! generator asks the daemon to pull it and reports [`AskError::ModelMissing`];
//! the question itself is not sent again.

use super::{GeneratorConfig, QueryGenerator, chat_messages, error_message, join_url, post_json};
use crate::error::{AskError, AskResult};
use crate::prompt::PromptTemplate;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

const BACKEND: &str = "Ollama";

pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Backend for a model served by a local Ollama daemon.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    config: GeneratorConfig,
    host: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            config: GeneratorConfig::new(model),
            host: DEFAULT_HOST.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.config.prompt = prompt;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn request_body(&self, schema_text: &str, nl_query: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": chat_messages(&self.config, schema_text, nl_query),
            "stream": false,
        })
    }

    /// Ask the daemon to download the model. Blocks until the pull finishes.
    async fn pull_model(&self, client: &reqwest::Client) -> bool {
        let url = join_url(&self.host, "api/pull");
        let body = json!({ "model": self.config.model, "stream": false });
        tracing::warn!(model = %self.config.model, "model not found locally, pulling");

        match post_json(BACKEND, client.post(&url), &body).await {
            Ok((status, _)) if status.is_success() => true,
            Ok((status, body)) => {
                tracing::error!(%status, error = %error_message(&body), "model pull failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "model pull failed");
                false
            }
        }
    }
}

impl Default for OllamaGenerator {
    fn default() -> Self {
        Self::new("llama3.2:latest")
    }
}

#[async_trait]
impl QueryGenerator for OllamaGenerator {
    async fn generate_sql_from_nl(&self, schema_text: &str, nl_query: &str) -> AskResult<String> {
        let url = join_url(&self.host, "api/chat");
        tracing::debug!(model = %self.config.model, %url, "sending request to Ollama");

        let client = reqwest::Client::new();
        let (status, body) = post_json(BACKEND, client.post(&url), &self.request_body(schema_text, nl_query)).await?;

        if status == StatusCode::NOT_FOUND {
            tracing::error!(error = %error_message(&body), code = status.as_u16(), "Ollama error");
            let pulled = self.pull_model(&client).await;
            return Err(AskError::ModelMissing {
                model: self.config.model.clone(),
                pulled,
            });
        }
        if !status.is_success() {
            let err = AskError::llm(BACKEND, format!("{}: {}", status, error_message(&body)));
            tracing::error!(error = %err, "Ollama error");
            return Err(err);
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AskError::llm(BACKEND, format!("Failed to parse response: {}", e)))?;
        Ok(parsed.message.content)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
