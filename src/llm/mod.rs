//! Query generators: natural language + schema in, SQL text out.
//!
//! Every backend implements [`QueryGenerator`] and builds its request from
//! the same [`PromptTemplate`], so switching backends changes where the
//! prompt is sent, never what it says.

use crate::error::{AskError, AskResult};
use crate::prompt::PromptTemplate;

use async_trait::async_trait;
use serde::Serialize;

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use gemini::GeminiGenerator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;
pub use registry::ModelRegistry;

/// Turns a question about a database into SQL text.
///
/// The returned text is whatever the backend produced. It is not parsed or
/// validated, and may not be legal SQL.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generate SQL for `nl_query` against the schema described by
    /// `schema_text`.
    async fn generate_sql_from_nl(&self, schema_text: &str, nl_query: &str) -> AskResult<String>;

    /// Short backend name, used in errors and logs.
    fn backend(&self) -> &'static str;

    /// Immutable model and prompt configuration.
    fn config(&self) -> &GeneratorConfig;

    /// Model identifier sent to the backend.
    fn model(&self) -> &str {
        &self.config().model
    }
}

/// Model identifier plus prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub model: String,
    pub prompt: PromptTemplate,
}

impl GeneratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: PromptTemplate::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }
}

/// One chat turn in the role/content shape most backends accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The system and user messages for a question.
pub fn chat_messages(config: &GeneratorConfig, schema_text: &str, nl_query: &str) -> [ChatMessage; 2] {
    [
        ChatMessage {
            role: "system",
            content: config.prompt.system.clone(),
        },
        ChatMessage {
            role: "user",
            content: config.prompt.render_user(schema_text, nl_query),
        },
    ]
}

/// Resolve an API key: an explicit key wins, otherwise the environment
/// variable is read at call time.
pub(crate) fn api_key(backend: &'static str, explicit: Option<&str>, env_var: &str) -> AskResult<String> {
    if let Some(key) = explicit {
        return Ok(key.to_string());
    }
    std::env::var(env_var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AskError::llm(backend, format!("{} environment variable not set", env_var)))
}

/// POST a JSON body and return the status and raw response text.
///
/// A new client is built for each call; nothing is pooled between requests.
pub(crate) async fn post_json(
    backend: &'static str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> AskResult<(reqwest::StatusCode, String)> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| AskError::llm(backend, e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AskError::llm(backend, format!("Failed to read response: {}", e)))?;
    Ok((status, text))
}

/// Pull a readable message out of an error body.
///
/// Handles `{"error": "..."}` and `{"error": {"message": "..."}}`, falling
/// back to the raw body.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let err = v.get("error")?;
        err.as_str()
            .or_else(|| err.get("message").and_then(|m| m.as_str()))
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
