//! OpenAI chat completions backend.

use super::{GeneratorConfig, QueryGenerator, api_key, chat_messages, error_message, join_url, post_json};
use crate::error::{AskError, AskResult};
use crate::prompt::PromptTemplate;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const BACKEND: &str = "OpenAI";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Hosted backend speaking the OpenAI chat completions API.
///
/// Works against any endpoint implementing the same API via
/// [`OpenAiGenerator::with_base_url`].
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    config: GeneratorConfig,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            config: GeneratorConfig::new(model),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.config.prompt = prompt;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use this key instead of reading `OPENAI_API_KEY` on each call.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub(crate) fn request_body(&self, schema_text: &str, nl_query: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": chat_messages(&self.config, schema_text, nl_query),
        })
    }
}

impl Default for OpenAiGenerator {
    fn default() -> Self {
        Self::new("gpt-4o")
    }
}

#[async_trait]
impl QueryGenerator for OpenAiGenerator {
    async fn generate_sql_from_nl(&self, schema_text: &str, nl_query: &str) -> AskResult<String> {
        let key = api_key(BACKEND, self.api_key.as_deref(), API_KEY_ENV)?;
        let url = join_url(&self.base_url, "chat/completions");
        tracing::debug!(model = %self.config.model, %url, "sending request to OpenAI");

        let client = reqwest::Client::new();
        let request = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key));
        let (status, body) = post_json(BACKEND, request, &self.request_body(schema_text, nl_query)).await?;

        if !status.is_success() {
            let err = AskError::llm(BACKEND, format!("{}: {}", status, error_message(&body)));
            tracing::error!(error = %err, "Failed to send request to OpenAI");
            return Err(err);
        }

        let parsed: ChatCompletion = serde_json::from_str(&body)
            .map_err(|e| AskError::llm(BACKEND, format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AskError::llm(BACKEND, "No completion in response"))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let generator = OpenAiGenerator::new("gpt-4");
        let body = generator.request_body("Table: t, Column: c, Type: int", "list c");
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"].as_str().unwrap().contains("list c"));
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  SELECT 1;\n"}}]}"#;
        let parsed: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("  SELECT 1;\n"));
    }

    #[test]
    fn test_defaults() {
        let generator = OpenAiGenerator::default();
        assert_eq!(generator.model(), "gpt-4o");
        assert_eq!(generator.backend(), "OpenAI");
    }
}
