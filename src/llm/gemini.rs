//! Google Gemini backend (`generateContent`).

use super::{GeneratorConfig, QueryGenerator, api_key, chat_messages, error_message, join_url, post_json};
use crate::error::{AskError, AskResult};
use crate::prompt::PromptTemplate;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const BACKEND: &str = "Gemini";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Hosted Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    config: GeneratorConfig,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

impl GeminiGenerator {
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

    /// Use this key instead of reading `GEMINI_API_KEY` on each call.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub(crate) fn request_body(&self, schema_text: &str, nl_query: &str) -> serde_json::Value {
        let [system, user] = chat_messages(&self.config, schema_text, nl_query);
        json!({
            "systemInstruction": { "parts": [{ "text": system.content }] },
            "contents": [{ "role": "user", "parts": [{ "text": user.content }] }],
            "generationConfig": {
                "temperature": 1,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": 8192,
                "responseMimeType": "text/plain",
            },
        })
    }
}

impl Default for GeminiGenerator {
    fn default() -> Self {
        Self::new("gemini-1.5-pro-002")
    }
}

#[async_trait]
impl QueryGenerator for GeminiGenerator {
    async fn generate_sql_from_nl(&self, schema_text: &str, nl_query: &str) -> AskResult<String> {
        let key = api_key(BACKEND, self.api_key.as_deref(), API_KEY_ENV)?;
        let url = join_url(
            &self.base_url,
            &format!("models/{}:generateContent", self.config.model),
        );
        tracing::debug!(model = %self.config.model, %url, "sending request to Gemini");

        let client = reqwest::Client::new();
        let request = client.post(&url).header("x-goog-api-key", key);
        let (status, body) = post_json(BACKEND, request, &self.request_body(schema_text, nl_query)).await?;

        if !status.is_success() {
            let err = AskError::llm(BACKEND, format!("{}: {}", status, error_message(&body)));
            tracing::error!(error = %err, "Gemini error");
            return Err(err);
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AskError::llm(BACKEND, format!("Failed to parse response: {}", e)))?;
        parsed
            .text()
            .ok_or_else(|| AskError::llm(BACKEND, "No text in response"))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
