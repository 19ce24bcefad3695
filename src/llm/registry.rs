//! Model registry: display label → generator, fixed at startup.

use super::{GeminiGenerator, OllamaGenerator, OpenAiGenerator, QueryGenerator};
use crate::config::ModelsConfig;
use crate::error::{AskError, AskResult};

/// Ordered set of labelled generators.
///
/// Built once and then only read. Lookup ignores ASCII case so labels can be
/// typed at a prompt.
#[derive(Default)]
pub struct ModelRegistry {
    entries: Vec<(String, Box<dyn QueryGenerator>)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three stock backends, labelled after their models.
    pub fn from_config(models: &ModelsConfig) -> Self {
        let ollama_label = models
            .ollama_model
            .split(':')
            .next()
            .unwrap_or(&models.ollama_model)
            .to_string();

        Self::new()
            .with(
                models.openai_model.to_uppercase(),
                OpenAiGenerator::new(&models.openai_model),
            )
            .with(
                ollama_label,
                OllamaGenerator::new(&models.ollama_model).with_host(&models.ollama_host),
            )
            .with("Gemini", GeminiGenerator::new(&models.gemini_model))
    }

    /// Add a generator, replacing any entry with the same label.
    pub fn register(&mut self, label: impl Into<String>, generator: impl QueryGenerator + 'static) {
        let label = label.into();
        let generator: Box<dyn QueryGenerator> = Box::new(generator);
        match self.entries.iter_mut().find(|(l, _)| l.eq_ignore_ascii_case(&label)) {
            Some(entry) => *entry = (label, generator),
            None => self.entries.push((label, generator)),
        }
    }

    pub fn with(mut self, label: impl Into<String>, generator: impl QueryGenerator + 'static) -> Self {
        self.register(label, generator);
        self
    }

    pub fn get(&self, label: &str) -> AskResult<&dyn QueryGenerator> {
        self.entries
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, g)| g.as_ref())
            .ok_or_else(|| AskError::UnknownModel(label.to_string()))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(l, _)| l.as_str()).collect()
    }

    /// First registered label.
    pub fn default_label(&self) -> Option<&str> {
        self.entries.first().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn QueryGenerator)> {
        self.entries.iter().map(|(l, g)| (l.as_str(), g.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
