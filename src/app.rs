//! Application context: the registry and executor for one session.
//!
//! Built once at startup and handed to the front end, which drives it one
//! question at a time.

use crate::config::Config;
use crate::error::AskResult;
use crate::executor::DatabaseExecutor;
use crate::llm::ModelRegistry;
use crate::result::{Outcome, ResultSet};
use crate::schema::SchemaInfo;

/// Generated SQL and what running it produced.
#[derive(Debug)]
pub struct Answer {
    pub model: String,
    pub sql: String,
    pub outcome: Outcome<ResultSet>,
}

pub struct AppContext {
    registry: ModelRegistry,
    executor: DatabaseExecutor,
}

impl AppContext {
    pub fn new(registry: ModelRegistry, executor: DatabaseExecutor) -> Self {
        Self { registry, executor }
    }

    /// Stock registry and an executor for the configured database.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ModelRegistry::from_config(&config.models),
            DatabaseExecutor::new(config.database.clone()),
        )
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &DatabaseExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut DatabaseExecutor {
        &mut self.executor
    }

    /// Fetch the live schema.
    pub async fn schema(&mut self) -> Outcome<SchemaInfo> {
        self.executor.get_schema_info().await
    }

    /// Generate SQL for `question` with the model under `label`.
    ///
    /// If the schema cannot be read the question is still sent, with an
    /// empty schema description.
    pub async fn generate(&mut self, label: &str, question: &str) -> AskResult<String> {
        let generator = self.registry.get(label)?;

        let schema = match self.executor.get_schema_info().await {
            Outcome::Success(info) => info.text,
            Outcome::Failed(e) => {
                tracing::warn!(error = %e, "continuing without schema");
                String::new()
            }
        };

        tracing::debug!(model = label, backend = generator.backend(), "generating SQL");
        generator.generate_sql_from_nl(&schema, question).await
    }

    /// Generate SQL for `question` and run it.
    ///
    /// Generator errors are returned as `Err`. Database trouble while running
    /// the generated SQL is reported in [`Answer::outcome`].
    pub async fn ask(&mut self, label: &str, question: &str) -> AskResult<Answer> {
        let sql = self.generate(label, question).await?;
        let outcome = self.executor.execute_query(&sql).await;
        Ok(Answer {
            model: label.to_string(),
            sql,
            outcome,
        })
    }
}
