//! # askdb — ask your database in plain language
//!
//! askdb reads the live PostgreSQL catalog, hands it to a language model
//! together with your question, runs the SQL that comes back and gives you
//! the rows.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use askdb::prelude::*;
//!
//! let config = Config::load(None)?;
//! let mut app = AppContext::from_config(&config);
//!
//! let answer = app.ask("GPT-4", "names of everyone hired before May 2022").await?;
//! println!("{}", answer.sql);
//! match answer.outcome {
//!     Outcome::Success(rows) => println!("{} rows", rows.len()),
//!     Outcome::Failed(e) => eprintln!("query failed: {e}"),
//! }
//! ```
//!
//! ## Backends
//!
//! | Label      | Backend | Credentials        |
//! |------------|---------|--------------------|
//! | `GPT-4`    | OpenAI  | `OPENAI_API_KEY`   |
//! | `llama3.2` | Ollama  | local daemon       |
//! | `Gemini`   | Gemini  | `GEMINI_API_KEY`   |

pub mod app;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod prompt;
pub mod result;
pub mod schema;

pub mod prelude {
    pub use crate::app::{Answer, AppContext};
    pub use crate::config::{Config, DatabaseConfig, ModelsConfig};
    pub use crate::error::*;
    pub use crate::executor::DatabaseExecutor;
    pub use crate::llm::{
        GeminiGenerator, GeneratorConfig, ModelRegistry, OllamaGenerator, OpenAiGenerator,
        QueryGenerator,
    };
    pub use crate::prompt::PromptTemplate;
    pub use crate::result::{Outcome, ResultSet};
    pub use crate::schema::{SchemaColumn, SchemaDescriptor, SchemaInfo};
}
