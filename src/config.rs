//! Configuration for askdb.
//!
//! Values come from a TOML file (if any) and are then overridden by the
//! environment. The database variables keep their conventional names:
//! `HOST`, `PORT`, `POSTGRES_DB`, `POSTGRES_USER`, `POSTGRES_PASSWORD`.

use crate::error::{AskError, AskResult};

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "askdb.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub models: ModelsConfig,
}

/// Database credentials, consumed at connect time.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl DatabaseConfig {
    /// Create a new configuration builder
    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::default()
    }

    /// Connection options for the Postgres driver.
    pub fn connect_options(&self) -> PgConnectOptions {
        let opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user);
        match &self.password {
            Some(pwd) => opts.password(pwd),
            None => opts,
        }
    }

    /// `host:port/database` for log lines. Never includes the password.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> AskResult<()> {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| AskError::Config(format!("PORT must be a port number, got '{}'", port)))?;
        }
        if let Some(db) = lookup("POSTGRES_DB") {
            self.database = db;
        }
        if let Some(user) = lookup("POSTGRES_USER") {
            self.user = user;
        }
        if let Some(pwd) = lookup("POSTGRES_PASSWORD") {
            self.password = Some(pwd);
        }
        Ok(())
    }
}

/// Builder for DatabaseConfig
#[derive(Debug, Default)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}

/// Model identifiers and endpoints for the registered generators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub openai_model: String,
    pub ollama_model: String,
    pub ollama_host: String,
    pub gemini_model: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            openai_model: "gpt-4".to_string(),
            ollama_model: "llama3.2:latest".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            gemini_model: "gemini-1.5-pro-002".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> AskResult<Self> {
        toml::from_str(content).map_err(|e| AskError::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> AskResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AskError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration the way the CLI does: the explicit path, or the
    /// first config file found, then environment overrides.
    pub fn load(explicit: Option<&Path>) -> AskResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover() {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `./askdb.toml`, then `<config dir>/askdb/config.toml`.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join("askdb").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AskResult<()> {
        self.database.apply_env(&lookup)
    }
}
