//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.survey-insights.toml` files.

use crate::cli::{Args, Command};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".survey-insights.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// AI service settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Response store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Survey catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Admin gate settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Filter facets offered on the results view.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Usage advice settings.
    #[serde(default)]
    pub advice: AdviceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

/// Which contract the AI service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiBackend {
    /// Structured flow endpoints taking and returning the request shapes as JSON.
    #[default]
    Flow,
    /// Ollama chat API; prompts are rendered locally.
    Ollama,
}

/// AI service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: AiBackend,

    /// Base URL of the AI service.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Model name (used by the Ollama backend).
    #[serde(default = "default_model")]
    pub name: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Transport timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: AiBackend::default(),
            service_url: default_service_url(),
            name: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_service_url() -> String {
    "http://localhost:3400".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    300
}

/// Where responses are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Response store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// JSON file used by the file backend.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "responses.json".to_string()
}

/// Survey catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file with survey definitions; the bundled catalog when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Admin gate settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session token issued by the auth provider. Admin routes are closed
    /// while unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Filter facet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Question ids offered as filters (age, gender, year of study, platform).
    #[serde(default = "default_filter_questions")]
    pub questions: Vec<String>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            questions: default_filter_questions(),
        }
    }
}

fn default_filter_questions() -> Vec<String> {
    vec!["q2", "q3", "q4", "q8"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Usage advice settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceConfig {
    /// Question ids describing smartphone and social media usage.
    #[serde(default = "default_advice_questions")]
    pub questions: Vec<String>,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            questions: default_advice_questions(),
        }
    }
}

fn default_advice_questions() -> Vec<String> {
    vec!["q5", "q6", "q7", "q8", "q11", "q12", "q13"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Line budget of one report page.
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,

    /// Wrap width for summary and answer text.
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lines_per_page: default_lines_per_page(),
            wrap_width: default_wrap_width(),
        }
    }
}

fn default_lines_per_page() -> usize {
    50
}

fn default_wrap_width() -> usize {
    90
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref url) = args.ai_url {
            self.model.service_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref store) = args.store {
            self.store.backend = StoreBackend::File;
            self.store.path = store.display().to_string();
        }

        if let Some(Command::Serve {
            bind,
            port,
            admin_token,
        }) = &args.command
        {
            if let Some(bind) = bind {
                self.server.bind = bind.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
            if let Some(token) = admin_token {
                self.auth.admin_token = Some(token.clone());
            }
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `--quiet` wins, then `--verbose` or
    /// `[general] verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
