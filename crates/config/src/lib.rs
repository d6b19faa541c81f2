//! Configuration loading, validation, and management for MedIntake.
//!
//! Loads configuration from `~/.medintake/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.medintake/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used for the conversation itself
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Small model for titles, suggestions and smart replies
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Conversation controller and router settings
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Document and media preprocessing
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Report artifact output
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Turn history storage
    #[serde(default)]
    pub history: HistoryConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_fast_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1024
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("fast_model", &self.fast_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("intake", &self.intake)
            .field("preprocess", &self.preprocess)
            .field("reports", &self.reports)
            .field("history", &self.history)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Most recent turns sent to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Estimated-token ceiling for the windowed history
    #[serde(default = "default_history_token_budget")]
    pub history_token_budget: usize,

    /// Per model call; elapsed time counts as a transport failure
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Reserved string that ends the clinical interview
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,

    /// "patient" or "doctor"
    #[serde(default = "default_role")]
    pub default_role: String,
}

fn default_history_window() -> usize {
    40
}
fn default_history_token_budget() -> usize {
    6000
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_completion_marker() -> String {
    "SUMMARY_READY".into()
}
fn default_role() -> String {
    "patient".into()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            history_token_budget: default_history_token_budget(),
            model_timeout_secs: default_model_timeout_secs(),
            completion_marker: default_completion_marker(),
            default_role: default_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// PDFs with less extracted text than this are treated as scans
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_vision_max_tokens")]
    pub vision_max_tokens: u32,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_transcription_prompt")]
    pub transcription_prompt: String,

    /// ISO-639-1 code; unset means auto-detect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_language: Option<String>,

    /// Rewrite transcripts in roman script through the fast model
    #[serde(default)]
    pub normalize_script: bool,
}

fn default_min_text_chars() -> usize {
    50
}
fn default_max_context_chars() -> usize {
    6000
}
fn default_vision_model() -> String {
    "llama-3.2-11b-vision-preview".into()
}
fn default_vision_max_tokens() -> u32 {
    500
}
fn default_transcription_model() -> String {
    "whisper-large-v3".into()
}
fn default_transcription_prompt() -> String {
    "Medical consultation, symptoms, diagnosis, patient history, hindi, gujarati, english mixed.".into()
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            max_context_chars: default_max_context_chars(),
            vision_model: default_vision_model(),
            vision_max_tokens: default_vision_max_tokens(),
            transcription_model: default_transcription_model(),
            transcription_prompt: default_transcription_prompt(),
            transcription_language: None,
            normalize_script: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Prefix of the artifact reference handed back to the model
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_output_dir() -> String {
    "static/reports".into()
}
fn default_url_prefix() -> String {
    "/static/reports".into()
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            url_prefix: default_url_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "file" or "in_memory"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// Directory for the file backend; defaults to `~/.medintake/sessions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_history_backend() -> String {
    "file".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

impl HistoryConfig {
    /// Resolved directory for the file backend.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None => AppConfig::config_dir().join("sessions"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.medintake/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `MEDINTAKE_API_KEY` (highest priority)
    /// - `GROQ_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("MEDINTAKE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("MEDINTAKE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("MEDINTAKE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".medintake")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.intake.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "intake.history_window must be > 0".into(),
            ));
        }

        if self.intake.model_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "intake.model_timeout_secs must be > 0".into(),
            ));
        }

        if self.intake.completion_marker.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "intake.completion_marker must not be empty".into(),
            ));
        }

        if self.preprocess.min_text_chars > self.preprocess.max_context_chars {
            return Err(ConfigError::ValidationError(
                "preprocess.min_text_chars must not exceed preprocess.max_context_chars".into(),
            ));
        }

        match self.history.backend.as_str() {
            "file" | "in_memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "history.backend must be \"file\" or \"in_memory\", got \"{other}\""
                )));
            }
        }

        match self.intake.default_role.to_lowercase().as_str() {
            "patient" | "doctor" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "intake.default_role must be \"patient\" or \"doctor\", got \"{other}\""
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            fast_model: default_fast_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            intake: IntakeConfig::default(),
            preprocess: PreprocessConfig::default(),
            reports: ReportsConfig::default(),
            history: HistoryConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
