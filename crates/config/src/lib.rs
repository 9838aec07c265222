//! Configuration loading, validation, and management for Threadwise.
//!
//! Loads configuration from `~/.threadwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use threadwise_core::context::{AssemblyOptions, RecencyDirection, SectionFractions, SectionType};

/// The root configuration structure.
///
/// Maps directly to `~/.threadwise/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model id recorded on assembled contexts
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Token budget used when a caller does not supply one
    #[serde(default = "default_token_budget")]
    pub default_token_budget: usize,

    /// Memory store configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_token_budget() -> usize {
    4096
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "sqlite" or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Database path; defaults to `~/.threadwise/memory.sqlite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
        }
    }
}

impl MemoryConfig {
    /// The database path, falling back to the config directory.
    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.sqlite"))
    }
}

/// How synthesized candidates (system prompt, user message, summary) are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEstimatorKind {
    /// One token per whitespace-separated word
    #[default]
    Words,
    /// ~4 characters per token, rounded up
    Chars,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_pinned_limit")]
    pub pinned_limit: usize,

    #[serde(default = "default_true")]
    pub include_summary: bool,

    /// Retrieval sources; empty disables RAG
    #[serde(default)]
    pub rag_sources: Vec<String>,

    #[serde(default = "default_max_rag_results")]
    pub max_rag_results: usize,

    #[serde(default = "default_recency_decay")]
    pub recency_decay: f64,

    #[serde(default)]
    pub recency_direction: RecencyDirection,

    #[serde(default)]
    pub token_estimator: TokenEstimatorKind,

    /// Per-section caps as fractions of the token budget
    #[serde(default)]
    pub fractions: SectionFractions,
}

fn default_history_limit() -> usize {
    AssemblyOptions::default().history_limit
}
fn default_pinned_limit() -> usize {
    AssemblyOptions::default().pinned_limit
}
fn default_max_rag_results() -> usize {
    AssemblyOptions::default().max_rag_results
}
fn default_recency_decay() -> f64 {
    AssemblyOptions::default().recency_decay
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            pinned_limit: default_pinned_limit(),
            include_summary: true,
            rag_sources: vec![],
            max_rag_results: default_max_rag_results(),
            recency_decay: default_recency_decay(),
            recency_direction: RecencyDirection::default(),
            token_estimator: TokenEstimatorKind::default(),
            fractions: SectionFractions::default(),
        }
    }
}

impl AssemblyConfig {
    /// The per-call options this configuration describes.
    pub fn to_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            fractions: self.fractions,
            history_limit: self.history_limit,
            pinned_limit: self.pinned_limit,
            include_summary: self.include_summary,
            rag_sources: self.rag_sources.clone(),
            max_rag_results: self.max_rag_results,
            recency_decay: self.recency_decay,
            recency_direction: self.recency_direction,
        }
    }

    /// Fractions may sum past 1.0; each one only has to be a usable cap.
    fn validate(&self) -> Result<(), ConfigError> {
        for section in SectionType::ORDERED {
            let fraction = self.fractions.get(section);
            if !fraction.is_finite() || fraction < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "assembly.fractions.{section} must be a non-negative number, got {fraction}"
                )));
            }
        }

        if !(self.recency_decay > 0.0 && self.recency_decay <= 1.0) {
            return Err(ConfigError::ValidationError(
                "assembly.recency_decay must be in (0.0, 1.0]".into(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.threadwise/config.toml).
    ///
    /// Environment variables override file values:
    /// - `THREADWISE_MODEL`
    /// - `THREADWISE_DB`
    /// - `THREADWISE_TOKEN_BUDGET`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply the same environment overrides as [`Self::load`].
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(model) = var("THREADWISE_MODEL") {
            self.default_model = model;
        }

        if let Some(db) = var("THREADWISE_DB") {
            self.memory.path = Some(PathBuf::from(db));
        }

        if let Some(budget) = var("THREADWISE_TOKEN_BUDGET") {
            self.default_token_budget = budget.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "THREADWISE_TOKEN_BUDGET must be a positive integer, got {budget:?}"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadwise")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "default_token_budget must be > 0".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "sqlite" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be \"sqlite\" or \"in_memory\", got {:?}",
                self.memory.backend
            )));
        }

        self.assembly.validate()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_token_budget: default_token_budget(),
            memory: MemoryConfig::default(),
            assembly: AssemblyConfig::default(),
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
