//! Configuration loading, validation, and management for Dossier.
//!
//! Loads configuration from `~/.dossier/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dossier/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Knowledge store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Token ceilings
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Section generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Contribution phase settings
    #[serde(default)]
    pub research: ResearchConfig,

    /// External document compiler
    #[serde(default)]
    pub compiler: CompilerConfig,
}

/// Redact a secret string for Debug output.
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
            .field("backend", &self.backend)
            .field("store", &self.store)
            .field("budget", &self.budget)
            .field("generation", &self.generation)
            .field("research", &self.research)
            .field("compiler", &self.compiler)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider name: "openai", "openrouter", "ollama", or any
    /// OpenAI-compatible endpoint given through `base_url`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP request timeout for one backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout_secs() -> u64 {
    180
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory; sessions live under `<root>/sessions/`.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Bounded wait for a same-key write lock
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

fn default_store_root() -> PathBuf {
    AppConfig::config_dir().join("research_database")
}
fn default_lock_wait_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

/// Token ceilings. All sizes use the shared `ceil(bytes / 4)` estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hard ceiling on tokens charged to one session
    #[serde(default = "default_session_ceiling")]
    pub session_ceiling_tokens: u64,

    /// Global ceiling for the rolling context carried between sections
    #[serde(default = "default_rolling_context_tokens")]
    pub rolling_context_tokens: usize,

    /// Ceiling for the relevant-corpus excerpt fed to one section
    #[serde(default = "default_excerpt_tokens")]
    pub excerpt_tokens: usize,
}

fn default_session_ceiling() -> u64 {
    2_000_000
}
fn default_rolling_context_tokens() -> usize {
    12_000
}
fn default_excerpt_tokens() -> usize {
    16_000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            session_ceiling_tokens: default_session_ceiling(),
            rolling_context_tokens: default_rolling_context_tokens(),
            excerpt_tokens: default_excerpt_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Output tokens for a tier-1 section at depth multiplier 1.0
    #[serde(default = "default_base_length")]
    pub base_length_tokens: u32,

    /// Upper bound on the output ceiling of any single backend call
    #[serde(default = "default_per_call_cap")]
    pub per_call_cap_tokens: u32,

    /// Retries after the first failed attempt of a section
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Per-section backend timeout (medium class)
    #[serde(default = "default_section_timeout_secs")]
    pub section_timeout_secs: u64,

    /// Relevance tie-break: "shared" or "best_match"
    #[serde(default = "default_tie_break")]
    pub tie_break: String,
}

fn default_base_length() -> u32 {
    1_500
}
fn default_per_call_cap() -> u32 {
    8_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1_000
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_section_timeout_secs() -> u64 {
    300
}
fn default_tie_break() -> String {
    "shared".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_length_tokens: default_base_length(),
            per_call_cap_tokens: default_per_call_cap(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            section_timeout_secs: default_section_timeout_secs(),
            tie_break: default_tie_break(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Retries after a producer's first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Timeout for one producer attempt (short class)
    #[serde(default = "default_contribution_timeout_secs")]
    pub contribution_timeout_secs: u64,

    /// Output ceiling for each producer backend call
    #[serde(default = "default_research_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_contribution_timeout_secs() -> u64 {
    120
}
fn default_research_output_tokens() -> u32 {
    4_000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            contribution_timeout_secs: default_contribution_timeout_secs(),
            max_output_tokens: default_research_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// External program, e.g. "pandoc". Unset means markdown is delivered
    /// as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Extra arguments passed before the input/output paths
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Full-document compile timeout (long class)
    #[serde(default = "default_compile_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_output_extension() -> String {
    "pdf".into()
}
fn default_compile_timeout_secs() -> u64 {
    600
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: vec![],
            output_extension: default_output_extension(),
            timeout_secs: default_compile_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dossier/config.toml).
    ///
    /// Environment overrides:
    /// - `DOSSIER_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `DOSSIER_MODEL`
    /// - `DOSSIER_STORE_ROOT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("DOSSIER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("DOSSIER_MODEL") {
            self.backend.model = model;
        }
        if let Some(root) = lookup("DOSSIER_STORE_ROOT") {
            self.store.root = PathBuf::from(root);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dossier")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(ConfigError::ValidationError(
                "backend.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.store.lock_wait_ms == 0 {
            return Err(ConfigError::ValidationError(
                "store.lock_wait_ms must be > 0".into(),
            ));
        }
        if self.budget.session_ceiling_tokens == 0
            || self.budget.rolling_context_tokens == 0
            || self.budget.excerpt_tokens == 0
        {
            return Err(ConfigError::ValidationError(
                "budget ceilings must be > 0".into(),
            ));
        }
        if self.generation.base_length_tokens == 0 || self.generation.per_call_cap_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.base_length_tokens and per_call_cap_tokens must be > 0".into(),
            ));
        }
        if self.generation.backoff_max_ms < self.generation.backoff_base_ms {
            return Err(ConfigError::ValidationError(
                "generation.backoff_max_ms must be >= backoff_base_ms".into(),
            ));
        }
        if !matches!(self.generation.tie_break.as_str(), "shared" | "best_match") {
            return Err(ConfigError::ValidationError(format!(
                "generation.tie_break must be \"shared\" or \"best_match\", got \"{}\"",
                self.generation.tie_break
            )));
        }
        if self.compiler.output_extension.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "compiler.output_extension must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
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
            backend: BackendConfig::default(),
            store: StoreConfig::default(),
            budget: BudgetConfig::default(),
            generation: GenerationConfig::default(),
            research: ResearchConfig::default(),
            compiler: CompilerConfig::default(),
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
