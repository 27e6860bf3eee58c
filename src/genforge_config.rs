//! Unified configuration for genforge.
//!
//! Settings are read from `.genforge/genforge.toml` in the project directory
//! and layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [generation]
//! minimum_score = 90
//! component_minimum_score = 90
//! timeout_secs = 600
//! default_stack = "react-vite"
//!
//! [validator]
//! extended = false
//!
//! [ai]
//! model = "claude-sonnet-4-5"
//! api_base = "https://api.anthropic.com"
//! max_output_tokens = 8000
//! max_attempts = 3
//! initial_backoff_ms = 500
//! max_backoff_ms = 8000
//! request_timeout_secs = 120
//!
//! [sandbox]
//! install_cmd = "npm install"
//! build_cmd = "npm run build"
//! serve_cmd = "npx vite preview --host 127.0.0.1 --port {port}"
//! op_timeout_secs = 300
//!
//! [sandbox.env]
//! NODE_ENV = "development"
//! ```
//!
//! Environment: `ANTHROPIC_API_KEY` (never read from the file),
//! `GENFORGE_MODEL`, `GENFORGE_MIN_SCORE`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ai::RetryPolicy;
use crate::build::BuildSettings;
use crate::generation::GenerationSettings;
use crate::quality::{DEFAULT_COMPONENT_MINIMUM_SCORE, DEFAULT_MINIMUM_SCORE, ValidatorConfig};
use crate::sandbox::SandboxConfig;

pub const CONFIG_DIR: &str = ".genforge";
pub const CONFIG_FILE: &str = "genforge.toml";

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL_ENV: &str = "GENFORGE_MODEL";
pub const MIN_SCORE_ENV: &str = "GENFORGE_MIN_SCORE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_minimum_score")]
    pub minimum_score: u8,
    #[serde(default = "default_component_minimum_score")]
    pub component_minimum_score: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_stack")]
    pub default_stack: String,
}

fn default_minimum_score() -> u8 {
    DEFAULT_MINIMUM_SCORE
}

fn default_component_minimum_score() -> u8 {
    DEFAULT_COMPONENT_MINIMUM_SCORE
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_stack() -> String {
    "react-vite".to_string()
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            minimum_score: default_minimum_score(),
            component_minimum_score: default_component_minimum_score(),
            timeout_secs: default_timeout_secs(),
            default_stack: default_stack(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorSection {
    /// Also score lint, imports, dead_code and type_safety.
    #[serde(default)]
    pub extended: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_output_tokens() -> u32 {
    8000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            max_output_tokens: default_max_output_tokens(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// The complete genforge.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenforgeToml {
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub validator: ValidatorSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl GenforgeToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse genforge.toml")
    }

    /// Load `.genforge/genforge.toml`, or defaults if the file doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize genforge.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Configuration problems worth warning about. Never fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.generation.minimum_score > 100 {
            warnings.push(format!(
                "generation.minimum_score = {} is above 100; nothing can pass",
                self.generation.minimum_score
            ));
        }
        if self.generation.component_minimum_score > 100 {
            warnings.push(format!(
                "generation.component_minimum_score = {} is above 100; every component will use its fallback",
                self.generation.component_minimum_score
            ));
        }
        if self.generation.timeout_secs == 0 {
            warnings.push("generation.timeout_secs = 0 aborts every generation immediately".to_string());
        }
        if self.ai.max_attempts == 0 {
            warnings.push("ai.max_attempts = 0 is treated as 1".to_string());
        }
        if self.ai.initial_backoff_ms > self.ai.max_backoff_ms {
            warnings.push("ai.initial_backoff_ms is larger than ai.max_backoff_ms".to_string());
        }
        if self.sandbox.op_timeout_secs == 0 {
            warnings.push("sandbox.op_timeout_secs = 0 fails every sandbox step".to_string());
        }
        if !self.sandbox.serve_cmd.contains("{port}") {
            warnings.push("sandbox.serve_cmd has no {port} placeholder; the preview URL may be wrong".to_string());
        }
        warnings
    }
}

/// Effective configuration: parsed file plus environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct GenforgeConfig {
    pub project_dir: PathBuf,
    pub config_dir: PathBuf,
    pub toml: GenforgeToml,
    pub verbose: bool,
    pub cli_model: Option<String>,
    pub cli_minimum_score: Option<u8>,
    pub cli_extended: bool,
}

impl GenforgeConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = GenforgeToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
            cli_model: None,
            cli_minimum_score: None,
            cli_extended: false,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        model: Option<String>,
        minimum_score: Option<u8>,
        extended: bool,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_model = model;
        config.cli_minimum_score = minimum_score;
        config.cli_extended = extended;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// API key from the environment only.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
    }

    /// Model (CLI → env → file).
    pub fn model(&self) -> String {
        self.cli_model
            .clone()
            .or_else(|| std::env::var(MODEL_ENV).ok().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| self.toml.ai.model.clone())
    }

    /// Minimum overall score (CLI → env → file).
    pub fn minimum_score(&self) -> u8 {
        self.cli_minimum_score
            .or_else(|| {
                std::env::var(MIN_SCORE_ENV)
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
            })
            .unwrap_or(self.toml.generation.minimum_score)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            minimum_score: self.minimum_score(),
            component_minimum_score: self.toml.generation.component_minimum_score,
            extended: self.cli_extended || self.toml.validator.extended,
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            timeout: Duration::from_secs(self.toml.generation.timeout_secs),
            max_output_tokens: self.toml.ai.max_output_tokens,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.toml.ai.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.toml.ai.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.toml.ai.max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.ai.request_timeout_secs)
    }

    pub fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            op_timeout: self.toml.sandbox.op_timeout(),
            repair_max_output_tokens: self.toml.ai.max_output_tokens,
        }
    }

    pub fn sandbox_config(&self) -> &SandboxConfig {
        &self.toml.sandbox
    }

    pub fn default_stack(&self) -> &str {
        &self.toml.generation.default_stack
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
