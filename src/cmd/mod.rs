//! CLI command implementations.
//!
//! | Module     | Commands handled     |
//! |------------|----------------------|
//! | `project`  | `Init`, `Config`     |
//! | `stacks`   | `Stacks`             |
//! | `generate` | `Generate`           |
//! | `score`    | `Score`              |
//! | `build`    | `Build`              |

pub mod build;
pub mod generate;
pub mod project;
pub mod score;
pub mod stacks;

pub use build::cmd_build;
pub use generate::{GenerateRequest, cmd_generate};
pub use project::{cmd_config, cmd_init};
pub use score::cmd_score;
pub use stacks::cmd_stacks;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use genforge::ai::{AiService, AnthropicService, RetryingAiService};
use genforge::genforge_config::{API_KEY_ENV, GenforgeConfig};

use super::{Cli, ScoringArgs};

/// Effective configuration for a command: genforge.toml under `project_dir`
/// with environment and CLI overrides applied.
pub fn load_config(cli: &Cli, project_dir: &Path, scoring: ScoringArgs) -> Result<GenforgeConfig> {
    let config = GenforgeConfig::with_cli_args(
        project_dir.to_path_buf(),
        cli.verbose,
        cli.model.clone(),
        scoring.min_score,
        scoring.extended,
    )?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    Ok(config)
}

/// The Anthropic client wrapped in the configured retry policy.
pub fn build_ai(config: &GenforgeConfig) -> Result<Arc<dyn AiService>> {
    let api_key = config
        .api_key()
        .with_context(|| format!("{} is not set", API_KEY_ENV))?;
    let service = AnthropicService::new(
        config.toml.ai.api_base.clone(),
        api_key,
        config.model(),
        config.request_timeout(),
    )?;
    tracing::debug!(model = %service.model(), "using Anthropic service");
    Ok(Arc::new(RetryingAiService::new(service, config.retry_policy())))
}
