//! `genforge score`: run the quality validator over existing files.

use anyhow::{Context, Result, bail};
use std::path::Path;

use genforge::artifact::ArtifactSet;
use genforge::artifact::recover::{ParseOutcome, recover_artifacts};
use genforge::generation::{GenerationPlan, StackRegistry};
use genforge::quality::QualityValidator;
use genforge::ui::render_report;

use super::super::{Cli, ScoringArgs};

/// Load artifacts from a directory, or from a file holding an AI JSON dump.
pub fn load_artifacts(path: &Path) -> Result<ArtifactSet> {
    if path.is_dir() {
        return ArtifactSet::load_dir(path);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match recover_artifacts(&text) {
        ParseOutcome::Parsed(set) => Ok(set),
        ParseOutcome::Recovered(set, warnings) => {
            for warning in warnings {
                tracing::warn!(path = %path.display(), "{}", warning);
            }
            Ok(set)
        }
        ParseOutcome::Failed(reason) => {
            bail!("No files could be read from {}: {}", path.display(), reason)
        }
    }
}

/// Returns whether the report passed.
pub fn cmd_score(
    cli: &Cli,
    project_dir: &Path,
    path: &Path,
    stack: Option<&str>,
    scoring: ScoringArgs,
    json: bool,
) -> Result<bool> {
    let config = super::load_config(cli, project_dir, scoring)?;
    let artifacts = load_artifacts(path)?;
    if artifacts.is_empty() {
        bail!("No files found at {}", path.display());
    }

    let context = match stack {
        Some(id) => {
            let stacks = StackRegistry::builtin();
            let stack = stacks.get(id).with_context(|| {
                format!("Unknown stack '{}'. Available: {}", id, stacks.ids().join(", "))
            })?;
            Some(stack.session_context(&GenerationPlan::new("", "", id)))
        }
        None => None,
    };

    let validator_config = config.validator_config();
    let report = QualityValidator::new(validator_config).validate(&artifacts, context.as_ref());
    tracing::info!(
        files = artifacts.len(),
        score = report.overall_score,
        passed = report.passed,
        "scored project"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report, validator_config.minimum_score));
    }
    Ok(report.passed)
}
