//! `genforge generate`: run the generation orchestrator and write the result.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use genforge::generation::{GenerationOrchestrator, GenerationPlan, ProgressSink, StackRegistry};
use genforge::quality::QualityValidator;
use genforge::ui::{GenerationProgressUI, render_report};

use super::super::{Cli, ScoringArgs};

/// Flags of one `generate` invocation.
pub struct GenerateRequest {
    pub plan_file: Option<PathBuf>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub stack: Option<String>,
    pub components: Vec<String>,
    pub files: Vec<String>,
    pub output: PathBuf,
    pub force: bool,
    pub json: bool,
}

impl GenerateRequest {
    fn plan(&self, default_stack: &str) -> Result<GenerationPlan> {
        if let Some(path) = &self.plan_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse plan file: {}", path.display()));
        }
        let name = self
            .name
            .clone()
            .context("--name is required unless --plan is given")?;
        Ok(GenerationPlan::new(
            name,
            self.description.clone().unwrap_or_default(),
            self.stack.clone().unwrap_or_else(|| default_stack.to_string()),
        )
        .with_components(self.components.iter().cloned())
        .with_required_files(self.files.iter().cloned()))
    }
}

fn ensure_writable_output(output: &Path, force: bool) -> Result<()> {
    if output.is_file() {
        bail!("Output path {} is a file", output.display());
    }
    let non_empty = output.is_dir()
        && std::fs::read_dir(output)
            .with_context(|| format!("Failed to read {}", output.display()))?
            .next()
            .is_some();
    if non_empty && !force {
        bail!(
            "Output directory {} is not empty. Pass --force to write into it.",
            output.display()
        );
    }
    Ok(())
}

/// Returns whether generation finished without a fatal error.
pub async fn cmd_generate(
    cli: &Cli,
    project_dir: &Path,
    request: GenerateRequest,
    scoring: ScoringArgs,
) -> Result<bool> {
    let config = super::load_config(cli, project_dir, scoring)?;
    let plan = request.plan(config.default_stack())?;

    let stacks = StackRegistry::builtin();
    if stacks.get(&plan.stack_id).is_none() {
        bail!(
            "Unknown stack '{}'. Available: {}",
            plan.stack_id,
            stacks.ids().join(", ")
        );
    }
    ensure_writable_output(&request.output, request.force)?;

    let ai = super::build_ai(&config)?;
    let validator_config = config.validator_config();
    let orchestrator = GenerationOrchestrator::new(
        ai,
        QualityValidator::new(validator_config),
        stacks,
        config.generation_settings(),
    );

    let visible = !request.json && console::user_attended_stderr();
    let ui = GenerationProgressUI::new(plan.component_identifiers().len() as u64, visible);
    let (tx, mut rx) = mpsc::channel(32);

    let generation = orchestrator.generate(&plan, ProgressSink::new(tx));
    tokio::pin!(generation);
    let result = loop {
        tokio::select! {
            result = &mut generation => break result,
            Some(progress) = rx.recv() => ui.update(&progress),
        }
    };
    ui.finish(&result);
    let complete = result.is_complete();

    result.artifacts.write_to_dir(&request.output)?;
    tracing::info!(
        output = %request.output.display(),
        files = result.artifacts.len(),
        tokens_used = result.tokens_used,
        "wrote generated project"
    );

    if request.json {
        let files: Vec<&str> = result.artifacts.paths().collect();
        let summary = serde_json::json!({
            "output": request.output,
            "files": files,
            "report": result.report,
            "components": result.components,
            "tokensUsed": result.tokens_used,
            "errors": result.errors,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Wrote {} file(s) to {}",
            result.artifacts.len(),
            request.output.display()
        );
        println!();
        print!("{}", render_report(&result.report, validator_config.minimum_score));
    }

    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request() -> GenerateRequest {
        GenerateRequest {
            plan_file: None,
            name: Some("Bakery".into()),
            description: None,
            stack: None,
            components: vec!["hero".into()],
            files: Vec::new(),
            output: PathBuf::from("out"),
            force: false,
            json: false,
        }
    }

    #[test]
    fn test_plan_from_flags_uses_default_stack() {
        let plan = request().plan("static-site").unwrap();
        assert_eq!(plan.project_name, "Bakery");
        assert_eq!(plan.stack_id, "static-site");
        assert_eq!(plan.required_components, vec!["hero"]);
    }

    #[test]
    fn test_plan_requires_name() {
        let mut req = request();
        req.name = None;
        assert!(req.plan("react-vite").is_err());
    }

    #[test]
    fn test_plan_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"projectName": "Shop", "stackId": "react-vite"}"#).unwrap();
        let mut req = request();
        req.plan_file = Some(path);
        let plan = req.plan("static-site").unwrap();
        assert_eq!(plan.project_name, "Shop");
        assert_eq!(plan.stack_id, "react-vite");
    }

    #[test]
    fn test_output_must_be_empty_without_force() {
        let dir = tempdir().unwrap();
        assert!(ensure_writable_output(&dir.path().join("fresh"), false).is_ok());
        std::fs::write(dir.path().join("x.txt"), "x").unwrap();
        assert!(ensure_writable_output(dir.path(), false).is_err());
        assert!(ensure_writable_output(dir.path(), true).is_ok());
    }
}
