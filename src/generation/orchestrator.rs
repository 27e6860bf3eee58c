use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::stack::{Blueprint, Fallback, KnownDependency, StackConfig};
use super::template::{self, TemplateVars};
use super::{ComponentOutcome, GenerationPlan, GenerationProgress, GenerationResult, ProgressSink};
use crate::ai::AiService;
use crate::artifact::ArtifactSet;
use crate::artifact::recover::extract_code;
use crate::errors::GenerationError;
use crate::generation::{StackRegistry, deps};
use crate::prompts;
use crate::quality::QualityValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Wall-clock ceiling for one `generate` call.
    pub timeout: Duration,
    /// Upper bound on per-request output tokens; blueprints may ask for less.
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            max_output_tokens: 8000,
        }
    }
}

/// State accumulated during a run. Lives outside the timed future so a
/// timeout keeps everything produced so far.
#[derive(Default)]
struct RunState {
    artifacts: ArtifactSet,
    tokens_used: u64,
    components: Vec<ComponentOutcome>,
    dependencies: BTreeMap<&'static str, KnownDependency>,
}

impl RunState {
    fn record_dependencies(&mut self, stack: &StackConfig, source: &str) {
        for dep in deps::scan(source, &stack.known_dependencies) {
            self.dependencies.entry(dep.package).or_insert_with(|| dep.clone());
        }
    }
}

/// Sequences scaffold → required files → components against one stack.
pub struct GenerationOrchestrator {
    ai: Arc<dyn AiService>,
    validator: QualityValidator,
    stacks: StackRegistry,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        ai: Arc<dyn AiService>,
        validator: QualityValidator,
        stacks: StackRegistry,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            ai,
            validator,
            stacks,
            settings,
        }
    }

    pub fn stacks(&self) -> &StackRegistry {
        &self.stacks
    }

    /// Generate a project for `plan`.
    ///
    /// Never fails: fatal conditions (unknown stack, empty scaffold, fatal AI
    /// error, timeout) are reported in `errors`, and every required file and
    /// component is still present, filled from fallbacks where needed.
    pub async fn generate(&self, plan: &GenerationPlan, progress: ProgressSink) -> GenerationResult {
        let mut state = RunState::default();
        let mut errors = Vec::new();
        let stack = self.stacks.get(&plan.stack_id);

        match stack {
            None => {
                errors.push(GenerationError::UnknownStack(plan.stack_id.clone()).to_string());
            }
            Some(stack) => {
                let run = self.run(plan, stack, &progress, &mut state);
                match tokio::time::timeout(self.settings.timeout, run).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => errors.push(e.to_string()),
                    Err(_) => errors.push(
                        GenerationError::TimedOut {
                            secs: self.settings.timeout.as_secs(),
                        }
                        .to_string(),
                    ),
                }
            }
        }

        for error in &errors {
            tracing::error!(project = %plan.project_name, error = %error, "generation aborted");
        }

        self.fill_missing(plan, stack, &mut state);

        if let Some(stack) = stack {
            self.merge_dependencies(stack, &mut state);
        }

        let context = stack.map(|s| s.session_context(plan));
        let report = self.validator.validate(&state.artifacts, context.as_ref());
        tracing::info!(
            project = %plan.project_name,
            files = state.artifacts.len(),
            score = report.overall_score,
            passed = report.passed,
            tokens = state.tokens_used,
            "generation finished"
        );

        GenerationResult {
            artifacts: state.artifacts,
            report,
            tokens_used: state.tokens_used,
            components: state.components,
            errors,
        }
    }

    async fn run(
        &self,
        plan: &GenerationPlan,
        stack: &StackConfig,
        progress: &ProgressSink,
        state: &mut RunState,
    ) -> Result<(), GenerationError> {
        let vars = plan.template_vars();

        if stack.scaffold.is_empty() {
            return Err(GenerationError::EmptyScaffold(stack.id.to_string()));
        }
        for (path, template) in &stack.scaffold {
            state.artifacts.insert(path, template.render(&vars));
        }
        tracing::debug!(stack = stack.id, files = stack.scaffold.len(), "scaffold emitted");

        for path in stack.required_files(plan) {
            if state.artifacts.contains(&path) {
                continue;
            }
            let content = self.generate_file(plan, stack, &path, &vars, state).await?;
            state.record_dependencies(stack, &content);
            state.artifacts.insert(&path, content);
        }

        let components = plan.component_identifiers();
        let total = components.len();
        for (idx, identifier) in components.iter().enumerate() {
            let (content, outcome) = self.generate_component(plan, stack, identifier, state).await?;
            if !outcome.used_fallback {
                state.record_dependencies(stack, &content);
            }
            state.artifacts.insert(&outcome.path, content);
            state.components.push(outcome);

            let completed = idx + 1;
            progress.emit(GenerationProgress {
                component: identifier.clone(),
                completed,
                total,
                percent: (completed * 100 / total) as u8,
            });
        }

        Ok(())
    }

    async fn generate_file(
        &self,
        plan: &GenerationPlan,
        stack: &StackConfig,
        path: &str,
        vars: &TemplateVars,
        state: &mut RunState,
    ) -> Result<String, GenerationError> {
        match stack.blueprint(path) {
            Blueprint::Static(template) => Ok(template.render(vars)),
            Blueprint::Prompted {
                purpose,
                guidelines,
                max_output_tokens,
                fallback,
            } => {
                let prompt = prompts::file_prompt(plan, stack, path, &purpose, &guidelines);
                let max_tokens = max_output_tokens.min(self.settings.max_output_tokens);
                let response = self.ai.ask(&prompt, max_tokens).await?;
                state.tokens_used += response.tokens_used;

                let code = extract_code(&response.text);
                if code.trim().is_empty() {
                    tracing::warn!(path, "AI returned no content, using fallback");
                    return Ok(render_fallback(&fallback, plan, stack, path, vars));
                }
                Ok(code)
            }
        }
    }

    /// Generate one component, regenerating once with the failing checks and
    /// falling back to a safe template if the second attempt also fails.
    async fn generate_component(
        &self,
        plan: &GenerationPlan,
        stack: &StackConfig,
        identifier: &str,
        state: &mut RunState,
    ) -> Result<(String, ComponentOutcome), GenerationError> {
        let path = stack.component_path(identifier);
        let max_tokens = self.settings.max_output_tokens;
        let mut previous_issues: Vec<String> = Vec::new();

        for attempt in 1..=2u32 {
            let prompt = prompts::component_prompt(plan, stack, identifier, &previous_issues);
            let response = self.ai.ask(&prompt, max_tokens).await?;
            state.tokens_used += response.tokens_used;

            let code = extract_code(&response.text);
            let report = self.validator.validate_component(identifier, &code, stack.component_style);
            if self.validator.component_passes(&report) {
                tracing::debug!(component = identifier, attempt, score = report.score, "component accepted");
                return Ok((
                    code,
                    ComponentOutcome {
                        name: identifier.to_string(),
                        path,
                        attempts: attempt,
                        score: report.score,
                        used_fallback: false,
                    },
                ));
            }

            previous_issues = report.failing_checks();
            tracing::warn!(
                component = identifier,
                attempt,
                score = report.score,
                issues = ?previous_issues,
                "component failed quality checks"
            );
        }

        let code = template::fallback_component(stack.component_style, identifier);
        let score = self
            .validator
            .validate_component(identifier, &code, stack.component_style)
            .score;
        tracing::warn!(component = identifier, "using fallback component template");
        Ok((
            code,
            ComponentOutcome {
                name: identifier.to_string(),
                path,
                attempts: 2,
                score,
                used_fallback: true,
            },
        ))
    }

    /// Fill any required file or component still missing after an aborted
    /// or timed-out run.
    fn fill_missing(&self, plan: &GenerationPlan, stack: Option<&StackConfig>, state: &mut RunState) {
        let vars = plan.template_vars();
        match stack {
            Some(stack) => {
                for (path, template) in &stack.scaffold {
                    state.artifacts.insert_if_absent(path, template.render(&vars));
                }
                for path in stack.required_files(plan) {
                    if state.artifacts.contains(&path) {
                        continue;
                    }
                    let content = match stack.blueprint(&path) {
                        Blueprint::Static(template) => template.render(&vars),
                        Blueprint::Prompted { fallback, .. } => {
                            render_fallback(&fallback, plan, stack, &path, &vars)
                        }
                    };
                    state.artifacts.insert(&path, content);
                }
                for identifier in plan.component_identifiers() {
                    let path = stack.component_path(&identifier);
                    if state.artifacts.contains(&path) {
                        continue;
                    }
                    let code = template::fallback_component(stack.component_style, &identifier);
                    let score = self
                        .validator
                        .validate_component(&identifier, &code, stack.component_style)
                        .score;
                    state.artifacts.insert(&path, code);
                    state.components.push(ComponentOutcome {
                        name: identifier,
                        path,
                        attempts: 0,
                        score,
                        used_fallback: true,
                    });
                }
            }
            None => {
                for path in &plan.required_files {
                    state
                        .artifacts
                        .insert_if_absent(path, template::generic_fallback(path, &vars));
                }
            }
        }
    }

    fn merge_dependencies(&self, stack: &StackConfig, state: &mut RunState) {
        let Some(manifest_path) = stack.manifest else {
            return;
        };
        if state.dependencies.is_empty() {
            return;
        }
        let Some(manifest) = state.artifacts.get(manifest_path) else {
            return;
        };
        match deps::merge_into_manifest(manifest, state.dependencies.values()) {
            Ok(merged) => {
                tracing::debug!(count = state.dependencies.len(), "declared discovered dependencies");
                state.artifacts.insert(manifest_path, merged);
            }
            Err(e) => tracing::warn!(manifest = manifest_path, error = %e, "could not merge dependencies"),
        }
    }
}

fn render_fallback(
    fallback: &Fallback,
    plan: &GenerationPlan,
    stack: &StackConfig,
    path: &str,
    vars: &TemplateVars,
) -> String {
    match fallback {
        Fallback::Template(template) => template.render(vars),
        Fallback::AppShell => template::app_shell(
            &plan.project_name,
            &stack.component_import_prefix(),
            &plan.component_identifiers(),
        ),
        Fallback::Generic => template::generic_fallback(path, vars),
    }
}
