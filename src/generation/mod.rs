//! Project generation: scaffold, required files, then components one at a
//! time with a per-component quality gate.

pub mod deps;
pub mod orchestrator;
pub mod stack;
pub mod template;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::artifact::ArtifactSet;
use crate::quality::ValidationReport;
pub use orchestrator::{GenerationOrchestrator, GenerationSettings};
pub use stack::{Blueprint, StackConfig, StackRegistry};
pub use template::{Template, TemplateFormat, TemplateVars};

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPlan {
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    pub stack_id: String,
    /// Paths that must be present in the result. Empty means the stack defaults.
    #[serde(default)]
    pub required_files: Vec<String>,
    /// Component names, free-form (`"hero section"` is fine).
    #[serde(default)]
    pub required_components: Vec<String>,
}

impl GenerationPlan {
    pub fn new(
        project_name: impl Into<String>,
        description: impl Into<String>,
        stack_id: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            description: description.into(),
            stack_id: stack_id.into(),
            required_files: Vec::new(),
            required_components: Vec::new(),
        }
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Component identifiers in plan order, deduplicated.
    pub fn component_identifiers(&self) -> Vec<String> {
        let mut idents: Vec<String> = Vec::new();
        for name in &self.required_components {
            let ident = template::component_identifier(name);
            if !idents.contains(&ident) {
                idents.push(ident);
            }
        }
        idents
    }

    pub fn template_vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("projectName", self.project_name.clone());
        vars.insert("description", self.description.clone());
        vars.insert("stackId", self.stack_id.clone());
        let package = template::slugify(&self.project_name, 214);
        vars.insert(
            "packageName",
            if package.is_empty() { "app".to_string() } else { package },
        );
        vars
    }
}

/// Per-component record of how generation went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentOutcome {
    pub name: String,
    pub path: String,
    pub attempts: u32,
    pub score: u8,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub artifacts: ArtifactSet,
    pub report: ValidationReport,
    /// Advisory: sum of what the AI service reported.
    pub tokens_used: u64,
    pub components: Vec<ComponentOutcome>,
    /// Non-empty when generation aborted or timed out; the artifacts are
    /// still complete with fallbacks in that case.
    pub errors: Vec<String>,
}

impl GenerationResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Emitted after each component finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationProgress {
    pub component: String,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

/// Fire-and-forget progress channel. A full or closed channel drops the
/// update rather than stalling generation.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<GenerationProgress>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<GenerationProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, progress: GenerationProgress) {
        if let Some(tx) = &self.tx
            && let Err(e) = tx.try_send(progress)
        {
            tracing::debug!(error = %e, "dropped generation progress update");
        }
    }
}
