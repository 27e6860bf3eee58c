use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initializing,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// The five build steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    InitializeSandbox,
    MountArtifacts,
    InstallDependencies,
    Build,
    StartPreviewServer,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::InitializeSandbox,
        StepKind::MountArtifacts,
        StepKind::InstallDependencies,
        StepKind::Build,
        StepKind::StartPreviewServer,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::InitializeSandbox => "Initialize sandbox",
            Self::MountArtifacts => "Mount artifacts",
            Self::InstallDependencies => "Install dependencies",
            Self::Build => "Build",
            Self::StartPreviewServer => "Start preview server",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Syntax,
    Dependency,
    Runtime,
    Build,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Dependency => write!(f, "dependency"),
            Self::Runtime => write!(f, "runtime"),
            Self::Build => write!(f, "build"),
        }
    }
}

/// One structured failure extracted from build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildError {
    /// Path as reported by the tool; empty when no file could be identified.
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub kind: ErrorKind,
}

impl BuildError {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            file: String::new(),
            line: None,
            column: None,
            message: message.into(),
            kind: ErrorKind::Build,
        }
    }

    pub fn has_file(&self) -> bool {
        !self.file.is_empty()
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if self.has_file() {
            write!(f, "{}", self.file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(column) = self.column {
                    write!(f, ":{}", column)?;
                }
            }
            write!(f, " ")?;
        }
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub kind: StepKind,
    pub name: String,
    pub status: StepStatus,
    pub logs: Vec<String>,
    pub errors: Vec<BuildError>,
}

impl BuildStep {
    fn new(kind: StepKind) -> Self {
        Self {
            kind,
            name: kind.label().to_string(),
            status: StepStatus::Pending,
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Summary of the repair pass run after a failed build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub attempted: bool,
    pub files_patched: Vec<String>,
    pub errors_before: usize,
    /// Errors of the build the repair was asked to fix.
    #[serde(default)]
    pub initial_errors: Vec<BuildError>,
    pub tokens_used: u64,
    pub succeeded: bool,
}

/// Observable state of one build-validation run.
///
/// Only the session's own task mutates a `BuildSession`; everyone else sees
/// published snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSession {
    pub id: String,
    pub status: SessionStatus,
    pub steps: Vec<BuildStep>,
    pub current_step_label: Option<String>,
    pub preview_url: Option<String>,
    pub repair_result: Option<RepairOutcome>,
    pub build_attempts: u32,
    pub file_count: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BuildSession {
    pub fn new(id: impl Into<String>, file_count: usize) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Initializing,
            steps: StepKind::ALL.iter().map(|k| BuildStep::new(*k)).collect(),
            current_step_label: None,
            preview_url: None,
            repair_result: None,
            build_attempts: 0,
            file_count,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn step(&self, kind: StepKind) -> &BuildStep {
        &self.steps[kind.index()]
    }

    pub fn step_mut(&mut self, kind: StepKind) -> &mut BuildStep {
        &mut self.steps[kind.index()]
    }

    pub fn begin_step(&mut self, kind: StepKind) {
        self.status = SessionStatus::Running;
        self.current_step_label = Some(kind.label().to_string());
        self.step_mut(kind).status = StepStatus::Running;
    }

    pub fn succeed_step(&mut self, kind: StepKind) {
        self.step_mut(kind).status = StepStatus::Success;
    }

    /// Mark `kind` as errored with `errors` as its latest error list.
    pub fn fail_step(&mut self, kind: StepKind, errors: Vec<BuildError>) {
        let step = self.step_mut(kind);
        step.status = StepStatus::Error;
        step.errors = errors;
    }

    pub fn log(&mut self, kind: StepKind, line: impl Into<String>) {
        self.step_mut(kind).logs.push(line.into());
    }

    pub fn complete(&mut self, preview_url: String) {
        self.status = SessionStatus::Completed;
        self.preview_url = Some(preview_url);
        self.current_step_label = None;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = SessionStatus::Failed;
        self.current_step_label = None;
        self.ended_at = Some(Utc::now());
    }

    /// Mark any running step as errored and end the session.
    pub fn cancel(&mut self) {
        for step in &mut self.steps {
            if step.status == StepStatus::Running {
                step.status = StepStatus::Error;
                step.logs.push("cancelled".to_string());
            }
        }
        self.fail();
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn running_step(&self) -> Option<&BuildStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }

    /// Share of steps finished successfully, as a percentage.
    pub fn percent(&self) -> u8 {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Success)
            .count();
        (done * 100 / self.steps.len()) as u8
    }

    /// All errors recorded across steps.
    pub fn errors(&self) -> impl Iterator<Item = &BuildError> {
        self.steps.iter().flat_map(|s| s.errors.iter())
    }
}
