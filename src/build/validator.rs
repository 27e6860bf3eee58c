use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::events::{SessionEvent, publish};
use super::parse::{parse_build_output, resolve_file};
use super::registry::ValidationSessionRegistry;
use super::session::{BuildError, BuildSession, RepairOutcome, StepKind};
use crate::ai::AiService;
use crate::artifact::ArtifactSet;
use crate::artifact::recover::{extract_code, recover_artifacts};
use crate::errors::{SandboxError, SessionError};
use crate::prompts;
use crate::sandbox::{BuildOutput, Sandbox, SandboxHandle};

/// Characters of raw build output kept when no structured error was found.
const RAW_OUTPUT_TAIL: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSettings {
    /// Limit for each sandbox operation and each repair request.
    pub op_timeout: Duration,
    pub repair_max_output_tokens: u32,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(300),
            repair_max_output_tokens: 8000,
        }
    }
}

/// Why a session stopped before completing.
#[derive(Debug)]
enum Halt {
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
enum OpError {
    Cancelled,
    Sandbox(SandboxError),
}

/// Await a sandbox operation under a cancellation token and a timeout.
async fn guarded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    step: StepKind,
    op: impl Future<Output = Result<T, SandboxError>>,
) -> Result<T, OpError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OpError::Cancelled),
        result = tokio::time::timeout(timeout, op) => match result {
            Ok(result) => result.map_err(OpError::Sandbox),
            Err(_) => Err(OpError::Sandbox(SandboxError::Timeout {
                operation: step.label().to_string(),
                secs: timeout.as_secs(),
            })),
        },
    }
}

/// Runs build-validation sessions: boot, mount, install, build (with one
/// AI repair and one retry), serve.
///
/// Each `start` spawns one task that owns the session; progress is readable
/// through the shared [`ValidationSessionRegistry`].
pub struct SandboxBuildValidator {
    sandbox: Arc<dyn Sandbox>,
    ai: Arc<dyn AiService>,
    registry: Arc<ValidationSessionRegistry>,
    settings: BuildSettings,
}

impl SandboxBuildValidator {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        ai: Arc<dyn AiService>,
        registry: Arc<ValidationSessionRegistry>,
        settings: BuildSettings,
    ) -> Self {
        Self {
            sandbox,
            ai,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ValidationSessionRegistry> {
        &self.registry
    }

    /// Start validating `artifacts` in the background and return the session id.
    pub async fn start(&self, artifacts: ArtifactSet) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = BuildSession::new(id.clone(), artifacts.len());
        let (snapshots, snapshot_rx) = watch::channel(session.clone());
        let cancel = CancellationToken::new();

        let task = SessionTask {
            session,
            artifacts,
            handle: None,
            snapshots,
            events: self.registry.event_sender(),
            cancel: cancel.clone(),
            sandbox: Arc::clone(&self.sandbox),
            ai: Arc::clone(&self.ai),
            settings: self.settings,
        };
        let join = tokio::spawn(task.run());
        self.registry.register(id.clone(), snapshot_rx, cancel, join).await;
        tracing::info!(session_id = %id, "validation session started");
        id
    }

    pub async fn status(&self, id: &str) -> Result<BuildSession, SessionError> {
        self.registry.status(id).await
    }

    pub async fn cancel(&self, id: &str) -> Result<BuildSession, SessionError> {
        self.registry.cancel(id).await
    }
}

/// The single writer of one [`BuildSession`].
struct SessionTask {
    session: BuildSession,
    artifacts: ArtifactSet,
    handle: Option<SandboxHandle>,
    snapshots: watch::Sender<BuildSession>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    sandbox: Arc<dyn Sandbox>,
    ai: Arc<dyn AiService>,
    settings: BuildSettings,
}

impl SessionTask {
    async fn run(mut self) {
        let id = self.session.id.clone();
        publish(&self.events, SessionEvent::Started { session_id: id.clone() });

        match self.execute().await {
            Ok(preview_url) => {
                self.session.complete(preview_url.clone());
                self.snapshot();
                tracing::info!(session_id = %id, url = %preview_url, "validation session completed");
                publish(
                    &self.events,
                    SessionEvent::Complete {
                        session_id: id.clone(),
                        file_count: self.artifacts.len(),
                        preview_url,
                    },
                );
                // Keep the preview alive until the session is cancelled or removed.
                self.cancel.cancelled().await;
                self.teardown().await;
            }
            Err(Halt::Cancelled) => {
                self.teardown().await;
                self.session.cancel();
                self.snapshot();
                tracing::info!(session_id = %id, "validation session cancelled");
                publish(&self.events, SessionEvent::Cancelled { session_id: id });
            }
            Err(Halt::Failed(message)) => {
                self.teardown().await;
                self.session.fail();
                self.snapshot();
                tracing::warn!(session_id = %id, error = %message, "validation session failed");
                publish(&self.events, SessionEvent::Error { session_id: id, message });
            }
        }
    }

    async fn execute(&mut self) -> Result<String, Halt> {
        let timeout = self.settings.op_timeout;

        self.begin(StepKind::InitializeSandbox);
        let booted = guarded(&self.cancel, timeout, StepKind::InitializeSandbox, self.sandbox.boot()).await;
        let handle = self.check(StepKind::InitializeSandbox, booted)?;
        self.handle = Some(handle.clone());
        self.log(StepKind::InitializeSandbox, format!("sandbox {} ready", handle));
        self.succeed(StepKind::InitializeSandbox);

        self.begin(StepKind::MountArtifacts);
        let mounted = guarded(
            &self.cancel,
            timeout,
            StepKind::MountArtifacts,
            self.sandbox.mount(&handle, &self.artifacts),
        )
        .await;
        self.check(StepKind::MountArtifacts, mounted)?;
        self.log(StepKind::MountArtifacts, format!("mounted {} files", self.artifacts.len()));
        self.succeed(StepKind::MountArtifacts);

        self.begin(StepKind::InstallDependencies);
        let installed = guarded(
            &self.cancel,
            timeout,
            StepKind::InstallDependencies,
            self.sandbox.install_dependencies(&handle),
        )
        .await;
        let logs = self.check(StepKind::InstallDependencies, installed)?;
        self.log(StepKind::InstallDependencies, logs);
        self.succeed(StepKind::InstallDependencies);

        self.begin(StepKind::Build);
        self.build_with_repair(&handle).await?;
        self.succeed(StepKind::Build);

        self.begin(StepKind::StartPreviewServer);
        let served = guarded(
            &self.cancel,
            timeout,
            StepKind::StartPreviewServer,
            self.sandbox.start_server(&handle),
        )
        .await;
        let url = self.check(StepKind::StartPreviewServer, served)?;
        self.log(StepKind::StartPreviewServer, format!("preview at {}", url));
        self.succeed(StepKind::StartPreviewServer);
        Ok(url)
    }

    /// Build; on failure repair the reported files once and build again.
    async fn build_with_repair(&mut self, handle: &SandboxHandle) -> Result<(), Halt> {
        let first = self.attempt_build(handle).await?;
        if first.success {
            return Ok(());
        }

        let errors = errors_from(&first);
        tracing::warn!(
            session_id = %self.session.id,
            errors = errors.len(),
            "build failed, attempting repair"
        );
        self.session.step_mut(StepKind::Build).errors = errors.clone();
        self.log(StepKind::Build, format!("build failed with {} error(s)", errors.len()));

        let mut outcome = self.repair(&errors).await?;
        if outcome.files_patched.is_empty() {
            self.session.repair_result = Some(outcome);
            return Err(self.fail_build(errors, "build failed and no reported file could be repaired"));
        }

        self.log(StepKind::Build, format!("remounting with {} repaired file(s)", outcome.files_patched.len()));
        let remounted = guarded(
            &self.cancel,
            self.settings.op_timeout,
            StepKind::Build,
            self.sandbox.mount(handle, &self.artifacts),
        )
        .await;
        if let Err(halt) = self.check(StepKind::Build, remounted) {
            self.session.repair_result = Some(outcome);
            return Err(halt);
        }

        let second = match self.attempt_build(handle).await {
            Ok(second) => second,
            Err(halt) => {
                self.session.repair_result = Some(outcome);
                return Err(halt);
            }
        };
        outcome.succeeded = second.success;
        self.session.repair_result = Some(outcome);

        if second.success {
            self.session.step_mut(StepKind::Build).errors.clear();
            self.log(StepKind::Build, "build succeeded after repair");
            Ok(())
        } else {
            Err(self.fail_build(errors_from(&second), "build failed again after repair"))
        }
    }

    async fn attempt_build(&mut self, handle: &SandboxHandle) -> Result<BuildOutput, Halt> {
        self.session.build_attempts += 1;
        let attempt = self.session.build_attempts;
        let built = guarded(
            &self.cancel,
            self.settings.op_timeout,
            StepKind::Build,
            self.sandbox.build(handle),
        )
        .await;
        let output = self.check(StepKind::Build, built)?;
        self.log(StepKind::Build, format!("attempt {}: {}", attempt, output.logs));
        Ok(output)
    }

    fn fail_build(&mut self, errors: Vec<BuildError>, message: &str) -> Halt {
        self.session.fail_step(StepKind::Build, errors);
        self.log(StepKind::Build, message);
        Halt::Failed(message.to_string())
    }

    /// Ask the AI for a whole-file replacement of every file with a
    /// resolvable error, one request per file.
    async fn repair(&mut self, errors: &[BuildError]) -> Result<RepairOutcome, Halt> {
        let mut outcome = RepairOutcome {
            attempted: true,
            errors_before: errors.len(),
            initial_errors: errors.to_vec(),
            ..RepairOutcome::default()
        };

        let mut by_file: BTreeMap<String, Vec<BuildError>> = BTreeMap::new();
        for error in errors {
            if let Some(path) = resolve_file(&error.file, &self.artifacts) {
                by_file.entry(path).or_default().push(error.clone());
            }
        }

        for (path, file_errors) in by_file {
            let Some(current) = self.artifacts.get(&path).map(str::to_string) else {
                continue;
            };
            let prompt = prompts::repair_prompt(&path, &current, &file_errors);
            let request = tokio::time::timeout(
                self.settings.op_timeout,
                self.ai.ask(&prompt, self.settings.repair_max_output_tokens),
            );
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Cancelled),
                response = request => response,
            };

            match response {
                Ok(Ok(response)) => {
                    outcome.tokens_used += response.tokens_used;
                    let replacement = replacement_for(&path, &response.text);
                    if replacement.trim().is_empty() || replacement == current {
                        self.log(StepKind::Build, format!("repair of {} produced no change", path));
                        continue;
                    }
                    self.artifacts.insert(&path, replacement);
                    self.log(StepKind::Build, format!("repaired {}", path));
                    outcome.files_patched.push(path);
                }
                Ok(Err(e)) => {
                    tracing::warn!(session_id = %self.session.id, path = %path, error = %e, "repair request failed");
                    self.log(StepKind::Build, format!("repair of {} failed: {}", path, e));
                }
                Err(_) => {
                    self.log(StepKind::Build, format!("repair of {} timed out", path));
                }
            }
        }

        Ok(outcome)
    }

    /// Record a failed operation on `step`.
    fn check<T>(&mut self, step: StepKind, result: Result<T, OpError>) -> Result<T, Halt> {
        match result {
            Ok(value) => Ok(value),
            Err(OpError::Cancelled) => Err(Halt::Cancelled),
            Err(OpError::Sandbox(error)) => {
                self.session.fail_step(step, vec![BuildError::general(error.to_string())]);
                self.snapshot();
                Err(Halt::Failed(format!("{}: {}", step.label(), error)))
            }
        }
    }

    async fn teardown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::time::timeout(self.settings.op_timeout, self.sandbox.teardown(&handle)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.session.id, error = %e, "sandbox teardown failed")
            }
            Err(_) => tracing::warn!(session_id = %self.session.id, "sandbox teardown timed out"),
        }
    }

    fn begin(&mut self, step: StepKind) {
        tracing::debug!(session_id = %self.session.id, step = step.label(), "step started");
        self.session.begin_step(step);
        self.snapshot();
    }

    fn succeed(&mut self, step: StepKind) {
        self.session.succeed_step(step);
        self.snapshot();
        publish(
            &self.events,
            SessionEvent::Progress {
                session_id: self.session.id.clone(),
                step,
                percent: self.session.percent(),
            },
        );
    }

    fn log(&mut self, step: StepKind, line: impl Into<String>) {
        self.session.log(step, line);
        self.snapshot();
    }

    fn snapshot(&self) {
        self.snapshots.send_replace(self.session.clone());
    }
}

/// Structured errors from a failed build, or one general error carrying the
/// tail of the output when nothing could be parsed.
fn errors_from(output: &BuildOutput) -> Vec<BuildError> {
    let errors = parse_build_output(&output.raw_output);
    if !errors.is_empty() {
        return errors;
    }
    let raw = output.raw_output.trim();
    let start = raw.floor_char_boundary(raw.len().saturating_sub(RAW_OUTPUT_TAIL));
    let tail = &raw[start..];
    if tail.is_empty() {
        vec![BuildError::general("build failed with no output")]
    } else {
        vec![BuildError::general(tail)]
    }
}

/// The replacement text for `path` from an AI reply: a JSON files map
/// naming the path if the reply is one, otherwise the reply as code.
fn replacement_for(path: &str, reply: &str) -> String {
    if let Some(artifacts) = recover_artifacts(reply).into_artifacts()
        && let Some(content) = artifacts.get(path)
    {
        return content.to_string();
    }
    extract_code(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiResponse;
    use crate::ai::testing::{HangingAi, ScriptedAi};
    use crate::build::session::{ErrorKind, SessionStatus, StepStatus};
    use crate::sandbox::testing::ScriptedSandbox;

    const BROKEN_APP: &str = "export default function App() {\n  return <main><h1>Hi</h1></main>\n";
    const FIXED_APP: &str = "export default function App() {\n  return <main><h1>Hi</h1></main>;\n}\n";
    const SYNTAX_ERROR: &str = "SyntaxError: Unexpected token at src/App.tsx line 12";

    fn artifacts() -> ArtifactSet {
        [("package.json", "{}"), ("src/App.tsx", BROKEN_APP)]
            .into_iter()
            .collect()
    }

    fn validator(sandbox: Arc<ScriptedSandbox>, ai: Arc<ScriptedAi>) -> SandboxBuildValidator {
        SandboxBuildValidator::new(
            sandbox,
            ai,
            Arc::new(ValidationSessionRegistry::new()),
            BuildSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_successful_build_exposes_preview_url() {
        let sandbox = Arc::new(ScriptedSandbox::new(Vec::new()));
        let ai = Arc::new(ScriptedAi::new(Vec::new()));
        let validator = validator(sandbox.clone(), ai.clone());

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.preview_url.as_deref(), Some("http://127.0.0.1:4173"));
        assert!(session.steps.iter().all(|s| s.status == StepStatus::Success));
        assert_eq!(session.build_attempts, 1);
        assert!(session.repair_result.is_none());
        assert_eq!(ai.call_count(), 0);
        // Preview stays up until the session is removed.
        assert_eq!(sandbox.teardown_count(), 0);
        validator.registry().remove(&id).await.unwrap();
        assert_eq!(sandbox.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_repaired_and_retried_once() {
        let sandbox = Arc::new(ScriptedSandbox::new(vec![ScriptedSandbox::failing_build(SYNTAX_ERROR)]));
        let ai = Arc::new(ScriptedAi::new(vec![Ok(AiResponse::new(
            format!("```tsx\n{}```", FIXED_APP),
            120,
        ))]));
        let validator = validator(sandbox.clone(), ai.clone());

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.build_attempts, 2);
        assert_eq!(sandbox.build_count(), 2);
        let repair = session.repair_result.as_ref().unwrap();
        assert!(repair.attempted && repair.succeeded);
        assert_eq!(repair.files_patched, vec!["src/App.tsx".to_string()]);
        assert_eq!(repair.errors_before, 1);
        assert_eq!(repair.tokens_used, 120);

        let prompt = ai.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("src/App.tsx:12"));
        let mounts = sandbox.mounts.lock().unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[1].get("src/App.tsx"), Some(FIXED_APP));
    }

    #[tokio::test]
    async fn test_second_build_failure_is_terminal() {
        let sandbox = Arc::new(ScriptedSandbox::new(vec![
            ScriptedSandbox::failing_build(SYNTAX_ERROR),
            ScriptedSandbox::failing_build("src/App.tsx:3:1 error: still broken"),
            ScriptedSandbox::failing_build("never reached"),
        ]));
        let ai = Arc::new(ScriptedAi::always(FIXED_APP));
        let validator = validator(sandbox.clone(), ai);

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(sandbox.build_count(), 2);
        let build = session.step(StepKind::Build);
        assert_eq!(build.status, StepStatus::Error);
        // Only the second attempt's errors are kept on the step.
        assert_eq!(build.errors.len(), 1);
        assert_eq!(build.errors[0].message, "still broken");
        assert_eq!(build.errors[0].line, Some(3));
        assert_eq!(build.errors[0].kind, ErrorKind::Build);
        let repair = session.repair_result.as_ref().unwrap();
        assert!(!repair.succeeded);
        assert_eq!(repair.initial_errors.len(), 1);
        assert_eq!(repair.initial_errors[0].kind, ErrorKind::Syntax);
        assert_eq!(session.step(StepKind::StartPreviewServer).status, StepStatus::Pending);
        assert!(session.preview_url.is_none());
        assert_eq!(sandbox.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_errors_skip_repair() {
        let sandbox = Arc::new(ScriptedSandbox::new(vec![ScriptedSandbox::failing_build(
            "error: out of memory",
        )]));
        let ai = Arc::new(ScriptedAi::always(FIXED_APP));
        let validator = validator(sandbox.clone(), ai.clone());

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(ai.call_count(), 0);
        assert_eq!(sandbox.build_count(), 1);
        let repair = session.repair_result.as_ref().unwrap();
        assert!(repair.files_patched.is_empty());
        assert_eq!(session.step(StepKind::Build).errors[0].kind, ErrorKind::Build);
    }

    #[tokio::test]
    async fn test_install_failure_stops_before_build() {
        let mut scripted = ScriptedSandbox::new(Vec::new());
        scripted.install_error = Some("npm ERR! 404 not found".into());
        let sandbox = Arc::new(scripted);
        let validator = validator(sandbox.clone(), Arc::new(ScriptedAi::new(Vec::new())));

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        let install = session.step(StepKind::InstallDependencies);
        assert_eq!(install.status, StepStatus::Error);
        assert!(install.errors[0].message.contains("404"));
        assert_eq!(sandbox.build_count(), 0);
        assert_eq!(session.step(StepKind::Build).status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_during_build_tears_down() {
        let mut scripted = ScriptedSandbox::new(Vec::new());
        scripted.hang_on_build = true;
        let sandbox = Arc::new(scripted);
        let validator = validator(sandbox.clone(), Arc::new(ScriptedAi::new(Vec::new())));
        let mut events = validator.registry().subscribe_all();

        let id = validator.start(artifacts()).await;
        while sandbox.build_count() == 0 {
            tokio::task::yield_now().await;
        }

        let session = validator.cancel(&id).await.unwrap();
        assert!(session.running_step().is_none());
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.step(StepKind::Build).status, StepStatus::Error);
        assert_eq!(sandbox.teardown_count(), 1);
        assert!(matches!(validator.status(&id).await, Err(SessionError::NotFound(_))));

        let mut saw_cancelled = false;
        while let Ok(event) = events.try_recv() {
            if event == (SessionEvent::Cancelled { session_id: id.clone() }) {
                saw_cancelled = true;
            }
        }
        assert!(saw_cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_repair_request() {
        let sandbox = Arc::new(ScriptedSandbox::new(vec![ScriptedSandbox::failing_build(SYNTAX_ERROR)]));
        let ai = Arc::new(HangingAi::default());
        let validator = SandboxBuildValidator::new(
            sandbox.clone(),
            ai.clone(),
            Arc::new(ValidationSessionRegistry::new()),
            BuildSettings::default(),
        );

        let id = validator.start(artifacts()).await;
        while ai.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        let session = tokio::time::timeout(Duration::from_secs(5), validator.cancel(&id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.running_step().is_none());
        let build = session.step(StepKind::Build);
        assert_eq!(build.status, StepStatus::Error);
        assert!(build.logs.iter().any(|l| l == "cancelled"));
        assert_eq!(sandbox.build_count(), 1);
        assert_eq!(sandbox.mounts.lock().unwrap().len(), 1);
        assert_eq!(sandbox.teardown_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_timeout_fails_step() {
        let mut scripted = ScriptedSandbox::new(Vec::new());
        scripted.hang_on_build = true;
        let sandbox = Arc::new(scripted);
        let validator = SandboxBuildValidator::new(
            sandbox.clone(),
            Arc::new(ScriptedAi::new(Vec::new())),
            Arc::new(ValidationSessionRegistry::new()),
            BuildSettings {
                op_timeout: Duration::from_secs(5),
                repair_max_output_tokens: 100,
            },
        );

        let id = validator.start(artifacts()).await;
        let session = validator.registry().wait(&id).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        let build = session.step(StepKind::Build);
        assert_eq!(build.errors[0].kind, ErrorKind::Build);
        assert!(build.errors[0].message.contains("timed out"));
        assert_eq!(sandbox.build_count(), 1);
    }

    #[tokio::test]
    async fn test_events_follow_session_lifecycle() {
        let sandbox = Arc::new(ScriptedSandbox::new(Vec::new()));
        let validator = validator(sandbox, Arc::new(ScriptedAi::new(Vec::new())));
        let mut events = validator.registry().subscribe_all();

        let id = validator.start(artifacts()).await;
        validator.registry().wait(&id).await.unwrap();

        let mut received = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            let terminal = event.is_terminal();
            received.push(event);
            if terminal {
                break;
            }
        }
        assert_eq!(received[0], SessionEvent::Started { session_id: id.clone() });
        let percents: Vec<u8> = received
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![20, 40, 60, 80, 100]);
        assert!(matches!(
            received.last(),
            Some(SessionEvent::Complete { file_count: 2, .. })
        ));
    }

    #[test]
    fn test_replacement_prefers_files_map() {
        let reply = r#"{"files": {"src/App.tsx": "export default 1;\n"}}"#;
        assert_eq!(replacement_for("src/App.tsx", reply), "export default 1;\n");
        assert_eq!(replacement_for("src/App.tsx", "```ts\nexport default 2;\n```"), "export default 2;\n");
    }

    #[test]
    fn test_errors_from_unparsable_output() {
        let output = ScriptedSandbox::failing_build("Killed");
        let errors = errors_from(&output);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Killed");
        assert!(!errors[0].has_file());
    }
}
