//! Sandbox execution environment: an isolated place to mount a project,
//! install its dependencies, build it, and serve a preview.

pub mod config;
pub mod process;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactSet;
use crate::errors::SandboxError;
pub use config::SandboxConfig;
pub use process::ProcessSandbox;

/// Opaque identifier for one booted sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxHandle(pub String);

impl SandboxHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of running the build command. A failed build is not an error at
/// this layer; `success` carries the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub success: bool,
    /// Human-readable summary for the step log.
    pub logs: String,
    /// Combined stdout and stderr, fed to the error parser.
    pub raw_output: String,
}

/// Abstraction over the sandbox for testability.
/// Real implementation: `ProcessSandbox`. Tests use scripted doubles.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn boot(&self) -> Result<SandboxHandle, SandboxError>;

    /// Write `artifacts` into the sandbox, replacing whatever was mounted before.
    async fn mount(&self, handle: &SandboxHandle, artifacts: &ArtifactSet) -> Result<(), SandboxError>;

    /// Returns the install logs. A failed install is an error.
    async fn install_dependencies(&self, handle: &SandboxHandle) -> Result<String, SandboxError>;

    async fn build(&self, handle: &SandboxHandle) -> Result<BuildOutput, SandboxError>;

    /// Start the preview server and return its URL.
    async fn start_server(&self, handle: &SandboxHandle) -> Result<String, SandboxError>;

    /// Release everything held for `handle`. Tearing down an unknown or
    /// already torn-down handle is a no-op.
    async fn teardown(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sandbox double shared by unit tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    /// Replays queued build outputs; once the queue is empty every build
    /// succeeds. `hang_on_build` makes builds block until cancelled.
    pub struct ScriptedSandbox {
        builds: Mutex<VecDeque<BuildOutput>>,
        pub install_error: Option<String>,
        pub hang_on_build: bool,
        pub mounts: Mutex<Vec<ArtifactSet>>,
        pub build_calls: AtomicU32,
        pub teardowns: AtomicU32,
    }

    impl ScriptedSandbox {
        pub fn new(builds: Vec<BuildOutput>) -> Self {
            Self {
                builds: Mutex::new(builds.into()),
                install_error: None,
                hang_on_build: false,
                mounts: Mutex::new(Vec::new()),
                build_calls: AtomicU32::new(0),
                teardowns: AtomicU32::new(0),
            }
        }

        pub fn failing_build(raw_output: &str) -> BuildOutput {
            BuildOutput {
                success: false,
                logs: "build failed".into(),
                raw_output: raw_output.into(),
            }
        }

        pub fn build_count(&self) -> u32 {
            self.build_calls.load(Ordering::SeqCst)
        }

        pub fn teardown_count(&self) -> u32 {
            self.teardowns.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn boot(&self) -> Result<SandboxHandle, SandboxError> {
            Ok(SandboxHandle("scripted".into()))
        }

        async fn mount(&self, _handle: &SandboxHandle, artifacts: &ArtifactSet) -> Result<(), SandboxError> {
            self.mounts.lock().unwrap().push(artifacts.clone());
            Ok(())
        }

        async fn install_dependencies(&self, _handle: &SandboxHandle) -> Result<String, SandboxError> {
            match &self.install_error {
                Some(message) => Err(SandboxError::CommandFailed {
                    command: "npm install".into(),
                    message: message.clone(),
                }),
                None => Ok("added 42 packages".into()),
            }
        }

        async fn build(&self, _handle: &SandboxHandle) -> Result<BuildOutput, SandboxError> {
            self.build_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_on_build {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let next = self.builds.lock().unwrap().pop_front();
            Ok(next.unwrap_or(BuildOutput {
                success: true,
                logs: "built in 1.2s".into(),
                raw_output: String::new(),
            }))
        }

        async fn start_server(&self, _handle: &SandboxHandle) -> Result<String, SandboxError> {
            Ok("http://127.0.0.1:4173".into())
        }

        async fn teardown(&self, _handle: &SandboxHandle) -> Result<(), SandboxError> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
