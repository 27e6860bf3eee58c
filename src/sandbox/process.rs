use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::{BuildOutput, Sandbox, SandboxConfig, SandboxHandle};
use crate::artifact::{ArtifactSet, safe_relative_path};
use crate::errors::SandboxError;

/// Directories left in place when a sandbox is remounted.
const PRESERVED_ON_REMOUNT: &[&str] = &["node_modules"];

/// Lines of command output kept in step logs.
const LOG_TAIL_LINES: usize = 40;

/// A spawned command's process group, killed as a whole on drop.
///
/// Commands run as `sh -c`, so the tools they start (npm, vite, ...) are
/// grandchildren that killing the shell alone would leave running.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// A running preview server and the group of processes it started.
struct ServerProcess {
    child: Child,
    group: ProcessGroup,
}

impl ServerProcess {
    async fn stop(mut self) -> std::io::Result<()> {
        self.group.kill();
        self.child.kill().await
    }
}

struct SandboxState {
    dir: PathBuf,
    server: Option<ServerProcess>,
}

/// [`Sandbox`] backed by a per-handle working directory and shell commands.
///
/// Install, build and serve commands come from [`SandboxConfig`] and run
/// through `sh -c` with the configured environment.
pub struct ProcessSandbox {
    config: SandboxConfig,
    sandboxes: Arc<Mutex<HashMap<String, SandboxState>>>,
}

/// Outcome of a shell command with both streams captured.
struct CommandOutput {
    success: bool,
    code: Option<i32>,
    combined: String,
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Reject paths that would escape the sandbox directory.
fn checked_relative_path(path: &str) -> Result<PathBuf, SandboxError> {
    safe_relative_path(path).ok_or_else(|| SandboxError::InvalidPath(path.to_string()))
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            sandboxes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Working directory of a live sandbox.
    pub async fn dir(&self, handle: &SandboxHandle) -> Result<PathBuf, SandboxError> {
        let sandboxes = self.sandboxes.lock().await;
        sandboxes
            .get(handle.as_str())
            .map(|s| s.dir.clone())
            .ok_or_else(|| SandboxError::UnknownHandle(handle.to_string()))
    }

    /// `sh -c command` in `dir`, leading a new process group.
    fn shell(&self, command: &str, dir: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(dir)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Run `command` to completion. Dropping the returned future (timeout or
    /// cancellation) kills everything the command started.
    async fn run_shell(&self, command: &str, dir: &Path) -> Result<CommandOutput, SandboxError> {
        tracing::debug!(command, dir = %dir.display(), "running sandbox command");
        let child = self
            .shell(command, dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let _group = ProcessGroup::of(&child);
        let output = child.wait_with_output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            combined,
        })
    }

    async fn clear_dir(dir: &Path) -> Result<(), SandboxError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if PRESERVED_ON_REMOUNT.iter().any(|p| name == *p) {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Pick a port the OS reports as free right now.
    fn free_port() -> Result<u16, SandboxError> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        Ok(listener.local_addr()?.port())
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn boot(&self) -> Result<SandboxHandle, SandboxError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = self.config.work_root().join(&id);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(sandbox = %id, dir = %dir.display(), "sandbox booted");

        let mut sandboxes = self.sandboxes.lock().await;
        sandboxes.insert(id.clone(), SandboxState { dir, server: None });
        Ok(SandboxHandle(id))
    }

    async fn mount(&self, handle: &SandboxHandle, artifacts: &ArtifactSet) -> Result<(), SandboxError> {
        let files = artifacts
            .iter()
            .map(|(path, content)| Ok((checked_relative_path(path)?, content)))
            .collect::<Result<Vec<_>, SandboxError>>()?;

        let dir = self.dir(handle).await?;
        Self::clear_dir(&dir).await?;
        for (relative, content) in files {
            let target = dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
        }
        tracing::debug!(sandbox = %handle, files = artifacts.len(), "artifacts mounted");
        Ok(())
    }

    async fn install_dependencies(&self, handle: &SandboxHandle) -> Result<String, SandboxError> {
        let dir = self.dir(handle).await?;
        let output = self.run_shell(&self.config.install_cmd, &dir).await?;
        if !output.success {
            return Err(SandboxError::CommandFailed {
                command: self.config.install_cmd.clone(),
                message: format!(
                    "exit code {:?}\n{}",
                    output.code,
                    tail(&output.combined, LOG_TAIL_LINES)
                ),
            });
        }
        Ok(tail(&output.combined, LOG_TAIL_LINES))
    }

    async fn build(&self, handle: &SandboxHandle) -> Result<BuildOutput, SandboxError> {
        let dir = self.dir(handle).await?;
        let output = self.run_shell(&self.config.build_cmd, &dir).await?;
        let summary = if output.success {
            format!("`{}` succeeded", self.config.build_cmd)
        } else {
            format!("`{}` failed with exit code {:?}", self.config.build_cmd, output.code)
        };
        Ok(BuildOutput {
            success: output.success,
            logs: format!("{}\n{}", summary, tail(&output.combined, LOG_TAIL_LINES)),
            raw_output: output.combined,
        })
    }

    async fn start_server(&self, handle: &SandboxHandle) -> Result<String, SandboxError> {
        let dir = self.dir(handle).await?;
        let port = Self::free_port()?;
        let command = self.config.serve_command(port);

        let mut child = self
            .shell(&command, &dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let group = ProcessGroup::of(&child);

        // Wait until the port accepts connections or the server exits.
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(SandboxError::CommandFailed {
                    command,
                    message: format!("preview server exited early with {}", status),
                });
            }
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let url = format!("http://127.0.0.1:{}", port);
        let mut sandboxes = self.sandboxes.lock().await;
        match sandboxes.get_mut(handle.as_str()) {
            Some(state) => {
                if let Some(previous) = state.server.replace(ServerProcess { child, group })
                    && let Err(e) = previous.stop().await
                {
                    tracing::warn!(sandbox = %handle, error = %e, "failed to stop previous preview server");
                }
            }
            None => return Err(SandboxError::UnknownHandle(handle.to_string())),
        }
        tracing::info!(sandbox = %handle, url = %url, "preview server started");
        Ok(url)
    }

    async fn teardown(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let state = {
            let mut sandboxes = self.sandboxes.lock().await;
            sandboxes.remove(handle.as_str())
        };
        let Some(mut state) = state else {
            tracing::debug!(sandbox = %handle, "teardown of unknown sandbox ignored");
            return Ok(());
        };

        if let Some(server) = state.server.take()
            && let Err(e) = server.stop().await
        {
            tracing::warn!(sandbox = %handle, error = %e, "failed to kill preview server");
        }
        match tokio::fs::remove_dir_all(&state.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(sandbox = %handle, "sandbox torn down");
        Ok(())
    }
}
