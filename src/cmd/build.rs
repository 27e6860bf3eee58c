//! `genforge build`: one sandbox build-validation session with live progress.

use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use genforge::build::{
    SandboxBuildValidator, SessionEvent, SessionStatus, ValidationSessionRegistry,
};
use genforge::sandbox::{ProcessSandbox, Sandbox};
use genforge::ui::BuildProgressUI;

use super::super::{Cli, ScoringArgs};
use super::score::load_artifacts;

/// Returns whether the session completed.
pub async fn cmd_build(cli: &Cli, project_dir: &Path, path: &Path, serve: bool) -> Result<bool> {
    let config = super::load_config(cli, project_dir, ScoringArgs::default())?;
    let artifacts = load_artifacts(path)?;
    if artifacts.is_empty() {
        bail!("No files found at {}", path.display());
    }

    let ai = super::build_ai(&config)?;
    let sandbox: Arc<dyn Sandbox> = Arc::new(ProcessSandbox::new(config.sandbox_config().clone()));
    let registry = Arc::new(ValidationSessionRegistry::new());
    let validator =
        SandboxBuildValidator::new(sandbox, ai, Arc::clone(&registry), config.build_settings());

    // Subscribe before starting so the first events are not missed.
    let mut events = registry.subscribe_all();
    let ui = BuildProgressUI::new(console::user_attended_stderr());
    let id = validator.start(artifacts).await;

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.session_id() == id => {
                    if ui.handle(&event) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(session_id = %id, "interrupted, cancelling build session");
                interrupted = true;
                break;
            }
        }
    }

    let session = if interrupted {
        let session = validator.cancel(&id).await?;
        ui.handle(&SessionEvent::Cancelled {
            session_id: id.clone(),
        });
        session
    } else {
        registry.wait(&id).await?
    };
    ui.finish(&session);
    println!("{}", serde_json::to_string_pretty(&session)?);

    let completed = session.status == SessionStatus::Completed && !interrupted;
    if completed
        && serve
        && let Some(url) = &session.preview_url
    {
        eprintln!("Serving preview at {} (Ctrl-C to stop)", url);
        tokio::signal::ctrl_c().await?;
    }

    registry.shutdown().await;
    Ok(completed)
}
