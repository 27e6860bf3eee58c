use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::build::{BuildSession, SessionEvent};
use crate::generation::{GenerationProgress, GenerationResult};
use crate::ui::icons::{CHECK, COMPONENT, CROSS, PREVIEW, REPAIR, WARN};
use crate::ui::report::render_session;

/// Progress bar over the components of one generation run.
///
/// The bar is created hidden when `visible` is false so callers can drive it
/// unconditionally (JSON output, non-interactive runs).
pub struct GenerationProgressUI {
    bar: ProgressBar,
}

impl GenerationProgressUI {
    pub fn new(total_components: u64, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total_components)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_prefix("Components");
        bar.set_message("scaffolding...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn update(&self, progress: &GenerationProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.completed as u64);
        self.bar
            .set_message(format!("{}{}", COMPONENT, style(&progress.component).cyan()));
    }

    pub fn finish(&self, result: &GenerationResult) {
        self.bar.finish_and_clear();
        for outcome in &result.components {
            let marker = if outcome.used_fallback { WARN } else { CHECK };
            let note = if outcome.used_fallback {
                style(format!("fallback after {} attempt(s)", outcome.attempts)).yellow()
            } else {
                style(format!("score {}", outcome.score)).dim()
            };
            self.print_line(format!("  {}{} {}", marker, outcome.name, note));
        }
        for error in &result.errors {
            self.print_line(format!("  {}{}", CROSS, style(error).red()));
        }
    }

    /// Only called once the bar has been cleared.
    fn print_line(&self, msg: impl AsRef<str>) {
        if !self.bar.is_hidden() {
            eprintln!("{}", msg.as_ref());
        }
    }
}

/// Step bar for one build-validation session, driven by [`SessionEvent`]s.
pub struct BuildProgressUI {
    bar: ProgressBar,
}

impl BuildProgressUI {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(100)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:30.green/white}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_prefix("Build");
        bar.set_message("starting sandbox...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Apply one event. Returns `true` once the event ends the session.
    pub fn handle(&self, event: &SessionEvent) -> bool {
        match event {
            SessionEvent::Started { .. } => {
                self.bar.set_message("initializing sandbox...");
            }
            SessionEvent::Progress { step, percent, .. } => {
                self.bar.set_position(u64::from(*percent));
                self.bar.set_message(format!("{} done", step.label()));
            }
            SessionEvent::Complete { preview_url, .. } => {
                self.bar.set_position(100);
                self.bar
                    .finish_with_message(format!("{}{}", PREVIEW, style(preview_url).green()));
            }
            SessionEvent::Error { message, .. } => {
                self.bar
                    .abandon_with_message(format!("{}{}", CROSS, style(message).red()));
            }
            SessionEvent::Cancelled { .. } => {
                self.bar
                    .abandon_with_message(format!("{}{}", CROSS, style("cancelled").red()));
            }
        }
        event.is_terminal()
    }

    /// Print a summary of the final session below the bar.
    pub fn finish(&self, session: &BuildSession) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
        if self.bar.is_hidden() {
            return;
        }
        if let Some(repair) = &session.repair_result
            && repair.attempted
        {
            let outcome = if repair.succeeded {
                style("repaired").green()
            } else {
                style("repair did not fix the build").yellow()
            };
            eprintln!(
                "  {}{} ({} error(s), {} file(s) patched)",
                REPAIR,
                outcome,
                repair.errors_before,
                repair.files_patched.len()
            );
        }
        eprint!("{}", render_session(session));
    }
}
