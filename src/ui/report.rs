//! Human-readable rendering of validation reports and build sessions.

use std::fmt::Write;

use console::style;

use crate::build::{BuildSession, StepStatus};
use crate::quality::{Severity, ValidationReport};
use crate::ui::icons::{CHECK, CROSS, PROGRESS, SPARKLE, WARN};

pub fn render_report(report: &ValidationReport, minimum_score: u8) -> String {
    let mut out = String::new();
    let verdict = if report.passed {
        format!("{}{}", CHECK, style("PASS").green().bold())
    } else {
        format!("{}{}", CROSS, style("FAIL").red().bold())
    };
    let _ = writeln!(
        out,
        "{}Overall score: {}/100 (minimum {}) {}",
        PROGRESS,
        style(report.overall_score).bold(),
        minimum_score,
        verdict
    );
    out.push('\n');

    for (category, result) in &report.categories {
        let failed = result.failed_checks().count();
        let score = if result.score >= minimum_score {
            style(result.score).green()
        } else {
            style(result.score).yellow()
        };
        let _ = writeln!(
            out,
            "  {:<14} {:>3}  ({}/{} checks passed)",
            category.as_str(),
            score,
            result.checks.len() - failed,
            result.checks.len()
        );
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out, "\nIssues:");
        for issue in &report.issues {
            let marker = match issue.severity {
                Severity::Error => CROSS,
                Severity::Warning | Severity::Info => WARN,
            };
            let _ = writeln!(
                out,
                "  {}[{}] {}/{}: {}",
                marker, issue.severity, issue.category, issue.check, issue.message
            );
        }
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for rec in &report.recommendations {
            let _ = writeln!(out, "  {}{}", SPARKLE, rec);
        }
    }
    out
}

pub fn render_session(session: &BuildSession) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Session {} [{}] {} file(s), {} build attempt(s)",
        session.id, session.status, session.file_count, session.build_attempts
    );
    for step in &session.steps {
        let marker = match step.status {
            StepStatus::Success => style("ok").green(),
            StepStatus::Error => style("error").red(),
            StepStatus::Running => style("running").cyan(),
            StepStatus::Pending => style("pending").dim(),
        };
        let _ = writeln!(out, "  {:<22} {}", step.name, marker);
        for error in &step.errors {
            let _ = writeln!(out, "      {}", error);
        }
    }
    if let Some(url) = &session.preview_url {
        let _ = writeln!(out, "Preview: {}", url);
    }
    out
}
