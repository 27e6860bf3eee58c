//! Report types produced by the quality validator.
//!
//! - [`Severity`]: per-check severity, which doubles as the check's weight
//! - [`Check`]: one static pattern test and its outcome
//! - [`Category`]: the scored categories and their declared weights
//! - [`CategoryResult`]: the checks of one category plus its score
//! - [`ValidationReport`]: the full, immutable result of one validation
//! - [`ComponentReport`]: the result of the per-component check subset

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a check. Ordered from most to least critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Weight of a check of this severity in its category score.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Error => 3,
            Self::Warning => 2,
            Self::Info => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// A single static check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Check {
    pub fn new(
        name: impl Into<String>,
        severity: Severity,
        passed: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            severity,
            message: message.into(),
            fix: None,
        }
    }

    /// Build a check whose message and fix depend on the outcome. The fix is
    /// only attached to failed checks.
    pub fn outcome(
        name: &str,
        severity: Severity,
        passed: bool,
        ok_message: &str,
        fail_message: impl Into<String>,
        fix: &str,
    ) -> Self {
        if passed {
            Self::new(name, severity, true, ok_message)
        } else {
            Self::new(name, severity, false, fail_message).with_fix(fix)
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }
}

/// Scored categories. The first six are always evaluated; the rest only
/// when extended validation is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Structure,
    Code,
    Performance,
    Accessibility,
    Design,
    Content,
    Lint,
    Imports,
    DeadCode,
    TypeSafety,
}

impl Category {
    pub const CORE: [Category; 6] = [
        Self::Structure,
        Self::Code,
        Self::Performance,
        Self::Accessibility,
        Self::Design,
        Self::Content,
    ];

    pub const EXTENDED: [Category; 4] = [Self::Lint, Self::Imports, Self::DeadCode, Self::TypeSafety];

    pub fn weight(&self) -> u32 {
        match self {
            Self::Structure => 20,
            Self::Code => 25,
            Self::Performance => 15,
            Self::Accessibility => 15,
            Self::Design => 10,
            Self::Content => 15,
            Self::Lint => 10,
            Self::Imports => 10,
            Self::DeadCode => 5,
            Self::TypeSafety => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Code => "code",
            Self::Performance => "performance",
            Self::Accessibility => "accessibility",
            Self::Design => "design",
            Self::Content => "content",
            Self::Lint => "lint",
            Self::Imports => "imports",
            Self::DeadCode => "dead_code",
            Self::TypeSafety => "type_safety",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted pass ratio of `checks`, as a 0–100 score. An empty list scores 100.
pub fn score_checks(checks: &[Check]) -> u8 {
    let total: u32 = checks.iter().map(|c| c.severity.weight()).sum();
    if total == 0 {
        return 100;
    }
    let passed: u32 = checks
        .iter()
        .filter(|c| c.passed)
        .map(|c| c.severity.weight())
        .sum();
    (f64::from(passed) * 100.0 / f64::from(total)).round() as u8
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub score: u8,
    pub checks: Vec<Check>,
}

impl CategoryResult {
    pub fn from_checks(checks: Vec<Check>) -> Self {
        Self {
            score: score_checks(&checks),
            checks,
        }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// A failed check lifted out of its category for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub category: Category,
    pub check: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall_score: u8,
    pub passed: bool,
    pub categories: BTreeMap<Category, CategoryResult>,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// Assemble a report from scored categories.
    ///
    /// `overall_score` is the weight-normalized mean of the category scores;
    /// issues and recommendations are ordered by severity, then category.
    pub fn from_categories(categories: BTreeMap<Category, CategoryResult>, minimum_score: u8) -> Self {
        let total_weight: u32 = categories.keys().map(Category::weight).sum();
        let overall_score = if total_weight == 0 {
            100
        } else {
            let weighted: u32 = categories
                .iter()
                .map(|(cat, result)| cat.weight() * u32::from(result.score))
                .sum();
            (f64::from(weighted) / f64::from(total_weight)).round() as u8
        };

        let mut failed: Vec<(Category, &Check)> = categories
            .iter()
            .flat_map(|(cat, result)| result.failed_checks().map(move |c| (*cat, c)))
            .collect();
        failed.sort_by_key(|(cat, check)| (check.severity, *cat));

        let issues = failed
            .iter()
            .map(|(cat, check)| Issue {
                category: *cat,
                check: check.name.clone(),
                severity: check.severity,
                message: check.message.clone(),
            })
            .collect();

        let mut recommendations: Vec<String> = Vec::new();
        for (_, check) in &failed {
            if let Some(fix) = &check.fix
                && !recommendations.contains(fix)
            {
                recommendations.push(fix.clone());
            }
        }

        Self {
            overall_score,
            passed: overall_score >= minimum_score,
            categories,
            issues,
            recommendations,
        }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.get(&category)
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }
}

/// Result of the per-component check subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub component: String,
    pub score: u8,
    pub checks: Vec<Check>,
}

impl ComponentReport {
    pub fn passes(&self, minimum_score: u8) -> bool {
        self.score >= minimum_score
    }

    /// Names of the failed checks, used as "previous issues" on regeneration.
    pub fn failing_checks(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(severity: Severity, passed: bool) -> Check {
        Check::new("c", severity, passed, "m")
    }

    #[test]
    fn test_score_checks_weights_by_severity() {
        let checks = vec![check(Severity::Error, true), check(Severity::Info, false)];
        assert_eq!(score_checks(&checks), 75);
        let checks = vec![check(Severity::Warning, false), check(Severity::Info, true)];
        assert_eq!(score_checks(&checks), 33);
        assert_eq!(score_checks(&[]), 100);
    }

    #[test]
    fn test_outcome_attaches_fix_only_on_failure() {
        let ok = Check::outcome("x", Severity::Error, true, "fine", "broken", "fix it");
        assert!(ok.fix.is_none());
        assert_eq!(ok.message, "fine");
        let bad = Check::outcome("x", Severity::Error, false, "fine", "broken", "fix it");
        assert_eq!(bad.fix.as_deref(), Some("fix it"));
        assert_eq!(bad.message, "broken");
    }

    #[test]
    fn test_overall_is_weighted_mean() {
        let mut categories = BTreeMap::new();
        categories.insert(
            Category::Structure,
            CategoryResult::from_checks(vec![check(Severity::Error, false)]),
        );
        categories.insert(
            Category::Code,
            CategoryResult::from_checks(vec![check(Severity::Error, true)]),
        );
        let report = ValidationReport::from_categories(categories, 90);
        // (20 * 0 + 25 * 100) / 45
        assert_eq!(report.overall_score, 56);
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, Category::Structure);
    }

    #[test]
    fn test_recommendations_are_deduplicated_and_ordered() {
        let mut categories = BTreeMap::new();
        categories.insert(
            Category::Content,
            CategoryResult::from_checks(vec![
                Check::new("a", Severity::Info, false, "m").with_fix("info fix"),
                Check::new("b", Severity::Error, false, "m").with_fix("error fix"),
                Check::new("c", Severity::Error, false, "m").with_fix("error fix"),
            ]),
        );
        let report = ValidationReport::from_categories(categories, 90);
        assert_eq!(report.recommendations, vec!["error fix", "info fix"]);
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_component_report_failing_checks() {
        let report = ComponentReport {
            component: "Hero".into(),
            score: 50,
            checks: vec![
                Check::new("exports_component", Severity::Error, false, "no export"),
                Check::new("no_eval", Severity::Error, true, "ok"),
            ],
        };
        assert!(!report.passes(80));
        assert_eq!(report.failing_checks(), vec!["exports_component: no export"]);
    }
}
