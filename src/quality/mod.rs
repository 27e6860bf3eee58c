//! Static production-readiness scoring for generated projects.
//!
//! [`QualityValidator::validate`] is a pure function of its inputs: it runs a
//! fixed set of category evaluators over an [`ArtifactSet`], scores each
//! category as the severity-weighted pass ratio of its checks, and folds the
//! category scores into a weighted overall score.
//!
//! | Category        | Weight | Enabled            |
//! |-----------------|--------|--------------------|
//! | `structure`     | 20     | always             |
//! | `code`          | 25     | always             |
//! | `performance`   | 15     | always             |
//! | `accessibility` | 15     | always             |
//! | `design`        | 10     | always             |
//! | `content`       | 15     | always             |
//! | `lint`          | 10     | `extended = true`  |
//! | `imports`       | 10     | `extended = true`  |
//! | `dead_code`     | 5      | `extended = true`  |
//! | `type_safety`   | 5      | `extended = true`  |

pub mod checks;
pub mod component;
pub mod extended;
pub mod report;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactSet;
pub use component::{ComponentStyle, validate_component};
pub use report::{Category, CategoryResult, Check, ComponentReport, Issue, Severity, ValidationReport};

pub const DEFAULT_MINIMUM_SCORE: u8 = 90;
pub const DEFAULT_COMPONENT_MINIMUM_SCORE: u8 = 90;

/// What the caller knows about the project being validated.
///
/// Without a context the validator assumes a Node-style project with a
/// `package.json` manifest and a `src/main.*` or `src/index.*` entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub stack_id: Option<String>,
    /// Manifest file to parse, or `None` for stacks without one.
    pub manifest: Option<String>,
    /// Any one of these paths counts as the application entry point.
    pub entry_points: Vec<String>,
    pub required_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub minimum_score: u8,
    pub component_minimum_score: u8,
    pub extended: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            minimum_score: DEFAULT_MINIMUM_SCORE,
            component_minimum_score: DEFAULT_COMPONENT_MINIMUM_SCORE,
            extended: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    config: ValidatorConfig,
}

impl QualityValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(&self, artifacts: &ArtifactSet, context: Option<&SessionContext>) -> ValidationReport {
        let mut categories = BTreeMap::new();
        for category in Category::CORE {
            categories.insert(category, self.evaluate(category, artifacts, context));
        }
        if self.config.extended {
            for category in Category::EXTENDED {
                categories.insert(category, self.evaluate(category, artifacts, context));
            }
        }
        ValidationReport::from_categories(categories, self.config.minimum_score)
    }

    /// Run the per-component check subset against a single generated component.
    pub fn validate_component(&self, name: &str, source: &str, style: ComponentStyle) -> ComponentReport {
        component::validate_component(name, source, style)
    }

    pub fn component_passes(&self, report: &ComponentReport) -> bool {
        report.passes(self.config.component_minimum_score)
    }

    fn evaluate(
        &self,
        category: Category,
        artifacts: &ArtifactSet,
        context: Option<&SessionContext>,
    ) -> CategoryResult {
        let checks = match category {
            Category::Structure => checks::structure(artifacts, context),
            Category::Code => checks::code(artifacts),
            Category::Performance => checks::performance(artifacts, context),
            Category::Accessibility => checks::accessibility(artifacts),
            Category::Design => checks::design(artifacts),
            Category::Content => checks::content(artifacts),
            Category::Lint => extended::lint(artifacts),
            Category::Imports => extended::imports(artifacts, context),
            Category::DeadCode => extended::dead_code(artifacts),
            Category::TypeSafety => extended::type_safety(artifacts),
        };
        CategoryResult::from_checks(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polished_project() -> ArtifactSet {
        [
            (
                "package.json",
                r#"{"name": "bakery", "scripts": {"build": "vite build"}, "dependencies": {"react": "^18.3.1", "react-dom": "^18.3.1"}}"#,
            ),
            (
                "index.html",
                "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n<meta name=\"description\" content=\"Fresh bread\" />\n<title>Bakery</title>\n</head>\n<body><div id=\"root\"></div><script type=\"module\" src=\"/src/main.tsx\"></script></body>\n</html>\n",
            ),
            ("vite.config.ts", "export default {};\n"),
            ("README.md", "# Bakery\n\nRun `npm run dev`.\n"),
            (
                "src/main.tsx",
                "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\nimport './index.css';\n\ncreateRoot(document.getElementById('root')!).render(<React.StrictMode><App /></React.StrictMode>);\n",
            ),
            (
                "src/App.tsx",
                "import Hero from './components/Hero';\n\nexport default function App() {\n  return (\n    <main>\n      <Hero />\n    </main>\n  );\n}\n",
            ),
            (
                "src/components/Hero.tsx",
                "export default function Hero() {\n  return (\n    <header>\n      <h1>Fresh bread every morning</h1>\n      <img src=\"/loaf.png\" alt=\"Sourdough loaf\" loading=\"lazy\" />\n    </header>\n  );\n}\n",
            ),
            (
                "src/index.css",
                ":root {\n  --brand: #b45309;\n}\nbody {\n  font-family: system-ui, sans-serif;\n}\n@media (max-width: 640px) {\n  h1 { font-size: 2rem; }\n}\n",
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_polished_project_passes() {
        let report = QualityValidator::default().validate(&polished_project(), None);
        assert!(report.passed, "issues: {:?}", report.issues);
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.categories.len(), 6);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let validator = QualityValidator::new(ValidatorConfig {
            extended: true,
            ..ValidatorConfig::default()
        });
        let set = polished_project();
        assert_eq!(validator.validate(&set, None), validator.validate(&set, None));
    }

    #[test]
    fn test_missing_manifest_and_entry_fails_structure() {
        let mut set = ArtifactSet::new();
        for (path, content) in polished_project().iter() {
            if path != "package.json" && path != "src/main.tsx" {
                set.insert(path, content);
            }
        }
        let report = QualityValidator::default().validate(&set, None);
        let structure = report.category(Category::Structure).unwrap();
        assert!(structure.score < 50, "structure score {}", structure.score);
        assert!(!report.passed);
    }

    #[test]
    fn test_overall_score_is_weighted_mean_of_categories() {
        let validator = QualityValidator::new(ValidatorConfig {
            extended: true,
            ..ValidatorConfig::default()
        });
        let set: ArtifactSet = [("index.html", "<html><img src=\"x.png\"></html>")].into_iter().collect();
        let report = validator.validate(&set, None);
        let weight: u32 = report.categories.keys().map(Category::weight).sum();
        let weighted: u32 = report
            .categories
            .iter()
            .map(|(c, r)| c.weight() * u32::from(r.score))
            .sum();
        let expected = (f64::from(weighted) / f64::from(weight)).round() as u8;
        assert_eq!(report.overall_score, expected);
        assert!(report.overall_score <= 100);
        assert_eq!(report.categories.len(), 10);
    }

    #[test]
    fn test_empty_artifact_set_still_reports() {
        let report = QualityValidator::default().validate(&ArtifactSet::new(), None);
        assert!(!report.passed);
        assert!(!report.issues.is_empty());
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_extended_polished_project() {
        let validator = QualityValidator::new(ValidatorConfig {
            extended: true,
            ..ValidatorConfig::default()
        });
        let report = validator.validate(&polished_project(), None);
        let imports = report.category(Category::Imports).unwrap();
        assert_eq!(imports.score, 100, "{:?}", imports.checks);
        let dead = report.category(Category::DeadCode).unwrap();
        assert_eq!(dead.score, 100, "{:?}", dead.checks);
    }
}
