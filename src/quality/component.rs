//! Per-component check subset, run by the orchestrator right after each
//! component is generated.

use serde::{Deserialize, Serialize};

use super::checks::{contains_placeholder_text, delimiters_balanced, images_missing_alt};
use super::report::{Check, ComponentReport, Severity, score_checks};

/// Source flavour of a stack's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStyle {
    /// JSX function components.
    React,
    /// Plain functions that build DOM nodes or return an HTML string.
    Vanilla,
}

impl ComponentStyle {
    fn renders_markup(self, source: &str) -> bool {
        let returns = source.contains("return") || source.contains("=>");
        match self {
            ComponentStyle::React => source.contains('<') && returns,
            ComponentStyle::Vanilla => {
                let builds_dom = source.contains("createElement(") || source.contains('<');
                let hands_back =
                    returns || source.contains(".innerHTML") || source.contains(".append");
                builds_dom && hands_back
            }
        }
    }

    fn markup_hint(self) -> &'static str {
        match self {
            ComponentStyle::React => "Return JSX from the component",
            ComponentStyle::Vanilla => "Build DOM nodes with createElement or return an HTML string",
        }
    }
}

pub fn validate_component(name: &str, source: &str, style: ComponentStyle) -> ComponentReport {
    let trimmed = source.trim();
    let exported = trimmed.contains("export default")
        || trimmed.contains(&format!("export function {}", name))
        || trimmed.contains(&format!("export const {}", name));
    let renders = style.renders_markup(trimmed);

    let checks = vec![
        Check::outcome(
            "not_empty",
            Severity::Error,
            !trimmed.is_empty(),
            "Component has content",
            "Component source is empty",
            "Return the full component source",
        ),
        Check::outcome(
            "exports_component",
            Severity::Error,
            exported,
            "Component is exported",
            format!("No export for {}", name),
            "Export the component (default or named)",
        ),
        Check::outcome(
            "balanced_delimiters",
            Severity::Error,
            delimiters_balanced(trimmed),
            "Brackets and braces are balanced",
            "Unbalanced brackets; output looks truncated",
            "Return the complete component without truncation",
        ),
        Check::outcome(
            "renders_markup",
            Severity::Error,
            renders,
            "Component renders markup",
            "Component does not return any markup",
            style.markup_hint(),
        ),
        Check::outcome(
            "no_eval",
            Severity::Error,
            !(trimmed.contains("eval(") || trimmed.contains("new Function(")),
            "No dynamic code evaluation",
            "Component uses eval or new Function",
            "Remove dynamic code evaluation",
        ),
        Check::outcome(
            "no_placeholder_text",
            Severity::Warning,
            !contains_placeholder_text(trimmed),
            "No placeholder copy",
            "Component contains placeholder text",
            "Write real, specific copy",
        ),
        Check::outcome(
            "images_have_alt",
            Severity::Warning,
            !images_missing_alt(trimmed),
            "Images have alt text",
            "Images without alt text",
            "Add alt attributes to every image",
        ),
        Check::outcome(
            "no_console_logs",
            Severity::Info,
            !trimmed.contains("console.log("),
            "No stray console.log calls",
            "console.log left in component",
            "Remove debug logging",
        ),
    ];

    ComponentReport {
        component: name.to_string(),
        score: score_checks(&checks),
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_good_component_scores_full() {
        let src = "export default function Hero() {\n  return (<section><h1>Fresh bread daily</h1><img src=\"/a.png\" alt=\"Loaf\" /></section>);\n}\n";
        let report = validate_component("Hero", src, ComponentStyle::React);
        assert_eq!(report.score, 100);
        assert!(report.failing_checks().is_empty());
    }

    #[test]
    fn test_truncated_component_fails() {
        let src = "export default function Hero() {\n  return (<section><h1>Fresh";
        let report = validate_component("Hero", src, ComponentStyle::React);
        assert_eq!(report.score, 85);
        assert!(!report.passes(90));
        assert!(report.failing_checks().iter().any(|c| c.starts_with("balanced_delimiters")));
    }

    #[test]
    fn test_empty_component_scores_low() {
        let report = validate_component("Hero", "   ", ComponentStyle::React);
        assert_eq!(report.score, 55);
        assert!(!report.passes(90));
    }

    #[test]
    fn test_vanilla_dom_component_renders_without_angle_brackets() {
        let src = "export default function Hero() {\n  const section = document.createElement('section');\n  const heading = document.createElement('h1');\n  heading.textContent = 'Fresh bread daily';\n  section.append(heading);\n  return section;\n}\n";
        let vanilla = validate_component("Hero", src, ComponentStyle::Vanilla);
        assert_eq!(vanilla.score, 100, "{:?}", vanilla.failing_checks());

        let react = validate_component("Hero", src, ComponentStyle::React);
        assert!(react.failing_checks().iter().any(|c| c.starts_with("renders_markup")));
    }

    #[test]
    fn test_vanilla_component_without_markup_fails() {
        let src = "export default function Hero() {\n  return 42;\n}\n";
        let report = validate_component("Hero", src, ComponentStyle::Vanilla);
        assert!(report.failing_checks().iter().any(|c| c.starts_with("renders_markup")));
    }
}
