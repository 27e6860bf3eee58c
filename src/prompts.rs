//! Prompt builders for the AI service. Wording is not load-bearing; callers
//! only rely on each prompt carrying the context listed in its signature.

use crate::build::BuildError;
use crate::generation::{GenerationPlan, StackConfig};

fn project_header(plan: &GenerationPlan, stack: &StackConfig) -> String {
    format!(
        "## Project\n\
         **Name:** {}\n\
         **Description:** {}\n\
         **Stack:** {} ({})\n",
        plan.project_name, plan.description, stack.id, stack.language,
    )
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|i| format!("- {}\n", i)).collect()
}

/// Prompt for one required top-level file.
pub fn file_prompt(
    plan: &GenerationPlan,
    stack: &StackConfig,
    path: &str,
    purpose: &str,
    guidelines: &[String],
) -> String {
    let components = plan.component_identifiers();
    let component_note = if components.is_empty() {
        String::new()
    } else {
        format!(
            "\n## Components\nThese default-exported components exist under `{}/`:\n{}",
            stack.component_dir,
            bullet_list(&components),
        )
    };
    format!(
        "Write the file `{path}` for this project: {purpose}.\n\n\
         {header}{component_note}\n\
         ## Guidelines\n\
         {guidelines}\
         - Return only the file contents, no explanation.\n",
        header = project_header(plan, stack),
        guidelines = bullet_list(guidelines),
    )
}

/// Prompt for one component; `previous_issues` lists the checks the last
/// attempt failed.
pub fn component_prompt(
    plan: &GenerationPlan,
    stack: &StackConfig,
    identifier: &str,
    previous_issues: &[String],
) -> String {
    let retry_note = if previous_issues.is_empty() {
        String::new()
    } else {
        format!(
            "\n## Previous Issues\nThe last attempt failed these checks. Fix every one:\n{}",
            bullet_list(previous_issues),
        )
    };
    format!(
        "Write the `{identifier}` component as `{path}`.\n\n\
         {header}{retry_note}\n\
         ## Requirements\n\
         - Default-export a component named `{identifier}`.\n\
         - Written in {language}.\n\
         - Every image needs alt text; use real copy, never placeholder text.\n\
         - Return only the file contents, no explanation.\n",
        path = stack.component_path(identifier),
        header = project_header(plan, stack),
        language = stack.language,
    )
}

/// Prompt asking for a whole-file replacement that fixes `errors`.
pub fn repair_prompt(path: &str, content: &str, errors: &[BuildError]) -> String {
    let error_lines: Vec<String> = errors.iter().map(BuildError::to_string).collect();
    format!(
        "The project failed to build. Fix `{path}`.\n\n\
         ## Build Errors\n\
         {errors}\n\
         ## Current Contents of {path}\n\
         ```\n{content}\n```\n\n\
         Return the complete corrected file, not a diff, with no explanation.\n",
        errors = bullet_list(&error_lines),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ErrorKind;
    use crate::generation::StackRegistry;

    #[test]
    fn test_component_prompt_carries_previous_issues() {
        let registry = StackRegistry::builtin();
        let stack = registry.get("react-vite").unwrap();
        let plan = GenerationPlan::new("Bakery", "Fresh bread", "react-vite");
        let first = component_prompt(&plan, stack, "Hero", &[]);
        assert!(first.contains("src/components/Hero.tsx"));
        assert!(!first.contains("Previous Issues"));

        let retry = component_prompt(&plan, stack, "Hero", &["balanced_delimiters: truncated".into()]);
        assert!(retry.contains("Previous Issues"));
        assert!(retry.contains("balanced_delimiters"));
    }

    #[test]
    fn test_file_prompt_lists_components() {
        let registry = StackRegistry::builtin();
        let stack = registry.get("react-vite").unwrap();
        let plan = GenerationPlan::new("Bakery", "", "react-vite").with_components(["hero", "menu"]);
        let prompt = file_prompt(&plan, stack, "src/App.tsx", "the root component", &[]);
        assert!(prompt.contains("- Hero\n"));
        assert!(prompt.contains("- Menu\n"));
    }

    #[test]
    fn test_repair_prompt_includes_errors_and_content() {
        let errors = vec![BuildError {
            file: "src/App.tsx".into(),
            line: Some(12),
            column: None,
            message: "Unexpected token".into(),
            kind: ErrorKind::Syntax,
        }];
        let prompt = repair_prompt("src/App.tsx", "export default App", &errors);
        assert!(prompt.contains("src/App.tsx:12"));
        assert!(prompt.contains("export default App"));
    }
}
