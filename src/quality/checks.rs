//! The six core category evaluators.
//!
//! Each evaluator is a pure function over the artifact set that returns its
//! checks. Evaluators never fail: unreadable or malformed input simply
//! produces a failed check.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::SessionContext;
use super::report::{Check, Severity};
use crate::artifact::ArtifactSet;

pub(crate) const SOURCE_EXTS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];
pub(crate) const MARKUP_EXTS: &[&str] = &["html", "htm", "jsx", "tsx"];
pub(crate) const STYLE_EXTS: &[&str] = &["css", "scss", "sass", "less"];

const MAX_FILE_BYTES: usize = 100 * 1024;
const MAX_TOTAL_BYTES: usize = 2 * 1024 * 1024;

const PLACEHOLDER_PHRASES: &[&str] = &[
    "lorem ipsum",
    "dolor sit amet",
    "your text here",
    "your content here",
    "placeholder text",
    "[insert",
];

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<img\b[^>]*>").expect("valid regex"));
static EMPTY_BUTTON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<button\b([^>]*)>\s*</button>").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<html\b[^>]*>").expect("valid regex"));
static INPUT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<input\b[^>]*>").expect("valid regex"));
static SCRIPT_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<script\b[^>]*\bsrc=[^>]*>").expect("valid regex"));
static VAR_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bvar\s+[A-Za-z_$]").expect("valid regex"));
static INLINE_BASE64: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/[a-z+]+;base64,[A-Za-z0-9+/=]{1000,}").expect("valid regex")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>\s*([^<]*?)\s*</title>").expect("valid regex"));
static RESPONSIVE_UTILITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(sm|md|lg|xl):[a-z]").expect("valid regex"));
static CSS_CUSTOM_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[a-zA-Z][\w-]*\s*:").expect("valid regex"));

// ── Shared helpers ───────────────────────────────────────────────────

fn files_with<'a>(artifacts: &'a ArtifactSet, exts: &'a [&'a str]) -> Vec<(&'a str, &'a str)> {
    artifacts.with_extensions(exts).collect()
}

fn any_content(files: &[(&str, &str)], needle: &str) -> bool {
    files.iter().any(|(_, c)| c.contains(needle))
}

fn offenders<'a>(files: &[(&'a str, &'a str)], mut pred: impl FnMut(&str) -> bool) -> Vec<&'a str> {
    files
        .iter()
        .filter(|(_, c)| pred(c))
        .map(|(p, _)| *p)
        .collect()
}

fn list(paths: &[&str]) -> String {
    const SHOWN: usize = 5;
    let mut out = paths.iter().take(SHOWN).copied().collect::<Vec<_>>().join(", ");
    if paths.len() > SHOWN {
        out.push_str(&format!(" and {} more", paths.len() - SHOWN));
    }
    out
}

/// Whether `(){}[]` are balanced, ignoring string literals and comments.
/// Single- and double-quoted strings end at a newline so stray apostrophes in
/// JSX text cannot swallow the rest of the file.
pub(crate) fn delimiters_balanced(source: &str) -> bool {
    let chars: Vec<char> = source.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 1;
            }
            '"' | '\'' | '`' => {
                let quote = c;
                i += 1;
                while i < chars.len() {
                    match chars[i] {
                        '\\' => i += 1,
                        '\n' if quote != '`' => break,
                        ch if ch == quote => break,
                        _ => {}
                    }
                    i += 1;
                }
            }
            '(' | '{' | '[' => stack.push(c),
            ')' | '}' | ']' => {
                let expected = match c {
                    ')' => '(',
                    '}' => '{',
                    _ => '[',
                };
                if stack.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    stack.is_empty()
}

pub(crate) fn contains_placeholder_text(content: &str) -> bool {
    let lower = content.to_lowercase();
    PLACEHOLDER_PHRASES.iter().any(|p| lower.contains(p))
}

pub(crate) fn images_missing_alt(content: &str) -> bool {
    IMG_TAG.find_iter(content).any(|m| !m.as_str().contains("alt="))
}

fn manifest_path(context: Option<&SessionContext>) -> Option<&str> {
    match context {
        Some(ctx) => ctx.manifest.as_deref(),
        None => Some("package.json"),
    }
}

fn parse_manifest(artifacts: &ArtifactSet, context: Option<&SessionContext>) -> Option<Result<Value, String>> {
    let path = manifest_path(context)?;
    let raw = match artifacts.get(path) {
        Some(raw) => raw,
        None => return Some(Err(format!("{} is missing", path))),
    };
    Some(match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(format!("{} is not a JSON object", path)),
        Err(e) => Err(format!("{} is not valid JSON: {}", path, e)),
    })
}

// ── Structure ────────────────────────────────────────────────────────

pub fn structure(artifacts: &ArtifactSet, context: Option<&SessionContext>) -> Vec<Check> {
    let mut checks = Vec::new();

    if let Some(manifest) = manifest_path(context) {
        checks.push(Check::outcome(
            "manifest_present",
            Severity::Error,
            artifacts.contains(manifest),
            "Project manifest present",
            format!("{} is missing", manifest),
            "Add a package manifest declaring name, scripts and dependencies",
        ));

        let parsed = parse_manifest(artifacts, context);
        let manifest_error = match &parsed {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        };
        checks.push(Check::outcome(
            "manifest_valid",
            Severity::Error,
            manifest_error.is_none(),
            "Manifest parses as a JSON object",
            manifest_error.unwrap_or_default(),
            "Fix the manifest so it is valid JSON",
        ));

        let has_build = matches!(
            &parsed,
            Some(Ok(v)) if v.pointer("/scripts/build").and_then(Value::as_str).is_some()
        );
        checks.push(Check::outcome(
            "build_script_declared",
            Severity::Warning,
            has_build,
            "Build script declared",
            "Manifest declares no `build` script",
            "Declare a `build` script in the manifest",
        ));
    }

    let entry_present = match context {
        Some(ctx) if !ctx.entry_points.is_empty() => {
            ctx.entry_points.iter().any(|p| artifacts.contains(p))
        }
        _ => artifacts
            .with_extensions(SOURCE_EXTS)
            .any(|(p, _)| p.starts_with("src/main.") || p.starts_with("src/index.")),
    };
    checks.push(Check::outcome(
        "entry_point_present",
        Severity::Error,
        entry_present,
        "Application entry point present",
        "No application entry point (e.g. src/main.tsx) found",
        "Add the application entry module",
    ));

    checks.push(Check::outcome(
        "html_entry_present",
        Severity::Warning,
        artifacts.contains("index.html"),
        "index.html present",
        "index.html is missing",
        "Add an index.html document shell",
    ));

    if let Some(ctx) = context
        && !ctx.required_files.is_empty()
    {
        let missing: Vec<&str> = ctx
            .required_files
            .iter()
            .map(String::as_str)
            .filter(|p| !artifacts.contains(p))
            .collect();
        checks.push(Check::outcome(
            "required_files_present",
            Severity::Error,
            missing.is_empty(),
            "All required files present",
            format!("Missing required files: {}", list(&missing)),
            "Generate every file the plan requires",
        ));
    }

    checks.push(Check::outcome(
        "readme_present",
        Severity::Info,
        artifacts.paths().any(|p| p.eq_ignore_ascii_case("readme.md")),
        "README present",
        "README.md is missing",
        "Add a README describing how to run the project",
    ));

    let sources = files_with(artifacts, SOURCE_EXTS);
    let organized = sources.len() <= 3 || sources.iter().any(|(p, _)| p.contains("/components/"));
    checks.push(Check::outcome(
        "components_organized",
        Severity::Info,
        organized,
        "Source files are organized into modules",
        "All source files live in a single directory",
        "Move reusable UI into a components/ directory",
    ));

    checks
}

// ── Code ─────────────────────────────────────────────────────────────

pub fn code(artifacts: &ArtifactSet) -> Vec<Check> {
    let sources = files_with(artifacts, SOURCE_EXTS);
    let mut checks = Vec::new();

    checks.push(Check::outcome(
        "source_files_present",
        Severity::Error,
        !sources.is_empty(),
        "Source files present",
        "No JavaScript/TypeScript sources found",
        "Generate the application source files",
    ));

    let unbalanced = offenders(&sources, |c| !delimiters_balanced(c));
    checks.push(Check::outcome(
        "balanced_delimiters",
        Severity::Error,
        unbalanced.is_empty(),
        "Brackets and braces are balanced",
        format!("Unbalanced delimiters in {}", list(&unbalanced)),
        "Regenerate truncated or malformed source files",
    ));

    let eval_users = offenders(&sources, |c| c.contains("eval(") || c.contains("new Function("));
    checks.push(Check::outcome(
        "no_eval",
        Severity::Error,
        eval_users.is_empty(),
        "No dynamic code evaluation",
        format!("Dynamic code evaluation in {}", list(&eval_users)),
        "Remove eval/new Function usage",
    ));

    let loggers = offenders(&sources, |c| c.contains("console.log("));
    checks.push(Check::outcome(
        "no_console_logs",
        Severity::Warning,
        loggers.is_empty(),
        "No stray console.log calls",
        format!("console.log left in {}", list(&loggers)),
        "Remove debug logging",
    ));

    let todos = offenders(&sources, |c| c.contains("TODO") || c.contains("FIXME"));
    checks.push(Check::outcome(
        "no_todo_markers",
        Severity::Info,
        todos.is_empty(),
        "No TODO/FIXME markers",
        format!("Unfinished work markers in {}", list(&todos)),
        "Resolve TODO/FIXME markers",
    ));

    let vars = offenders(&sources, |c| VAR_DECL.is_match(c));
    checks.push(Check::outcome(
        "no_var_declarations",
        Severity::Info,
        vars.is_empty(),
        "Uses let/const declarations",
        format!("`var` declarations in {}", list(&vars)),
        "Replace `var` with `let` or `const`",
    ));

    let unhandled = offenders(&sources, |c| {
        (c.contains("fetch(") || c.contains("await ")) && !c.contains("catch")
    });
    checks.push(Check::outcome(
        "async_errors_handled",
        Severity::Info,
        unhandled.is_empty(),
        "Async operations handle errors",
        format!("Async code without error handling in {}", list(&unhandled)),
        "Wrap network calls in try/catch or .catch()",
    ));

    checks
}

// ── Performance ──────────────────────────────────────────────────────

pub fn performance(artifacts: &ArtifactSet, context: Option<&SessionContext>) -> Vec<Check> {
    let mut checks = Vec::new();

    let oversized: Vec<&str> = artifacts
        .iter()
        .filter(|(_, c)| c.len() > MAX_FILE_BYTES)
        .map(|(p, _)| p)
        .collect();
    checks.push(Check::outcome(
        "file_sizes_reasonable",
        Severity::Warning,
        oversized.is_empty(),
        "No oversized files",
        format!("Files over {}KB: {}", MAX_FILE_BYTES / 1024, list(&oversized)),
        "Split large files into smaller modules",
    ));

    let all: Vec<(&str, &str)> = artifacts.iter().collect();
    let inline = offenders(&all, |c| INLINE_BASE64.is_match(c));
    checks.push(Check::outcome(
        "no_inline_base64_assets",
        Severity::Warning,
        inline.is_empty(),
        "No large inline base64 assets",
        format!("Large inline base64 assets in {}", list(&inline)),
        "Serve images as separate asset files",
    ));

    let markup = files_with(artifacts, MARKUP_EXTS);
    let eager = offenders(&markup, |c| {
        IMG_TAG.find_iter(c).any(|m| !m.as_str().contains("loading="))
    });
    checks.push(Check::outcome(
        "images_lazy_loaded",
        Severity::Info,
        eager.is_empty(),
        "Images declare a loading strategy",
        format!("Images without loading=\"lazy\" in {}", list(&eager)),
        "Add loading=\"lazy\" to below-the-fold images",
    ));

    let html = files_with(artifacts, &["html", "htm"]);
    let blocking = offenders(&html, |c| {
        SCRIPT_SRC.find_iter(c).any(|m| {
            let tag = m.as_str();
            !(tag.contains("defer") || tag.contains("async") || tag.contains("type=\"module\""))
        })
    });
    checks.push(Check::outcome(
        "no_blocking_scripts",
        Severity::Warning,
        blocking.is_empty(),
        "Scripts load without blocking rendering",
        format!("Render-blocking scripts in {}", list(&blocking)),
        "Load scripts with defer, async or type=\"module\"",
    ));

    if manifest_path(context).is_some() {
        let bundler = artifacts.paths().any(|p| {
            p.starts_with("vite.config.") || p.starts_with("webpack.config.") || p.starts_with("rollup.config.")
        });
        checks.push(Check::outcome(
            "build_tooling_configured",
            Severity::Info,
            bundler,
            "Bundler configuration present",
            "No bundler configuration found",
            "Add a bundler config (e.g. vite.config.ts) for optimized builds",
        ));
    }

    checks.push(Check::outcome(
        "total_size_reasonable",
        Severity::Info,
        artifacts.total_bytes() <= MAX_TOTAL_BYTES,
        "Total project size is reasonable",
        format!("Project sources exceed {}MB", MAX_TOTAL_BYTES / (1024 * 1024)),
        "Remove generated or duplicated content",
    ));

    checks
}

// ── Accessibility ────────────────────────────────────────────────────

pub fn accessibility(artifacts: &ArtifactSet) -> Vec<Check> {
    let markup = files_with(artifacts, MARKUP_EXTS);
    let mut checks = Vec::new();

    let no_alt = offenders(&markup, images_missing_alt);
    checks.push(Check::outcome(
        "images_have_alt",
        Severity::Error,
        no_alt.is_empty(),
        "All images have alt text",
        format!("Images without alt text in {}", list(&no_alt)),
        "Add descriptive alt attributes to every image",
    ));

    let html = files_with(artifacts, &["html", "htm"]);
    let no_lang = offenders(&html, |c| {
        HTML_TAG.find_iter(c).any(|m| !m.as_str().contains("lang="))
    });
    checks.push(Check::outcome(
        "html_lang_set",
        Severity::Warning,
        no_lang.is_empty(),
        "Document language declared",
        format!("<html> without lang attribute in {}", list(&no_lang)),
        "Add lang=\"en\" (or the right language) to <html>",
    ));

    let unlabelled = offenders(&markup, |c| {
        EMPTY_BUTTON
            .captures_iter(c)
            .any(|cap| !cap.get(1).is_some_and(|attrs| attrs.as_str().contains("aria-label")))
    });
    checks.push(Check::outcome(
        "buttons_labelled",
        Severity::Warning,
        unlabelled.is_empty(),
        "Buttons have accessible names",
        format!("Empty buttons without aria-label in {}", list(&unlabelled)),
        "Give icon-only buttons an aria-label",
    ));

    let landmarks = ["<main", "<header", "<nav", "<footer"]
        .iter()
        .any(|tag| any_content(&markup, tag));
    checks.push(Check::outcome(
        "semantic_landmarks",
        Severity::Info,
        landmarks,
        "Semantic landmarks used",
        "No <main>, <header>, <nav> or <footer> landmarks found",
        "Structure pages with semantic landmark elements",
    ));

    let inputs = offenders(&markup, |c| {
        let has_input = INPUT_TAG.find_iter(c).any(|m| {
            let tag = m.as_str();
            !(tag.contains("type=\"hidden\"") || tag.contains("type=\"submit\""))
        });
        has_input && !(c.contains("<label") || c.contains("aria-label"))
    });
    checks.push(Check::outcome(
        "form_inputs_labelled",
        Severity::Warning,
        inputs.is_empty(),
        "Form inputs are labelled",
        format!("Inputs without labels in {}", list(&inputs)),
        "Associate every input with a <label> or aria-label",
    ));

    checks
}

// ── Design ───────────────────────────────────────────────────────────

pub fn design(artifacts: &ArtifactSet) -> Vec<Check> {
    let html = files_with(artifacts, &["html", "htm"]);
    let styles = files_with(artifacts, STYLE_EXTS);
    let markup = files_with(artifacts, MARKUP_EXTS);
    let tailwind = artifacts.find_prefixed("tailwind.config.").is_some();
    let mut checks = Vec::new();

    checks.push(Check::outcome(
        "viewport_meta",
        Severity::Error,
        any_content(&html, "name=\"viewport\""),
        "Viewport meta tag present",
        "No viewport meta tag; layout will not adapt to mobile screens",
        "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
    ));

    checks.push(Check::outcome(
        "stylesheet_present",
        Severity::Warning,
        !styles.is_empty() || tailwind,
        "Styles present",
        "No stylesheet or utility-CSS configuration found",
        "Add a stylesheet for the application",
    ));

    let responsive = any_content(&styles, "@media")
        || any_content(&styles, "clamp(")
        || markup.iter().any(|(_, c)| RESPONSIVE_UTILITY.is_match(c));
    checks.push(Check::outcome(
        "responsive_markers",
        Severity::Warning,
        responsive,
        "Responsive layout rules present",
        "No media queries or responsive utilities found",
        "Add media queries or responsive utility classes",
    ));

    let tokens = tailwind || styles.iter().any(|(_, c)| CSS_CUSTOM_PROPERTY.is_match(c));
    checks.push(Check::outcome(
        "design_tokens",
        Severity::Info,
        tokens,
        "Design tokens defined",
        "No CSS custom properties or theme configuration",
        "Define colors and spacing as CSS custom properties",
    ));

    checks.push(Check::outcome(
        "typography_defined",
        Severity::Info,
        tailwind || any_content(&styles, "font-family"),
        "Typography defined",
        "No font-family declared",
        "Declare a font stack",
    ));

    checks
}

// ── Content ──────────────────────────────────────────────────────────

pub fn content(artifacts: &ArtifactSet) -> Vec<Check> {
    let html = files_with(artifacts, &["html", "htm"]);
    let mut text_files = files_with(artifacts, MARKUP_EXTS);
    text_files.extend(files_with(artifacts, &["js", "ts", "md", "json"]));
    let mut checks = Vec::new();

    let placeholders = offenders(&text_files, contains_placeholder_text);
    checks.push(Check::outcome(
        "no_placeholder_text",
        Severity::Error,
        placeholders.is_empty(),
        "No placeholder copy",
        format!("Placeholder text found in {}", list(&placeholders)),
        "Replace placeholder copy with real content",
    ));

    let titled = html.iter().any(|(_, c)| {
        TITLE
            .captures(c)
            .and_then(|cap| cap.get(1))
            .is_some_and(|t| !t.as_str().is_empty())
    });
    checks.push(Check::outcome(
        "document_title",
        Severity::Warning,
        titled,
        "Document has a title",
        "No non-empty <title> found",
        "Give the document a descriptive <title>",
    ));

    checks.push(Check::outcome(
        "meta_description",
        Severity::Info,
        any_content(&html, "name=\"description\""),
        "Meta description present",
        "No meta description",
        "Add a <meta name=\"description\"> summary",
    ));

    let dead = offenders(&text_files, |c| c.contains("href=\"#\""));
    checks.push(Check::outcome(
        "no_dead_links",
        Severity::Info,
        dead.is_empty(),
        "No dead links",
        format!("href=\"#\" links in {}", list(&dead)),
        "Point links at real destinations",
    ));

    checks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiters_balanced() {
        assert!(delimiters_balanced("function a() { return [1, 2]; }"));
        assert!(!delimiters_balanced("function a() { return [1, 2]; "));
        assert!(!delimiters_balanced("a)("));
        assert!(delimiters_balanced("const s = \"{ not a brace\"; // }\n/* ( */"));
        assert!(delimiters_balanced("<p>Don't stop</p>\nconst x = {a: 1};"));
        assert!(delimiters_balanced("const t = `${a} }`;"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(contains_placeholder_text("<p>Lorem Ipsum dolor</p>"));
        assert!(!contains_placeholder_text("<input placeholder=\"Email\" />"));
    }

    #[test]
    fn test_images_missing_alt() {
        assert!(images_missing_alt("<img src=\"a.png\">"));
        assert!(!images_missing_alt("<img src={logo} alt=\"Logo\" />"));
        assert!(!images_missing_alt("<div></div>"));
    }

    #[test]
    fn test_malformed_manifest_is_a_failed_check() {
        let set: ArtifactSet = [("package.json", "{ not json")].into_iter().collect();
        let checks = structure(&set, None);
        let valid = checks.iter().find(|c| c.name == "manifest_valid").unwrap();
        assert!(!valid.passed);
        assert!(valid.message.contains("not valid JSON"));
    }

    #[test]
    fn test_structure_without_manifest_requirement() {
        let ctx = SessionContext {
            manifest: None,
            entry_points: vec!["index.html".into()],
            ..SessionContext::default()
        };
        let set: ArtifactSet = [("index.html", "<html></html>")].into_iter().collect();
        let checks = structure(&set, Some(&ctx));
        assert!(checks.iter().all(|c| !c.name.starts_with("manifest")));
        assert!(checks.iter().find(|c| c.name == "entry_point_present").unwrap().passed);
    }

    #[test]
    fn test_blocking_scripts_flagged() {
        let set: ArtifactSet = [(
            "index.html",
            "<html lang=\"en\"><script src=\"app.js\"></script></html>",
        )]
        .into_iter()
        .collect();
        let checks = performance(&set, None);
        assert!(!checks.iter().find(|c| c.name == "no_blocking_scripts").unwrap().passed);
    }
}
