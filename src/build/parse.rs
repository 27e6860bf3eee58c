//! Turn raw build output into [`BuildError`]s.
//!
//! Only lines mentioning "error" are considered. From each one the parser
//! takes the first path with a known source extension, a line/column from
//! either `file:12:5`, `file(12,5)` or "line 12"/"column 5" tokens, and the
//! text following the "error" token as the message.

use std::sync::LazyLock;

use regex::Regex;

use super::session::{BuildError, ErrorKind};
use crate::artifact::{ArtifactSet, normalize_path};

static ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

static FILE_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([\w@./-]*[\w-]\.(?:tsx|ts|jsx|js|mjs|cjs|css|scss|json|html|vue|svelte)\b)(?:[:(](\d+)(?:[:,](\d+))?)?",
    )
    .expect("valid regex")
});

static LINE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bline\s+(\d+)").expect("valid regex"));

static COLUMN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcol(?:umn)?\s+(\d+)").expect("valid regex"));

static ERROR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error\b\]?:?").expect("valid regex"));

static NO_ERRORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:0|no) errors?\b").expect("valid regex"));

fn classify(line: &str) -> ErrorKind {
    let lower = line.to_lowercase();
    if ["syntaxerror", "unexpected token", "unterminated", "parse error", "expected \""]
        .iter()
        .any(|k| lower.contains(k))
    {
        ErrorKind::Syntax
    } else if [
        "module not found",
        "cannot find module",
        "could not resolve",
        "failed to resolve import",
        "can't resolve",
    ]
    .iter()
    .any(|k| lower.contains(k))
    {
        ErrorKind::Dependency
    } else if ["typeerror", "referenceerror", "rangeerror"]
        .iter()
        .any(|k| lower.contains(k))
    {
        ErrorKind::Runtime
    } else {
        ErrorKind::Build
    }
}

fn parse_line(line: &str) -> Option<BuildError> {
    if !line.to_lowercase().contains("error") || NO_ERRORS.is_match(line) {
        return None;
    }

    let (mut file, mut line_no, mut column) = (String::new(), None, None);
    if let Some(caps) = FILE_POSITION.captures(line) {
        file = normalize_path(&caps[1]);
        line_no = caps.get(2).and_then(|m| m.as_str().parse().ok());
        column = caps.get(3).and_then(|m| m.as_str().parse().ok());
    }
    if line_no.is_none() {
        line_no = LINE_WORD.captures(line).and_then(|c| c[1].parse().ok());
    }
    if column.is_none() {
        column = COLUMN_WORD.captures(line).and_then(|c| c[1].parse().ok());
    }

    let message = match ERROR_TOKEN.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line.trim(),
    };
    let message = if message.is_empty() { line.trim() } else { message };

    Some(BuildError {
        file,
        line: line_no,
        column,
        message: message.to_string(),
        kind: classify(line),
    })
}

/// Parse every error line in `output`, dropping exact duplicates.
pub fn parse_build_output(output: &str) -> Vec<BuildError> {
    let clean = ANSI.replace_all(output, "");
    let mut errors: Vec<BuildError> = Vec::new();
    for line in clean.lines() {
        if let Some(error) = parse_line(line)
            && !errors.contains(&error)
        {
            errors.push(error);
        }
    }
    errors
}

/// Map a reported file to a path in `artifacts`. Tools often report paths
/// relative to some other root or as absolute sandbox paths, so a suffix
/// match on a path boundary is accepted.
pub fn resolve_file(reported: &str, artifacts: &ArtifactSet) -> Option<String> {
    if reported.is_empty() {
        return None;
    }
    let normalized = normalize_path(reported);
    if artifacts.contains(&normalized) {
        return Some(normalized);
    }
    artifacts
        .paths()
        .filter(|p| normalized.ends_with(&format!("/{}", p)))
        .max_by_key(|p| p.len())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_with_line_word() {
        let errors = parse_build_output("SyntaxError: Unexpected token at src/App.tsx line 12");
        assert_eq!(errors.len(), 1);
        let err = &errors[0];
        assert_eq!(err.file, "src/App.tsx");
        assert_eq!(err.line, Some(12));
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.message, "Unexpected token at src/App.tsx line 12");
    }

    #[test]
    fn test_tsc_style_position() {
        let errors = parse_build_output("src/components/Hero.tsx(7,15): error TS2304: Cannot find name 'Foo'.");
        let err = &errors[0];
        assert_eq!(err.file, "src/components/Hero.tsx");
        assert_eq!((err.line, err.column), (Some(7), Some(15)));
        assert_eq!(err.kind, ErrorKind::Build);
        assert_eq!(err.message, "TS2304: Cannot find name 'Foo'.");
    }

    #[test]
    fn test_colon_position_and_dependency_kind() {
        let out = "\x1b[31m✘ [ERROR]\x1b[0m Could not resolve \"lucide-react\" in ./src/App.tsx:3:21";
        let err = &parse_build_output(out)[0];
        assert_eq!(err.file, "src/App.tsx");
        assert_eq!((err.line, err.column), (Some(3), Some(21)));
        assert_eq!(err.kind, ErrorKind::Dependency);
        assert!(err.message.starts_with("Could not resolve"));
    }

    #[test]
    fn test_runtime_kind_and_column_word() {
        let err = &parse_build_output("TypeError: x is not a function (src/main.ts line 4 column 9)")[0];
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert_eq!((err.line, err.column), (Some(4), Some(9)));
    }

    #[test]
    fn test_ignores_non_error_lines_and_duplicates() {
        let out = "vite v5.4.0 building for production...\n\
                   Found 0 errors.\n\
                   error: build failed\n\
                   error: build failed\n";
        let errors = parse_build_output(out);
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].has_file());
        assert_eq!(errors[0].message, "build failed");
    }

    #[test]
    fn test_resolve_file() {
        let artifacts: ArtifactSet = [("src/App.tsx", ""), ("App.tsx", "")].into_iter().collect();
        assert_eq!(resolve_file("./src/App.tsx", &artifacts).as_deref(), Some("src/App.tsx"));
        assert_eq!(
            resolve_file("/tmp/genforge/abc/src/App.tsx", &artifacts).as_deref(),
            Some("src/App.tsx")
        );
        assert_eq!(resolve_file("src/Other.tsx", &artifacts), None);
        assert_eq!(resolve_file("", &artifacts), None);
    }
}
