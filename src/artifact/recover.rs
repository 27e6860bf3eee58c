//! Parse-or-recover boundary for AI output.
//!
//! All heuristic cleanup of model responses lives here so the rest of the
//! pipeline only ever sees a typed [`ParseOutcome`] or clean code text.
//! Swapping in a stricter output contract means changing this module only.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ArtifactSet;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing-comma regex"));

/// Result of turning a model response into an [`ArtifactSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Response was well-formed.
    Parsed(ArtifactSet),
    /// Response needed repair; warnings describe what was changed.
    Recovered(ArtifactSet, Vec<String>),
    /// Nothing usable could be extracted.
    Failed(String),
}

impl ParseOutcome {
    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        match self {
            Self::Parsed(set) | Self::Recovered(set, _) => Some(set),
            Self::Failed(_) => None,
        }
    }

    pub fn into_artifacts(self) -> Option<ArtifactSet> {
        match self {
            Self::Parsed(set) | Self::Recovered(set, _) => Some(set),
            Self::Failed(_) => None,
        }
    }
}

/// Parse a multi-file model response.
///
/// Accepted shapes:
/// - `{"files": {"path": "content", ...}}`
/// - `{"files": [{"path": "...", "content": "..."}, ...]}`
/// - `{"path": "content", ...}`
pub fn recover_artifacts(text: &str) -> ParseOutcome {
    let mut warnings = Vec::new();

    let Some(body) = isolate_object(text) else {
        return ParseOutcome::Failed("response contains no JSON object".to_string());
    };
    let discarded = text.trim().len() - body.len();
    if discarded > 0 {
        warnings.push(format!("discarded {} bytes of text around the JSON object", discarded));
    }

    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(first_err) => {
            let repaired = escape_raw_control_chars(&TRAILING_COMMA.replace_all(body, "$1"));
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => {
                    warnings.push(format!("repaired malformed JSON ({})", first_err));
                    value
                }
                Err(e) => return ParseOutcome::Failed(format!("unrecoverable JSON: {}", e)),
            }
        }
    };

    let set = files_from_value(&value, &mut warnings);
    if set.is_empty() {
        return ParseOutcome::Failed("JSON object contains no files".to_string());
    }
    if warnings.is_empty() {
        ParseOutcome::Parsed(set)
    } else {
        ParseOutcome::Recovered(set, warnings)
    }
}

/// Extract source text from a single-file model response, dropping any
/// markdown fence and surrounding prose.
pub fn extract_code(response: &str) -> String {
    let trimmed = response.trim();
    let Some(fence) = trimmed.find("```") else {
        return with_trailing_newline(trimmed);
    };

    let after_fence = &trimmed[fence + 3..];
    let Some(newline) = after_fence.find('\n') else {
        return with_trailing_newline(trimmed);
    };
    let code = &after_fence[newline + 1..];
    match code.rfind("```") {
        Some(end) => with_trailing_newline(code[..end].trim_end()),
        None => with_trailing_newline(code.trim_end()),
    }
}

fn with_trailing_newline(code: &str) -> String {
    let mut out = code.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn isolate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Escape literal newlines and tabs that appear inside JSON string literals.
fn escape_raw_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

fn files_from_value(value: &Value, warnings: &mut Vec<String>) -> ArtifactSet {
    let mut set = ArtifactSet::new();
    let source = value.get("files").unwrap_or(value);

    match source {
        Value::Object(map) => {
            for (path, content) in map {
                match content.as_str() {
                    Some(text) => {
                        set.insert(path, text);
                    }
                    None => warnings.push(format!("skipped non-text entry '{}'", path)),
                }
            }
        }
        Value::Array(entries) => {
            for (idx, entry) in entries.iter().enumerate() {
                let path = ["path", "name", "file"]
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(Value::as_str));
                let content = ["content", "code"]
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(Value::as_str));
                match (path, content) {
                    (Some(path), Some(content)) => {
                        set.insert(path, content);
                    }
                    _ => warnings.push(format!("skipped malformed file entry #{}", idx)),
                }
            }
        }
        _ => warnings.push("'files' is neither an object nor an array".to_string()),
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_is_parsed() {
        let outcome = recover_artifacts(r#"{"files": {"index.html": "<html></html>"}}"#);
        match outcome {
            ParseOutcome::Parsed(set) => assert_eq!(set.get("index.html"), Some("<html></html>")),
            other => panic!("Expected Parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_file_array_shape() {
        let outcome = recover_artifacts(
            r#"{"files": [{"path": "a.js", "content": "1"}, {"name": "b.js", "code": "2"}]}"#,
        );
        let set = outcome.into_artifacts().unwrap();
        assert_eq!(set.get("a.js"), Some("1"));
        assert_eq!(set.get("b.js"), Some("2"));
    }

    #[test]
    fn test_markdown_wrapped_json_is_recovered() {
        let text = "Here you go:\n```json\n{\"src/App.tsx\": \"export default 1\"}\n```\n";
        match recover_artifacts(text) {
            ParseOutcome::Recovered(set, warnings) => {
                assert_eq!(set.get("src/App.tsx"), Some("export default 1"));
                assert!(warnings[0].contains("discarded"));
            }
            other => panic!("Expected Recovered, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_commas_and_raw_newlines_repaired() {
        let text = "{\"files\": {\"a.css\": \"body {\n  margin: 0;\n}\",}}";
        match recover_artifacts(text) {
            ParseOutcome::Recovered(set, warnings) => {
                assert_eq!(set.get("a.css"), Some("body {\n  margin: 0;\n}"));
                assert!(warnings.iter().any(|w| w.contains("repaired")));
            }
            other => panic!("Expected Recovered, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_fails() {
        assert!(matches!(recover_artifacts("no json here"), ParseOutcome::Failed(_)));
        assert!(matches!(recover_artifacts("{ this is : not json ]"), ParseOutcome::Failed(_)));
        assert!(matches!(recover_artifacts("{}"), ParseOutcome::Failed(_)));
    }

    #[test]
    fn test_extract_code_strips_fence_and_prose() {
        let response = "Sure! Here is the file:\n```tsx\nexport default function App() {}\n```\nEnjoy.";
        assert_eq!(extract_code(response), "export default function App() {}\n");
    }

    #[test]
    fn test_extract_code_plain_text() {
        assert_eq!(extract_code("  body { color: red; }  "), "body { color: red; }\n");
        assert_eq!(extract_code(""), "");
    }
}
