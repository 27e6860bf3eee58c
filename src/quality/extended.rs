//! Optional extended categories: lint, import resolution, dead code and
//! type safety. Same contract as the core evaluators.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::SessionContext;
use super::checks::SOURCE_EXTS;
use super::report::{Check, Severity};
use crate::artifact::ArtifactSet;

const MAX_LINE_CHARS: usize = 200;
const RESOLVE_SUFFIXES: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".json", ".css", "/index.ts", "/index.tsx", "/index.js",
    "/index.jsx",
];

static IMPORT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:\bfrom\s*|^\s*import\s*|\bimport\s*\(\s*)['"]([^'"]+)['"]"#)
        .expect("valid regex")
});
static IMPORT_BINDINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:([A-Za-z_$][\w$]*)\s*,?\s*)?(?:\{([^}]*)\})?\s*from\s+['"]"#)
        .expect("valid regex")
});
static EXPLICIT_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(:\s*any\b|\bas\s+any\b|<any>)").expect("valid regex"));

fn sources(artifacts: &ArtifactSet) -> Vec<(&str, &str)> {
    artifacts.with_extensions(SOURCE_EXTS).collect()
}

fn list(items: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut out = items.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > SHOWN {
        out.push_str(&format!(" and {} more", items.len() - SHOWN));
    }
    out
}

/// Resolve a relative import specifier against the importing file's directory.
fn resolve_relative(from_file: &str, specifier: &str) -> String {
    let mut parts: Vec<&str> = from_file.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Package name of a bare specifier: `react-dom/client` → `react-dom`,
/// `@scope/pkg/sub` → `@scope/pkg`.
fn package_name(specifier: &str) -> &str {
    let mut idx = specifier.len();
    let slash_count = if specifier.starts_with('@') { 2 } else { 1 };
    let mut seen = 0;
    for (i, c) in specifier.char_indices() {
        if c == '/' {
            seen += 1;
            if seen == slash_count {
                idx = i;
                break;
            }
        }
    }
    &specifier[..idx]
}

fn declared_packages(artifacts: &ArtifactSet, context: Option<&SessionContext>) -> Option<BTreeSet<String>> {
    let manifest = match context {
        Some(ctx) => ctx.manifest.as_deref()?,
        None => "package.json",
    };
    let value: Value = serde_json::from_str(artifacts.get(manifest)?).ok()?;
    let mut names = BTreeSet::new();
    for section in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(map) = value.get(section).and_then(Value::as_object) {
            names.extend(map.keys().cloned());
        }
    }
    Some(names)
}

pub fn lint(artifacts: &ArtifactSet) -> Vec<Check> {
    let files = sources(artifacts);
    let debuggers: Vec<String> = files
        .iter()
        .filter(|(_, c)| c.contains("debugger;"))
        .map(|(p, _)| p.to_string())
        .collect();
    let long_lines: Vec<String> = files
        .iter()
        .filter(|(_, c)| c.lines().any(|l| l.chars().count() > MAX_LINE_CHARS))
        .map(|(p, _)| p.to_string())
        .collect();
    let double_semis: Vec<String> = files
        .iter()
        .filter(|(_, c)| c.lines().any(|l| l.trim_end().ends_with(";;")))
        .map(|(p, _)| p.to_string())
        .collect();

    vec![
        Check::outcome(
            "no_debugger_statements",
            Severity::Warning,
            debuggers.is_empty(),
            "No debugger statements",
            format!("debugger statements in {}", list(&debuggers)),
            "Remove debugger statements",
        ),
        Check::outcome(
            "line_length",
            Severity::Info,
            long_lines.is_empty(),
            "Lines are a readable length",
            format!("Lines over {} characters in {}", MAX_LINE_CHARS, list(&long_lines)),
            "Wrap long lines",
        ),
        Check::outcome(
            "no_double_semicolons",
            Severity::Info,
            double_semis.is_empty(),
            "No empty statements",
            format!("Double semicolons in {}", list(&double_semis)),
            "Remove duplicated semicolons",
        ),
    ]
}

pub fn imports(artifacts: &ArtifactSet, context: Option<&SessionContext>) -> Vec<Check> {
    let files = sources(artifacts);
    let declared = declared_packages(artifacts, context);
    let mut unresolved = Vec::new();
    let mut undeclared = BTreeSet::new();

    for (path, content) in &files {
        for cap in IMPORT_SPECIFIER.captures_iter(content) {
            let specifier = &cap[1];
            if specifier.starts_with("./") || specifier.starts_with("../") {
                let target = resolve_relative(path, specifier);
                let found = RESOLVE_SUFFIXES
                    .iter()
                    .any(|suffix| artifacts.contains(&format!("{}{}", target, suffix)));
                if !found {
                    unresolved.push(format!("{} → {}", path, specifier));
                }
            } else if !specifier.starts_with('/')
                && !specifier.starts_with("node:")
                && !specifier.starts_with("http")
                && let Some(declared) = &declared
            {
                let name = package_name(specifier);
                if !declared.contains(name) {
                    undeclared.insert(name.to_string());
                }
            }
        }
    }

    let mut checks = vec![Check::outcome(
        "relative_imports_resolve",
        Severity::Error,
        unresolved.is_empty(),
        "All relative imports resolve",
        format!("Unresolved imports: {}", list(&unresolved)),
        "Generate the missing modules or fix the import paths",
    )];
    if declared.is_some() {
        let undeclared: Vec<String> = undeclared.into_iter().collect();
        checks.push(Check::outcome(
            "package_imports_declared",
            Severity::Warning,
            undeclared.is_empty(),
            "All imported packages are declared",
            format!("Undeclared packages: {}", list(&undeclared)),
            "Add the imported packages to the manifest dependencies",
        ));
    }
    checks
}

pub fn dead_code(artifacts: &ArtifactSet) -> Vec<Check> {
    let files = sources(artifacts);

    let unreferenced: Vec<String> = files
        .iter()
        .filter(|(path, _)| path.contains("/components/"))
        .filter_map(|(path, _)| {
            let stem = path.rsplit('/').next()?.split('.').next()?;
            let referenced = files
                .iter()
                .any(|(other, content)| other != path && content.contains(stem));
            (!referenced).then(|| path.to_string())
        })
        .collect();

    let mut unused_imports = Vec::new();
    for (path, content) in &files {
        for cap in IMPORT_BINDINGS.captures_iter(content) {
            let mut bindings: Vec<&str> = Vec::new();
            if let Some(default) = cap.get(1).filter(|m| m.as_str() != "type") {
                bindings.push(default.as_str());
            }
            if let Some(named) = cap.get(2) {
                bindings.extend(
                    named
                        .as_str()
                        .split(',')
                        .filter_map(|b| b.split(" as ").last())
                        .map(str::trim)
                        .filter(|b| !b.is_empty() && !b.starts_with("type ")),
                );
            }
            for binding in bindings {
                let pattern = format!(r"\b{}\b", regex::escape(binding));
                let Ok(re) = Regex::new(&pattern) else { continue };
                if re.find_iter(content).count() <= 1 {
                    unused_imports.push(format!("{} in {}", binding, path));
                }
            }
        }
    }

    vec![
        Check::outcome(
            "components_referenced",
            Severity::Warning,
            unreferenced.is_empty(),
            "Every component is used",
            format!("Components never referenced: {}", list(&unreferenced)),
            "Render or remove unused components",
        ),
        Check::outcome(
            "no_unused_imports",
            Severity::Info,
            unused_imports.is_empty(),
            "No unused imports",
            format!("Unused imports: {}", list(&unused_imports)),
            "Remove unused imports",
        ),
    ]
}

pub fn type_safety(artifacts: &ArtifactSet) -> Vec<Check> {
    let ts: Vec<(&str, &str)> = artifacts.with_extensions(&["ts", "tsx"]).collect();
    if ts.is_empty() {
        return Vec::new();
    }

    let any_users: Vec<String> = ts
        .iter()
        .filter(|(_, c)| EXPLICIT_ANY.is_match(c))
        .map(|(p, _)| p.to_string())
        .collect();
    let suppressed: Vec<String> = ts
        .iter()
        .filter(|(_, c)| c.contains("@ts-ignore") || c.contains("@ts-nocheck"))
        .map(|(p, _)| p.to_string())
        .collect();

    let mut checks = vec![
        Check::outcome(
            "no_explicit_any",
            Severity::Warning,
            any_users.is_empty(),
            "No explicit `any` types",
            format!("Explicit `any` in {}", list(&any_users)),
            "Replace `any` with precise types",
        ),
        Check::outcome(
            "no_type_suppressions",
            Severity::Warning,
            suppressed.is_empty(),
            "No type-check suppressions",
            format!("@ts-ignore/@ts-nocheck in {}", list(&suppressed)),
            "Fix the type errors instead of suppressing them",
        ),
    ];

    if let Some(raw) = artifacts.get("tsconfig.json") {
        let without_comments: String = raw
            .lines()
            .filter(|l| !l.trim_start().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        let strict = serde_json::from_str::<Value>(&without_comments)
            .ok()
            .and_then(|v| v.pointer("/compilerOptions/strict").and_then(Value::as_bool))
            .unwrap_or(false);
        checks.push(Check::outcome(
            "strict_mode_enabled",
            Severity::Info,
            strict,
            "TypeScript strict mode enabled",
            "tsconfig.json does not enable strict mode",
            "Set compilerOptions.strict to true",
        ));
    }

    checks
}
