//! Discover which known packages generated code imports and declare them in
//! the project manifest.

use serde_json::{Map, Value};

use super::stack::KnownDependency;

/// Known dependencies imported by `source`, matched by module specifier
/// (`'pkg'`, `"pkg"` or a `pkg/` subpath).
pub fn scan<'a>(source: &str, known: &'a [KnownDependency]) -> Vec<&'a KnownDependency> {
    known
        .iter()
        .filter(|dep| {
            ['\'', '"'].iter().any(|q| {
                source.contains(&format!("{q}{}{q}", dep.package))
                    || source.contains(&format!("{q}{}/", dep.package))
            })
        })
        .collect()
}

/// Add `deps` to the manifest's `dependencies`/`devDependencies` objects.
/// Versions already declared are left alone. Returns the re-serialized
/// manifest.
pub fn merge_into_manifest<'a>(
    manifest: &str,
    deps: impl IntoIterator<Item = &'a KnownDependency>,
) -> Result<String, serde_json::Error> {
    let mut value: Value = serde_json::from_str(manifest)?;
    let Some(root) = value.as_object_mut() else {
        return Err(serde::de::Error::custom("manifest is not a JSON object"));
    };

    for dep in deps {
        let key = if dep.dev { "devDependencies" } else { "dependencies" };
        let section = root
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(section) = section.as_object_mut() {
            section
                .entry(dep.package)
                .or_insert_with(|| Value::String(dep.version.to_string()));
        }
    }

    let mut out = serde_json::to_string_pretty(&value)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<KnownDependency> {
        vec![
            KnownDependency { package: "framer-motion", version: "^11.3.0", dev: false },
            KnownDependency { package: "lucide-react", version: "^0.424.0", dev: false },
            KnownDependency { package: "tailwindcss", version: "^3.4.7", dev: true },
        ]
    }

    #[test]
    fn test_scan_matches_specifiers() {
        let known = known();
        let src = "import { motion } from \"framer-motion\";\nimport { Star } from 'lucide-react/icons';\n";
        let found: Vec<&str> = scan(src, &known).iter().map(|d| d.package).collect();
        assert_eq!(found, vec!["framer-motion", "lucide-react"]);
    }

    #[test]
    fn test_scan_ignores_prose_mentions() {
        let known = known();
        assert!(scan("// consider framer-motion later\n", &known).is_empty());
    }

    #[test]
    fn test_merge_adds_missing_and_keeps_existing() {
        let known = known();
        let manifest = r#"{"name": "x", "dependencies": {"framer-motion": "^10.0.0"}}"#;
        let merged = merge_into_manifest(manifest, known.iter()).unwrap();
        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["dependencies"]["framer-motion"], "^10.0.0");
        assert_eq!(value["dependencies"]["lucide-react"], "^0.424.0");
        assert_eq!(value["devDependencies"]["tailwindcss"], "^3.4.7");
        assert!(merged.ends_with('\n'));
    }

    #[test]
    fn test_merge_rejects_non_object() {
        assert!(merge_into_manifest("[1, 2]", known().iter()).is_err());
        assert!(merge_into_manifest("{not json", known().iter()).is_err());
    }
}
