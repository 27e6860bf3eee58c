//! The unit passed between every pipeline stage: an ordered set of generated files.
//!
//! An [`ArtifactSet`] maps forward-slash relative paths to file contents.
//! Paths are unique; insertion order is kept for display only. Files are only
//! ever replaced whole, never patched in place.

pub mod recover;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use walkdir::WalkDir;

/// Directories never loaded from disk into an artifact set.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "target", ".genforge"];

/// Largest single file (in bytes) read by [`ArtifactSet::load_dir`].
const MAX_LOADED_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    files: Vec<(String, String)>,
}

/// Normalize a user- or AI-supplied path to the canonical artifact form:
/// forward slashes, no leading `./` or `/`.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

/// The relative filesystem path for an artifact path, or `None` if the path
/// is absolute, empty or climbs out of its root.
pub fn safe_relative_path(path: &str) -> Option<PathBuf> {
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return None;
    }
    let normalized = normalize_path(path);
    let relative = PathBuf::from(&normalized);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    (!normalized.is_empty() && !escapes).then_some(relative)
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file. A replaced file keeps its original position.
    /// Returns the previous content, if any.
    pub fn insert(&mut self, path: impl AsRef<str>, content: impl Into<String>) -> Option<String> {
        let path = normalize_path(path.as_ref());
        let content = content.into();
        match self.files.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => Some(std::mem::replace(existing, content)),
            None => {
                self.files.push((path, content));
                None
            }
        }
    }

    /// Insert only if the path is not present yet. Returns true when inserted.
    pub fn insert_if_absent(&mut self, path: impl AsRef<str>, content: impl Into<String>) -> bool {
        if self.contains(path.as_ref()) {
            return false;
        }
        self.insert(path, content);
        true
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path);
        self.files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, c)| c.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(p, _)| p.as_str())
    }

    /// Files whose extension is one of `exts` (without the dot).
    pub fn with_extensions<'a>(
        &'a self,
        exts: &'a [&'a str],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.iter().filter(move |(p, _)| {
            Path::new(p)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| exts.contains(&e))
        })
    }

    /// First path that starts with `prefix` (e.g. `src/main.`).
    pub fn find_prefixed(&self, prefix: &str) -> Option<&str> {
        self.paths().find(|p| p.starts_with(prefix))
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|(_, c)| c.len()).sum()
    }

    /// Load every UTF-8 text file under `root`, skipping dependency and build
    /// output directories.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut set = Self::new();
        let walker = WalkDir::new(root).sort_by_file_name().into_iter();
        for entry in walker.filter_entry(|e| {
            !(e.file_type().is_dir()
                && e.depth() > 0
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        }) {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.len() > MAX_LOADED_FILE_BYTES {
                tracing::debug!(path = %entry.path().display(), "skipping oversized file");
                continue;
            }
            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            let Ok(content) = String::from_utf8(bytes) else {
                tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 file");
                continue;
            };
            let relative = entry
                .path()
                .strip_prefix(root)
                .context("Walked path escaped its root")?;
            set.insert(relative.to_string_lossy(), content);
        }
        Ok(set)
    }

    /// Write every file beneath `root`, creating parent directories.
    /// Nothing is written if any path would land outside `root`.
    pub fn write_to_dir(&self, root: &Path) -> Result<()> {
        let mut files = Vec::with_capacity(self.len());
        for (path, content) in self.iter() {
            let Some(relative) = safe_relative_path(path) else {
                bail!("Refusing to write {} outside {}", path, root.display());
            };
            files.push((relative, content));
        }
        for (relative, content) in files {
            let target = root.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&target, content)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
        Ok(())
    }
}

impl<P: AsRef<str>, C: Into<String>> FromIterator<(P, C)> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (path, content) in iter {
            set.insert(path, content);
        }
        set
    }
}

impl Serialize for ArtifactSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for (path, content) in &self.files {
            map.serialize_entry(path, content)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ArtifactSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArtifactSetVisitor;

        impl<'de> Visitor<'de> for ArtifactSetVisitor {
            type Value = ArtifactSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of file path to file content")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ArtifactSet, A::Error> {
                let mut set = ArtifactSet::new();
                while let Some((path, content)) = access.next_entry::<String, String>()? {
                    set.insert(path, content);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(ArtifactSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut set = ArtifactSet::new();
        set.insert("a.txt", "1");
        set.insert("b.txt", "2");
        let previous = set.insert("a.txt", "3");
        assert_eq!(previous.as_deref(), Some("1"));
        assert_eq!(set.paths().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(set.get("a.txt"), Some("3"));
    }

    #[test]
    fn test_paths_are_normalized() {
        let mut set = ArtifactSet::new();
        set.insert("./src\\App.tsx", "x");
        assert!(set.contains("src/App.tsx"));
        assert!(set.contains("/src/App.tsx"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut set = ArtifactSet::new();
        set.insert("index.html", "original");
        assert!(!set.insert_if_absent("index.html", "other"));
        assert!(set.insert_if_absent("README.md", "# hi"));
        assert_eq!(set.get("index.html"), Some("original"));
    }

    #[test]
    fn test_with_extensions() {
        let set: ArtifactSet = [("a.ts", ""), ("b.css", ""), ("c.tsx", "")].into_iter().collect();
        let ts: Vec<_> = set.with_extensions(&["ts", "tsx"]).map(|(p, _)| p).collect();
        assert_eq!(ts, vec!["a.ts", "c.tsx"]);
    }

    #[test]
    fn test_serde_preserves_order() {
        let set: ArtifactSet = [("z.txt", "1"), ("a.txt", "2")].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"z.txt":"1","a.txt":"2"}"#);
        let back: ArtifactSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.paths().collect::<Vec<_>>(), vec!["z.txt", "a.txt"]);
    }

    #[test]
    fn test_load_and_write_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/react")).unwrap();
        std::fs::write(dir.path().join("src/main.tsx"), "main").unwrap();
        std::fs::write(dir.path().join("node_modules/react/index.js"), "skip").unwrap();

        let set = ArtifactSet::load_dir(dir.path()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("src/main.tsx"), Some("main"));

        let out = tempfile::tempdir().unwrap();
        set.write_to_dir(out.path()).unwrap();
        let written = std::fs::read_to_string(out.path().join("src/main.tsx")).unwrap();
        assert_eq!(written, "main");
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("./src/App.tsx"), Some(PathBuf::from("src/App.tsx")));
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path("src/../../x"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[test]
    fn test_write_refuses_paths_outside_root() {
        let parent = tempfile::tempdir().unwrap();
        let out = parent.path().join("out");
        let set: ArtifactSet = [("index.html", "<html></html>"), ("../escaped.txt", "x")]
            .into_iter()
            .collect();

        let err = set.write_to_dir(&out).unwrap_err();
        assert!(err.to_string().contains("../escaped.txt"), "{err}");
        assert!(!parent.path().join("escaped.txt").exists());
        assert!(!out.join("index.html").exists());
    }
}
