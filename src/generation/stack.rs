//! Stack definitions: scaffold files, per-file blueprints, and the
//! dependency identifiers the generator knows how to declare.

use std::collections::BTreeMap;

use serde::Serialize;

use super::GenerationPlan;
use super::template::{ComponentStyle, Template};
use crate::quality::SessionContext;

/// How one required file is produced.
#[derive(Debug, Clone)]
pub enum Blueprint {
    /// Rendered from a template, no AI call.
    Static(Template),
    /// Generated by the AI service, with a fallback when the reply is unusable.
    Prompted {
        purpose: String,
        guidelines: Vec<String>,
        max_output_tokens: u32,
        fallback: Fallback,
    },
}

#[derive(Debug, Clone)]
pub enum Fallback {
    Template(Template),
    /// Root component importing every generated component.
    AppShell,
    /// Minimal content chosen by file extension.
    Generic,
}

impl Blueprint {
    /// Blueprint for a required file the stack has no entry for.
    pub fn generic(path: &str) -> Self {
        Blueprint::Prompted {
            purpose: format!("the project file `{}`", path),
            guidelines: Vec::new(),
            max_output_tokens: 4000,
            fallback: Fallback::Generic,
        }
    }
}

/// A dependency the generator may add to the manifest when generated code
/// imports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownDependency {
    pub package: &'static str,
    pub version: &'static str,
    pub dev: bool,
}

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub id: &'static str,
    pub description: &'static str,
    pub scaffold: Vec<(&'static str, Template)>,
    pub blueprints: BTreeMap<&'static str, Blueprint>,
    /// Files generated when the plan lists no required files.
    pub default_files: Vec<&'static str>,
    pub component_dir: &'static str,
    pub component_extension: &'static str,
    pub component_style: ComponentStyle,
    /// Language hint passed to prompts (e.g. "TypeScript + React").
    pub language: &'static str,
    pub manifest: Option<&'static str>,
    pub entry_points: Vec<&'static str>,
    pub known_dependencies: Vec<KnownDependency>,
}

impl StackConfig {
    pub fn blueprint(&self, path: &str) -> Blueprint {
        self.blueprints
            .get(path)
            .cloned()
            .unwrap_or_else(|| Blueprint::generic(path))
    }

    pub fn component_path(&self, identifier: &str) -> String {
        format!(
            "{}/{}.{}",
            self.component_dir, identifier, self.component_extension
        )
    }

    /// Import prefix for components, relative to the root component.
    pub fn component_import_prefix(&self) -> String {
        let relative = self
            .component_dir
            .strip_prefix("src/")
            .unwrap_or(self.component_dir);
        format!("./{}", relative)
    }

    /// Required files for `plan`, falling back to the stack defaults.
    pub fn required_files(&self, plan: &GenerationPlan) -> Vec<String> {
        if plan.required_files.is_empty() {
            self.default_files.iter().map(|s| s.to_string()).collect()
        } else {
            plan.required_files.clone()
        }
    }

    /// Validation context describing what this stack is expected to produce.
    pub fn session_context(&self, plan: &GenerationPlan) -> SessionContext {
        let mut required_files = self.required_files(plan);
        required_files.extend(
            plan.component_identifiers()
                .iter()
                .map(|c| self.component_path(c)),
        );
        SessionContext {
            stack_id: Some(self.id.to_string()),
            manifest: self.manifest.map(str::to_string),
            entry_points: self.entry_points.iter().map(|s| s.to_string()).collect(),
            required_files,
        }
    }
}

/// Lookup table of supported stacks.
#[derive(Debug, Clone)]
pub struct StackRegistry {
    stacks: Vec<StackConfig>,
}

impl Default for StackRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StackRegistry {
    pub fn builtin() -> Self {
        Self {
            stacks: vec![react_vite(), static_site()],
        }
    }

    pub fn get(&self, id: &str) -> Option<&StackConfig> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackConfig> {
        self.stacks.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.stacks.iter().map(|s| s.id).collect()
    }
}

const REACT_PACKAGE_JSON: &str = r#"{
  "name": "{{packageName}}",
  "private": true,
  "version": "0.1.0",
  "description": "{{description}}",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "tsc -b && vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.3.1",
    "react-dom": "^18.3.1"
  },
  "devDependencies": {
    "@types/react": "^18.3.3",
    "@types/react-dom": "^18.3.0",
    "@vitejs/plugin-react": "^4.3.1",
    "typescript": "^5.5.4",
    "vite": "^5.4.0"
  }
}
"#;

const REACT_TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "moduleResolution": "bundler",
    "jsx": "react-jsx",
    "strict": true,
    "noEmit": true,
    "skipLibCheck": true
  },
  "include": ["src"]
}
"#;

const REACT_VITE_CONFIG: &str = "import { defineConfig } from 'vite';\nimport react from '@vitejs/plugin-react';\n\nexport default defineConfig({\n  plugins: [react()],\n});\n";

const REACT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <meta name="description" content="{{description}}" />
    <title>{{projectName}}</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const README: &str = "# {{projectName}}\n\n{{description}}\n\n## Development\n\n```sh\nnpm install\nnpm run dev\n```\n";

const REACT_MAIN: &str = "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\nimport './index.css';\n\ncreateRoot(document.getElementById('root')!).render(\n  <React.StrictMode>\n    <App />\n  </React.StrictMode>,\n);\n";

const BASE_CSS: &str = ":root {\n  --color-text: #1f2937;\n  --color-accent: #2563eb;\n  --space: 1rem;\n}\n\nbody {\n  margin: 0;\n  font-family: system-ui, -apple-system, sans-serif;\n  color: var(--color-text);\n  line-height: 1.6;\n}\n\nsection {\n  padding: calc(var(--space) * 2) var(--space);\n}\n\n@media (max-width: 640px) {\n  section {\n    padding: var(--space);\n  }\n}\n";

const STATIC_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <meta name="description" content="{{description}}" />
    <title>{{projectName}}</title>
    <link rel="stylesheet" href="styles.css" />
  </head>
  <body>
    <header><h1>{{projectName}}</h1></header>
    <main id="app"></main>
    <footer><p>{{description}}</p></footer>
    <script type="module" src="script.js"></script>
  </body>
</html>
"#;

const STATIC_SCRIPT: &str = "const app = document.getElementById('app');\n\nexport function mount(section) {\n  if (app && section) {\n    app.append(section);\n  }\n}\n";

fn react_guidelines() -> Vec<String> {
    vec![
        "Use TypeScript and function components.".into(),
        "Give every image an alt attribute and loading=\"lazy\".".into(),
        "Use semantic elements (header, main, section, nav, footer).".into(),
        "Write real copy; never use placeholder text.".into(),
    ]
}

fn react_vite() -> StackConfig {
    let mut blueprints = BTreeMap::new();
    blueprints.insert("src/main.tsx", Blueprint::Static(Template::text(REACT_MAIN)));
    blueprints.insert(
        "src/App.tsx",
        Blueprint::Prompted {
            purpose: "the root App component that lays out the page and renders every listed component in order".into(),
            guidelines: react_guidelines(),
            max_output_tokens: 4000,
            fallback: Fallback::AppShell,
        },
    );
    blueprints.insert(
        "src/index.css",
        Blueprint::Prompted {
            purpose: "the global stylesheet with CSS custom properties, base typography and responsive media queries".into(),
            guidelines: vec!["Plain CSS only, no preprocessor syntax.".into()],
            max_output_tokens: 3000,
            fallback: Fallback::Template(Template::text(BASE_CSS)),
        },
    );

    StackConfig {
        id: "react-vite",
        description: "React 18 + TypeScript single-page app built with Vite",
        scaffold: vec![
            ("package.json", Template::json(REACT_PACKAGE_JSON)),
            ("tsconfig.json", Template::text(REACT_TSCONFIG)),
            ("vite.config.ts", Template::text(REACT_VITE_CONFIG)),
            ("index.html", Template::html(REACT_INDEX_HTML)),
            ("README.md", Template::text(README)),
        ],
        blueprints,
        default_files: vec!["src/main.tsx", "src/App.tsx", "src/index.css"],
        component_dir: "src/components",
        component_extension: "tsx",
        component_style: ComponentStyle::React,
        language: "TypeScript + React",
        manifest: Some("package.json"),
        entry_points: vec!["src/main.tsx"],
        known_dependencies: vec![
            KnownDependency { package: "framer-motion", version: "^11.3.0", dev: false },
            KnownDependency { package: "lucide-react", version: "^0.424.0", dev: false },
            KnownDependency { package: "react-router-dom", version: "^6.26.0", dev: false },
            KnownDependency { package: "clsx", version: "^2.1.1", dev: false },
            KnownDependency { package: "zustand", version: "^4.5.4", dev: false },
            KnownDependency { package: "@tanstack/react-query", version: "^5.51.0", dev: false },
            KnownDependency { package: "tailwindcss", version: "^3.4.7", dev: true },
        ],
    }
}

fn static_site() -> StackConfig {
    let mut blueprints = BTreeMap::new();
    blueprints.insert(
        "index.html",
        Blueprint::Prompted {
            purpose: "the complete HTML page, linking styles.css and loading script.js as a module".into(),
            guidelines: vec![
                "Include lang, viewport meta, meta description and a title.".into(),
                "Use semantic landmarks and alt text on every image.".into(),
            ],
            max_output_tokens: 6000,
            fallback: Fallback::Template(Template::html(STATIC_INDEX_HTML)),
        },
    );
    blueprints.insert(
        "styles.css",
        Blueprint::Prompted {
            purpose: "the site stylesheet with custom properties and responsive media queries".into(),
            guidelines: Vec::new(),
            max_output_tokens: 3000,
            fallback: Fallback::Template(Template::text(BASE_CSS)),
        },
    );
    blueprints.insert("script.js", Blueprint::Static(Template::text(STATIC_SCRIPT)));

    StackConfig {
        id: "static-site",
        description: "Hand-written HTML, CSS and ES modules with no build step",
        scaffold: vec![("README.md", Template::text(README))],
        blueprints,
        default_files: vec!["index.html", "styles.css", "script.js"],
        component_dir: "components",
        component_extension: "js",
        component_style: ComponentStyle::Vanilla,
        language: "vanilla JavaScript (ES modules, no framework)",
        manifest: None,
        entry_points: vec!["index.html"],
        known_dependencies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(required: &[&str], components: &[&str]) -> GenerationPlan {
        GenerationPlan {
            project_name: "Bakery".into(),
            description: "Fresh bread".into(),
            stack_id: "react-vite".into(),
            required_files: required.iter().map(|s| s.to_string()).collect(),
            required_components: components.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_builtin_registry() {
        let registry = StackRegistry::builtin();
        assert_eq!(registry.ids(), vec!["react-vite", "static-site"]);
        assert!(registry.get("rails").is_none());
    }

    #[test]
    fn test_component_paths() {
        let registry = StackRegistry::builtin();
        let react = registry.get("react-vite").unwrap();
        assert_eq!(react.component_path("Hero"), "src/components/Hero.tsx");
        assert_eq!(react.component_import_prefix(), "./components");
        let site = registry.get("static-site").unwrap();
        assert_eq!(site.component_path("Hero"), "components/Hero.js");
    }

    #[test]
    fn test_unknown_path_gets_generic_blueprint() {
        let react = StackRegistry::builtin().get("react-vite").cloned().unwrap();
        assert!(matches!(
            react.blueprint("src/lib/api.ts"),
            Blueprint::Prompted { fallback: Fallback::Generic, .. }
        ));
        assert!(matches!(react.blueprint("src/main.tsx"), Blueprint::Static(_)));
    }

    #[test]
    fn test_session_context_lists_components() {
        let react = StackRegistry::builtin().get("react-vite").cloned().unwrap();
        let ctx = react.session_context(&plan(&[], &["hero section"]));
        assert_eq!(ctx.manifest.as_deref(), Some("package.json"));
        assert!(ctx.required_files.contains(&"src/App.tsx".to_string()));
        assert!(ctx.required_files.contains(&"src/components/HeroSection.tsx".to_string()));

        let ctx = react.session_context(&plan(&["src/App.tsx"], &[]));
        assert_eq!(ctx.required_files, vec!["src/App.tsx".to_string()]);
    }

    #[test]
    fn test_package_json_template_is_valid_json_when_rendered() {
        let react = StackRegistry::builtin().get("react-vite").cloned().unwrap();
        let (_, template) = react.scaffold.iter().find(|(p, _)| *p == "package.json").unwrap();
        let rendered = template.render(&plan(&[], &[]).template_vars());
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["name"], "bakery");
        assert_eq!(value["scripts"]["build"], "tsc -b && vite build");
    }
}
