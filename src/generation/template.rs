//! `{{variable}}` templates and the guaranteed-valid fallback sources.
//!
//! Rendering is plain interpolation. [`Template::extract_variables`] inverts
//! a render by matching the literal segments of the template against the
//! rendered text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::quality::ComponentStyle;

/// How variable values are embedded in a template body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    /// Values are inserted verbatim.
    #[default]
    Text,
    /// Values are inserted as JSON string contents (escaped, without quotes).
    Json,
    /// Values are inserted as escaped HTML text.
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Var(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub format: TemplateFormat,
    pub body: String,
}

/// Variables available to every template, keyed by placeholder name.
pub type TemplateVars = BTreeMap<&'static str, String>;

impl Template {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            format: TemplateFormat::Text,
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            format: TemplateFormat::Json,
            body: body.into(),
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self {
            format: TemplateFormat::Html,
            body: body.into(),
        }
    }

    fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        let mut rest = self.body.as_str();
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Literal(&rest[..start]));
            }
            segments.push(Segment::Var(rest[start + 2..start + 2 + len].trim()));
            rest = &rest[start + 2 + len + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }
        segments
    }

    /// Names of the variables this template declares, in order of first use.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in self.segments() {
            if let Segment::Var(name) = segment
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }

    /// Render the template. Unknown variables render as empty strings.
    pub fn render(&self, vars: &TemplateVars) -> String {
        let mut out = String::with_capacity(self.body.len());
        for segment in self.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    let value = vars.get(name).map(String::as_str).unwrap_or("");
                    out.push_str(&self.encode(value));
                }
            }
        }
        out
    }

    /// Recover variable values from a rendered copy of this template.
    /// Returns `None` if `rendered` does not match the template's literals.
    pub fn extract_variables(&self, rendered: &str) -> Option<BTreeMap<String, String>> {
        let segments = self.segments();
        let mut values = BTreeMap::new();
        let mut cursor = 0;

        for (idx, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    if !rendered[cursor..].starts_with(text) {
                        return None;
                    }
                    cursor += text.len();
                }
                Segment::Var(name) => {
                    let end = match segments.get(idx + 1) {
                        Some(Segment::Literal(next)) => cursor + rendered[cursor..].find(next)?,
                        _ => rendered.len(),
                    };
                    let value = self.decode(&rendered[cursor..end])?;
                    values.entry(name.to_string()).or_insert(value);
                    cursor = end;
                }
            }
        }

        (cursor == rendered.len()).then_some(values)
    }

    fn encode(&self, value: &str) -> String {
        match self.format {
            TemplateFormat::Text => value.to_string(),
            TemplateFormat::Json => {
                let quoted = serde_json::Value::String(value.to_string()).to_string();
                quoted[1..quoted.len() - 1].to_string()
            }
            TemplateFormat::Html => escape_html(value),
        }
    }

    fn decode(&self, raw: &str) -> Option<String> {
        match self.format {
            TemplateFormat::Text => Some(raw.to_string()),
            TemplateFormat::Json => serde_json::from_str::<String>(&format!("\"{}\"", raw)).ok(),
            TemplateFormat::Html => Some(unescape_html(raw)),
        }
    }
}

/// Convert a title to a URL-safe slug, limited to `max_len` characters.
pub fn slugify(title: &str, max_len: usize) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.len() > max_len {
        slug[..slug.floor_char_boundary(max_len)]
            .trim_end_matches('-')
            .to_string()
    } else {
        slug
    }
}

/// Turn a free-form component name into a PascalCase identifier:
/// `"hero section"` → `HeroSection`. Names starting with a digit get a
/// `Section` prefix so the result is always a valid identifier.
pub fn component_identifier(name: &str) -> String {
    let ident: String = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    match ident.chars().next() {
        None => "Section".to_string(),
        Some(c) if c.is_ascii_digit() => format!("Section{}", ident),
        Some(_) => ident,
    }
}

/// `HeroSection` → `Hero Section`
pub fn humanize(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    for (i, c) in identifier.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// A component guaranteed to pass the per-component checks.
pub fn fallback_component(style: ComponentStyle, identifier: &str) -> String {
    let title = humanize(identifier);
    let class = slugify(&title, 60);
    match style {
        ComponentStyle::React => format!(
            r#"interface {id}Props {{
  className?: string;
}}

export default function {id}({{ className = '' }}: {id}Props) {{
  return (
    <section className={{className ? '{class} ' + className : '{class}'}} aria-label="{title}">
      <h2>{title}</h2>
    </section>
  );
}}
"#,
            id = identifier,
            class = class,
            title = title,
        ),
        ComponentStyle::Vanilla => format!(
            r#"export default function {id}() {{
  const section = document.createElement('section');
  section.className = '{class}';
  section.setAttribute('aria-label', '{title}');
  const heading = document.createElement('h2');
  heading.textContent = '{title}';
  section.append(heading);
  return section;
}}

export const markup = '<section class="{class}"><h2>{title}</h2></section>';
"#,
            id = identifier,
            class = class,
            title = title,
        ),
    }
}

/// Escape text for an HTML text node or quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Root component that renders every generated component in order.
///
/// The project name is emitted as a string expression, so braces and angle
/// brackets in it cannot break the JSX.
pub fn app_shell(project_name: &str, component_dir_import: &str, components: &[String]) -> String {
    let heading = serde_json::Value::from(project_name).to_string();
    let imports: String = components
        .iter()
        .map(|c| format!("import {c} from '{component_dir_import}/{c}';\n"))
        .collect();
    let rendered: String = components
        .iter()
        .map(|c| format!("        <{c} />\n"))
        .collect();
    format!(
        r#"{imports}
export default function App() {{
  return (
    <div className="app">
      <header className="app-header">
        <h1>{{{heading}}}</h1>
      </header>
      <main>
{rendered}      </main>
    </div>
  );
}}
"#
    )
}

/// Minimal valid content for a file no blueprint could produce.
pub fn generic_fallback(path: &str, vars: &TemplateVars) -> String {
    let name = vars.get("projectName").map(String::as_str).unwrap_or("Project");
    let description = vars.get("description").map(String::as_str).unwrap_or("");
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "json" => "{}\n".to_string(),
        "md" => format!("# {}\n\n{}\n", name, description),
        "css" | "scss" => format!("/* {} styles */\n", name.replace("*/", "* /")),
        "html" | "htm" => {
            let name = escape_html(name);
            format!(
                "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n<title>{}</title>\n</head>\n<body>\n<main><h1>{}</h1></main>\n</body>\n</html>\n",
                name, name
            )
        }
        "ts" | "tsx" | "js" | "jsx" | "mjs" => "export {};\n".to_string(),
        _ => String::new(),
    }
}
