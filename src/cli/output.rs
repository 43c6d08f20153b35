//! Output formatting for CLI commands

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    /// `key: value` lines, list items indented
    Text,
}

impl OutputFormat {
    /// Unknown names fall back to JSON
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "json" => Self::Json,
            other => {
                tracing::warn!("Unknown output format '{}', using json", other);
                Self::Json
            }
        }
    }
}

/// Output context for consistent formatting across commands
///
/// All commands print through this context.
#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Solution root for relative path calculation
    root: PathBuf,
    format: OutputFormat,
}

impl OutputContext {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            format: OutputFormat::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert an absolute path to relative (if within the solution root)
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Print a successful response with data fields at top level
    pub fn print_success_flat<T: Serialize>(&self, data: T) {
        let mut response = serde_json::to_value(data).unwrap_or(serde_json::json!({}));
        if let Some(obj) = response.as_object_mut() {
            obj.insert("success".to_string(), Value::Bool(true));
        }
        self.print(&response);
    }

    pub fn print_error(&self, message: &str) {
        let response = serde_json::json!({
            "success": false,
            "error": message
        });
        self.print(&response);
    }

    fn print(&self, value: &Value) {
        match self.format {
            OutputFormat::Json => print_json(value),
            OutputFormat::Text => print!("{}", render_text(value)),
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn render_text(value: &Value) -> String {
    let Some(obj) = value.as_object() else {
        return format!("{}\n", render_inline(value));
    };

    let mut out = String::new();
    for (key, field) in obj {
        match field {
            Value::Array(items) => {
                out.push_str(&format!("{key}:\n"));
                for item in items {
                    out.push_str(&format!("  {}\n", render_inline(item)));
                }
            }
            Value::Null => {}
            other => out.push_str(&format!("{key}: {}\n", render_inline(other))),
        }
    }
    out
}

fn render_inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| format!("{k}={}", render_inline(v)))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Array(items) => items
            .iter()
            .map(render_inline)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
