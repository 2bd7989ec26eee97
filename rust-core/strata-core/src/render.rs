//! # Views
//!
//! The renderer turns a view name plus data into HTML and supplies the
//! error pages shown by the dispatcher.
//!
//! [`FileRenderer`] reads `views/<name>.html` and `errors/<status>.html`
//! below a root directory. Templates substitute `{{ key }}` (dotted paths
//! reach into nested objects) with HTML-escaped values; a layout receives
//! the rendered view unescaped as `{{ content }}`.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

/// View collaborator
pub trait Renderer: Send + Sync {
    /// Render `view` with `data`, optionally wrapped in `layout`
    ///
    /// # Errors
    ///
    /// Returns `Error::Render` when the view or layout cannot be produced.
    fn render(&self, view: &str, data: &Value, layout: Option<&str>) -> Result<String>;

    /// Page shown for an error status; never fails
    fn error_page(&self, status: u16) -> String {
        builtin_error_page(status)
    }
}

/// Renderer without templates: only the built-in error pages
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

impl Renderer for DefaultRenderer {
    fn render(&self, view: &str, _data: &Value, _layout: Option<&str>) -> Result<String> {
        Err(Error::Render {
            view: view.to_string(),
            reason: "no view directory configured".to_string(),
        })
    }
}

/// Template files below a root directory
#[derive(Debug, Clone)]
pub struct FileRenderer {
    root: PathBuf,
    placeholder: Regex,
}

impl FileRenderer {
    /// Renderer reading `root/views` and `root/errors`
    ///
    /// # Errors
    ///
    /// Returns `Error::Render` if the placeholder expression fails to build.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let placeholder = Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").map_err(|e| Error::Render {
            view: String::new(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            root: root.into(),
            placeholder,
        })
    }

    fn template(&self, dir: &str, name: &str) -> Result<String> {
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::Render {
                view: name.to_string(),
                reason: "view names must be relative paths".to_string(),
            });
        }

        let path = self.root.join(dir).join(format!("{name}.html"));
        std::fs::read_to_string(&path).map_err(|e| Error::Render {
            view: name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }

    fn fill(&self, template: &str, data: &Value, content: Option<&str>) -> String {
        self.placeholder
            .replace_all(template, |caps: &Captures<'_>| {
                let key = &caps[1];
                match (key, content) {
                    ("content", Some(content)) => content.to_string(),
                    _ => lookup(data, key).map(display).map(|s| escape_html(&s)).unwrap_or_default(),
                }
            })
            .into_owned()
    }
}

impl Renderer for FileRenderer {
    fn render(&self, view: &str, data: &Value, layout: Option<&str>) -> Result<String> {
        let content = self.fill(&self.template("views", view)?, data, None);
        match layout {
            Some(layout) => Ok(self.fill(&self.template("views", layout)?, data, Some(&content))),
            None => Ok(content),
        }
    }

    fn error_page(&self, status: u16) -> String {
        let data = serde_json::json!({
            "status": status,
            "reason": reason_phrase(status),
        });
        self.template("errors", &status.to_string())
            .map(|template| self.fill(&template, &data, None))
            .unwrap_or_else(|_| builtin_error_page(status))
    }
}

fn lookup<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(data, |value, part| match value {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape text for HTML element and attribute content
#[must_use]
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

pub(crate) const fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        419 => "Page Expired",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

/// Minimal page used when no template exists
#[must_use]
pub fn builtin_error_page(status: u16) -> String {
    let reason = reason_phrase(status);
    let mut page = String::from("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\">");
    let _ = write!(
        page,
        "<title>{status} | {reason}</title></head>\n<body>\n<h1>{status}</h1>\n<p>{reason}</p>\n</body>\n</html>\n"
    );
    page
}
