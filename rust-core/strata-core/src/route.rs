//! # Route Patterns
//!
//! A pattern such as `/users/{id}/posts/{post}` compiles to an anchored
//! regular expression. Each `{name}` matches one path segment made of
//! letters, digits, underscore and hyphen; everything else is literal.

use crate::error::{Error, Result};
use regex::Regex;
use std::ops::Range;

const SEGMENT: &str = "([a-zA-Z0-9_\\-]+)";

const PLACEHOLDER: &str = r"\{[a-zA-Z0-9_]+\}";

/// Compiled route pattern
#[derive(Debug, Clone)]
pub struct RoutePattern {
    /// Pattern as registered
    pub pattern: String,
    /// Placeholder names in order of appearance
    pub param_names: Vec<String>,
    /// Byte ranges of each `{name}`, braces included
    placeholders: Vec<Range<usize>>,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a pattern
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the compiled expression is
    /// rejected by the regex engine.
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = |e: regex::Error| Error::InvalidRoutePattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        };
        let placeholders: Vec<Range<usize>> = Regex::new(PLACEHOLDER)
            .map_err(invalid)?
            .find_iter(pattern)
            .map(|m| m.range())
            .collect();

        let mut source = String::from("^");
        let mut param_names = Vec::with_capacity(placeholders.len());
        let mut last = 0;

        for range in &placeholders {
            source.push_str(&regex::escape(&pattern[last..range.start]));
            source.push_str(SEGMENT);
            param_names.push(pattern[range.start + 1..range.end - 1].to_string());
            last = range.end;
        }
        source.push_str(&regex::escape(&pattern[last..]));
        source.push('$');

        let regex = Regex::new(&source).map_err(invalid)?;

        Ok(Self {
            pattern: pattern.to_string(),
            param_names,
            placeholders,
            regex,
        })
    }

    /// Captured segments, in order, when `path` matches the whole pattern
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|c| c.map_or_else(String::new, |c| c.as_str().to_string()))
                .collect(),
        )
    }

    /// Substitute `values` positionally into the placeholders
    ///
    /// Placeholders without a value are left as written.
    #[must_use]
    pub fn fill<S: AsRef<str>>(&self, values: &[S]) -> String {
        let mut values = values.iter();
        let mut out = String::with_capacity(self.pattern.len());
        let mut last = 0;
        for range in &self.placeholders {
            out.push_str(&self.pattern[last..range.start]);
            match values.next() {
                Some(v) => out.push_str(v.as_ref()),
                None => out.push_str(&self.pattern[range.clone()]),
            }
            last = range.end;
        }
        out.push_str(&self.pattern[last..]);
        out
    }
}
