//! # Compiled Statements
//!
//! A [`Statement`] is SQL text with `:name` placeholders plus the values
//! bound to them. Drivers take positional `?` markers, so the statement is
//! rewritten once, right before execution.

use crate::database::DbValue;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// SQL text with named placeholders and their bound values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// SQL with `:name` placeholders
    pub sql: String,
    /// Values keyed by placeholder name (without the colon)
    pub params: IndexMap<String, DbValue>,
}

impl Statement {
    /// Create a statement with no bound values
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: IndexMap::new(),
        }
    }

    /// Bind a value to a placeholder name
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Rewrite `:name` placeholders to `?` and collect values in order
    ///
    /// Text inside single quotes, double quotes and backticks is left
    /// untouched, as is the `::` cast operator. A placeholder may appear
    /// more than once; its value is repeated.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnboundParameter` when a placeholder has no value.
    pub fn to_positional(&self) -> Result<(String, Vec<DbValue>)> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::with_capacity(self.params.len());
        let mut quote: Option<char> = None;
        let mut chars = self.sql.chars().peekable();

        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                sql.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        sql.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    sql.push(c);
                }
                ':' if chars.peek() == Some(&':') => {
                    chars.next();
                    sql.push_str("::");
                }
                ':' if chars
                    .peek()
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
                {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let value = self
                        .params
                        .get(&name)
                        .ok_or(Error::UnboundParameter { name })?;
                    values.push(value.clone());
                    sql.push('?');
                }
                _ => sql.push(c),
            }
        }

        Ok((sql, values))
    }
}
