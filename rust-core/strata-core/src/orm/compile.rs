//! SQL compilation.
//!
//! All statement text is assembled here. Identifiers come from the
//! program; values only ever travel as bound parameters.

use crate::database::{DbValue, Row};
use crate::orm::Query;
use crate::statement::Statement;
use indexmap::IndexMap;

/// Statement shape produced from one query's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Plain SELECT with the query's own LIMIT/OFFSET
    Select,
    /// SELECT ... FOR UPDATE
    LockForUpdate,
    /// SELECT ... LOCK IN SHARE MODE
    SharedLock,
    /// `SELECT COUNT(*) AS count` over the filtered table
    Count,
    /// `SELECT COUNT(*) AS total` over the filtered, grouped subquery
    PageTotal,
    /// SELECT with the page window replacing LIMIT/OFFSET
    Page {
        /// Rows per page
        limit: u64,
        /// Rows skipped
        offset: u64,
    },
}

impl Query {
    /// Compile the query state into a statement of the given shape
    pub(crate) fn compile(&self, target: Target) -> Statement {
        let sql = match target {
            Target::Count => format!(
                "SELECT COUNT(*) AS count FROM {}{}{}",
                self.table,
                self.join_clause(),
                self.where_clause()
            ),
            Target::PageTotal => format!(
                "SELECT COUNT(*) AS total FROM ({}{}) AS subquery",
                self.select_head(),
                self.group_clause()
            ),
            Target::Page { limit, offset } => format!(
                "{}{}{} LIMIT {limit} OFFSET {offset}",
                self.select_head(),
                self.group_clause(),
                self.order_clause()
            ),
            Target::Select | Target::LockForUpdate | Target::SharedLock => {
                let mut sql = format!(
                    "{}{}{}",
                    self.select_head(),
                    self.group_clause(),
                    self.order_clause()
                );
                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                if let Some(offset) = self.offset {
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
                match target {
                    Target::LockForUpdate => sql.push_str(" FOR UPDATE"),
                    Target::SharedLock => sql.push_str(" LOCK IN SHARE MODE"),
                    _ => {}
                }
                sql
            }
        };

        Statement {
            sql,
            params: self.params.clone(),
        }
    }

    /// `SELECT [DISTINCT] cols FROM table joins where`
    fn select_head(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        format!(
            "SELECT {distinct}{columns} FROM {}{}{}",
            self.table,
            self.join_clause(),
            self.where_clause()
        )
    }

    fn join_clause(&self) -> String {
        if self.joins.is_empty() {
            String::new()
        } else {
            format!(" {}", self.joins.join(" "))
        }
    }

    /// Each non-empty group is parenthesized; the groups are ANDed
    fn where_clause(&self) -> String {
        let mut groups = Vec::with_capacity(2);
        if !self.conditions.is_empty() {
            groups.push(format!("({})", self.conditions.join(" AND ")));
        }
        if !self.or_conditions.is_empty() {
            groups.push(format!("({})", self.or_conditions.join(" OR ")));
        }
        if groups.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", groups.join(" AND "))
        }
    }

    fn group_clause(&self) -> String {
        if self.group_by.is_empty() {
            String::new()
        } else {
            format!(" GROUP BY {}", self.group_by.join(", "))
        }
    }

    fn order_clause(&self) -> String {
        if self.order_by.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", self.order_by.join(", "))
        }
    }
}

fn param_for(column: &str, taken: &IndexMap<String, DbValue>) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'p');
    }
    while taken.contains_key(&name) {
        name.push('_');
    }
    name
}

/// `INSERT INTO table (cols) VALUES (:cols)`
pub(crate) fn compile_insert(table: &str, attributes: &Row) -> Statement {
    let mut params = IndexMap::with_capacity(attributes.len());
    let mut columns = Vec::with_capacity(attributes.len());
    let mut placeholders = Vec::with_capacity(attributes.len());

    for (column, value) in attributes {
        let name = param_for(column, &params);
        columns.push(column.as_str());
        placeholders.push(format!(":{name}"));
        params.insert(name, value.clone());
    }

    Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    }
}

/// `UPDATE table SET col = :col, ... WHERE pk = :key`
pub(crate) fn compile_update(table: &str, primary_key: &str, key: &DbValue, data: &Row) -> Statement {
    let mut params = IndexMap::with_capacity(data.len() + 1);
    let mut assignments = Vec::with_capacity(data.len());

    for (column, value) in data {
        let name = param_for(column, &params);
        assignments.push(format!("{column} = :{name}"));
        params.insert(name, value.clone());
    }

    let key_name = param_for(&format!("{primary_key}_key"), &params);
    let sql = format!(
        "UPDATE {table} SET {} WHERE {primary_key} = :{key_name}",
        assignments.join(", ")
    );
    params.insert(key_name, key.clone());

    Statement { sql, params }
}

/// `DELETE FROM table WHERE pk = :key`
pub(crate) fn compile_delete(table: &str, primary_key: &str, key: &DbValue) -> Statement {
    let key_name = param_for(&format!("{primary_key}_key"), &IndexMap::new());
    Statement::new(format!(
        "DELETE FROM {table} WHERE {primary_key} = :{key_name}"
    ))
    .bind(key_name, key)
}
