//! # Query Builder
//!
//! Fluent, immutable-by-value builder. Every builder method consumes and
//! returns the query; terminal methods borrow it, so a built query can be
//! executed any number of times.
//!
//! Filter values are always bound as named parameters. Each placeholder
//! name is derived from its column plus the running parameter count and is
//! unique within the query.

use crate::database::{Database, DbValue, Row};
use crate::error::{Error, Result};
use crate::orm::compile::Target;
use crate::orm::{Page, Pagination, Record, Schema};
use crate::statement::Statement;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Join kinds accepted by [`Query::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `OUTER JOIN`
    Outer,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Outer => "OUTER",
        })
    }
}

impl FromStr for JoinType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INNER" => Ok(Self::Inner),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "OUTER" => Ok(Self::Outer),
            _ => Err(Error::InvalidJoinType {
                kind: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum Group {
    And,
    Or,
}

/// Query state for one model table
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) schema: Schema,
    pub(crate) table: String,
    pub(crate) distinct: bool,
    pub(crate) columns: Vec<String>,
    pub(crate) conditions: Vec<String>,
    pub(crate) or_conditions: Vec<String>,
    pub(crate) params: IndexMap<String, DbValue>,
    pub(crate) joins: Vec<String>,
    pub(crate) group_by: Vec<String>,
    pub(crate) order_by: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) with: Vec<String>,
}

impl Query {
    /// Empty query over the schema's default table
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            table: schema.table.to_string(),
            distinct: false,
            columns: Vec::new(),
            conditions: Vec::new(),
            or_conditions: Vec::new(),
            params: IndexMap::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            with: Vec::new(),
        }
    }

    /// Table this query reads and writes
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Bound parameters collected so far
    #[must_use]
    pub const fn params(&self) -> &IndexMap<String, DbValue> {
        &self.params
    }

    /// Run this query against another table; records it produces keep it
    #[must_use]
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Run against the default table name followed by `suffix`
    /// (partitioned tables such as `logs_2024`)
    #[must_use]
    pub fn table_suffix(mut self, suffix: &str) -> Self {
        self.table = format!("{}{suffix}", self.schema.table);
        self
    }

    /// Replace the selected columns; an empty list selects `*`
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a raw select expression
    #[must_use]
    pub fn select_raw(mut self, expression: impl Into<String>) -> Self {
        self.columns.push(expression.into());
        self
    }

    /// `SELECT DISTINCT`
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// AND filter
    ///
    /// `LIKE` binds the value as given. Otherwise a null or empty value
    /// with `=` or `!=` becomes `IS NULL` / `IS NOT NULL` and binds nothing.
    #[must_use]
    pub fn where_(mut self, column: &str, op: &str, value: impl Into<DbValue>) -> Self {
        self.push_condition(Group::And, column, op, value.into());
        self
    }

    /// OR filter, same value rules as [`Query::where_`]
    #[must_use]
    pub fn or_where(mut self, column: &str, op: &str, value: impl Into<DbValue>) -> Self {
        self.push_condition(Group::Or, column, op, value.into());
        self
    }

    /// `column IN (...)`
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyInput` when `values` is empty.
    pub fn where_in<I, V>(mut self, column: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        let mut placeholders = Vec::new();
        for value in values {
            let name = self.param_name(column, "in");
            placeholders.push(format!(":{name}"));
            self.params.insert(name, value.into());
        }
        if placeholders.is_empty() {
            return Err(Error::EmptyInput {
                column: column.to_string(),
            });
        }
        self.conditions
            .push(format!("{column} IN ({})", placeholders.join(", ")));
        Ok(self)
    }

    /// `column BETWEEN start AND end`
    #[must_use]
    pub fn where_between(
        mut self,
        column: &str,
        start: impl Into<DbValue>,
        end: impl Into<DbValue>,
    ) -> Self {
        let start_name = self.param_name(column, "start");
        self.params.insert(start_name.clone(), start.into());
        let end_name = self.param_name(column, "end");
        self.params.insert(end_name.clone(), end.into());
        self.conditions
            .push(format!("{column} BETWEEN :{start_name} AND :{end_name}"));
        self
    }

    /// Equality on a date column
    #[must_use]
    pub fn where_date(self, column: &str, date: impl Into<DbValue>) -> Self {
        self.where_(column, "=", date)
    }

    /// `MONTH(column) = month`
    #[must_use]
    pub fn where_month(self, column: &str, month: impl Into<DbValue>) -> Self {
        self.where_function("MONTH", "month", column, month.into())
    }

    /// `YEAR(column) = year`
    #[must_use]
    pub fn where_year(self, column: &str, year: impl Into<DbValue>) -> Self {
        self.where_function("YEAR", "year", column, year.into())
    }

    /// Join with a kind given as text
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidJoinType` unless `kind` is INNER, LEFT, RIGHT or OUTER.
    pub fn join(self, kind: &str, table: &str, first: &str, op: &str, second: &str) -> Result<Self> {
        let kind = kind.parse::<JoinType>()?;
        Ok(self.join_as(kind, table, first, op, second))
    }

    /// `INNER JOIN table ON first op second`
    #[must_use]
    pub fn inner_join(self, table: &str, first: &str, op: &str, second: &str) -> Self {
        self.join_as(JoinType::Inner, table, first, op, second)
    }

    /// `LEFT JOIN table ON first op second`
    #[must_use]
    pub fn left_join(self, table: &str, first: &str, op: &str, second: &str) -> Self {
        self.join_as(JoinType::Left, table, first, op, second)
    }

    /// `RIGHT JOIN table ON first op second`
    #[must_use]
    pub fn right_join(self, table: &str, first: &str, op: &str, second: &str) -> Self {
        self.join_as(JoinType::Right, table, first, op, second)
    }

    /// `OUTER JOIN table ON first op second`
    #[must_use]
    pub fn outer_join(self, table: &str, first: &str, op: &str, second: &str) -> Self {
        self.join_as(JoinType::Outer, table, first, op, second)
    }

    fn join_as(mut self, kind: JoinType, table: &str, first: &str, op: &str, second: &str) -> Self {
        self.joins
            .push(format!("{kind} JOIN {table} ON {first} {op} {second}"));
        self
    }

    /// Append GROUP BY columns
    #[must_use]
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append an ORDER BY term; anything but `desc` sorts ascending
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        let direction = if direction.trim().eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        };
        self.order_by.push(format!("{column} {direction}"));
        self
    }

    /// LIMIT
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// OFFSET
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Eager-load a declared relation on every record [`Query::get`] returns
    ///
    /// # Errors
    ///
    /// Returns `Error::RelationNotDefined` if the model declares no such relation.
    pub fn with(mut self, relation: &str) -> Result<Self> {
        if self.schema.relation(relation).is_none() {
            return Err(Error::RelationNotDefined {
                relation: relation.to_string(),
                model: self.table.clone(),
            });
        }
        if !self.with.iter().any(|r| r == relation) {
            self.with.push(relation.to_string());
        }
        Ok(self)
    }

    /// SELECT statement this query runs
    #[must_use]
    pub fn to_statement(&self) -> Statement {
        self.compile(Target::Select)
    }

    /// SQL text of the SELECT statement, placeholders unexpanded
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.to_statement().sql
    }

    fn push_condition(&mut self, group: Group, column: &str, op: &str, value: DbValue) {
        let op = op.trim();
        let condition = if op.to_ascii_uppercase().contains("LIKE") || !value.is_empty() {
            let name = self.param_name(column, "");
            let condition = format!("{column} {op} :{name}");
            self.params.insert(name, value);
            condition
        } else {
            match op {
                "=" => format!("{column} IS NULL"),
                "!=" | "<>" => format!("{column} IS NOT NULL"),
                _ => format!("{column} {op} NULL"),
            }
        };

        match group {
            Group::And => self.conditions.push(condition),
            Group::Or => self.or_conditions.push(condition),
        }
    }

    fn where_function(mut self, function: &str, tag: &str, column: &str, value: DbValue) -> Self {
        let name = self.param_name(column, tag);
        self.conditions
            .push(format!("{function}({column}) = :{name}"));
        self.params.insert(name, value);
        self
    }

    /// Placeholder name: column with non-identifier characters replaced,
    /// an optional tag, and the current parameter count
    fn param_name(&self, column: &str, tag: &str) -> String {
        let base: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let mut name = if tag.is_empty() {
            format!("{base}_{}", self.params.len())
        } else {
            format!("{base}_{tag}_{}", self.params.len())
        };
        while self.params.contains_key(&name) {
            name.push('_');
        }
        name
    }

    // ---- terminal operations ----

    /// Raw rows of the SELECT
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_rows(&self, db: &Database) -> Result<Vec<Row>> {
        db.fetch_all(&self.compile(Target::Select)).await
    }

    /// Raw rows of the SELECT; empty on failure
    pub async fn rows(&self, db: &Database) -> Vec<Row> {
        self.try_rows(db).await.unwrap_or_else(|e| {
            db.report(&e);
            Vec::new()
        })
    }

    /// Records of the SELECT, with eager relations attached
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure of the query or of
    /// any eager relation.
    pub async fn try_get(&self, db: &Database) -> Result<Vec<Record>> {
        self.fetch_records(db, Target::Select).await
    }

    /// Records of the SELECT; empty on failure
    pub async fn get(&self, db: &Database) -> Vec<Record> {
        self.try_get(db).await.unwrap_or_else(|e| {
            db.report(&e);
            Vec::new()
        })
    }

    /// First record under `LIMIT 1`
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_first(&self, db: &Database) -> Result<Option<Record>> {
        let records = self.clone().limit(1).try_get(db).await?;
        Ok(records.into_iter().next())
    }

    /// First record; `None` when absent or on failure
    pub async fn first(&self, db: &Database) -> Option<Record> {
        self.try_first(db).await.unwrap_or_else(|e| {
            db.report(&e);
            None
        })
    }

    /// Record whose primary key equals `id`
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_find(&self, db: &Database, id: impl Into<DbValue>) -> Result<Option<Record>> {
        let primary_key = self.schema.primary_key;
        self.clone()
            .where_(primary_key, "=", id)
            .try_first(db)
            .await
    }

    /// Record whose primary key equals `id`; `None` when absent or on failure
    pub async fn find(&self, db: &Database, id: impl Into<DbValue>) -> Option<Record> {
        self.try_find(db, id).await.unwrap_or_else(|e| {
            db.report(&e);
            None
        })
    }

    /// `SELECT COUNT(*)` over the filtered table
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_count(&self, db: &Database) -> Result<u64> {
        count_of(db, &self.compile(Target::Count), "count").await
    }

    /// Row count; zero on failure
    pub async fn count(&self, db: &Database) -> u64 {
        self.try_count(db).await.unwrap_or_else(|e| {
            db.report(&e);
            0
        })
    }

    /// One page of raw rows plus its descriptor
    ///
    /// `page` is clamped into `[1, last_page]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_paginate(&self, db: &Database, per_page: u64, page: u64) -> Result<Page> {
        let total = count_of(db, &self.compile(Target::PageTotal), "total").await?;
        let plan = Pagination::plan(total, per_page, page);
        let data = db
            .fetch_all(&self.compile(Target::Page {
                limit: plan.per_page,
                offset: plan.offset(),
            }))
            .await?;
        let pagination = plan.with_rows(data.len());
        Ok(Page { data, pagination })
    }

    /// One page of raw rows; an empty first page on failure
    pub async fn paginate(&self, db: &Database, per_page: u64, page: u64) -> Page {
        self.try_paginate(db, per_page, page)
            .await
            .unwrap_or_else(|e| {
                db.report(&e);
                Page {
                    data: Vec::new(),
                    pagination: Pagination::empty(per_page),
                }
            })
    }

    /// Records under `FOR UPDATE`; only meaningful inside a transaction
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_lock_for_update(&self, db: &Database) -> Result<Vec<Record>> {
        self.fetch_records(db, Target::LockForUpdate).await
    }

    /// Records under `FOR UPDATE`; empty on failure
    pub async fn lock_for_update(&self, db: &Database) -> Vec<Record> {
        self.try_lock_for_update(db).await.unwrap_or_else(|e| {
            db.report(&e);
            Vec::new()
        })
    }

    /// Records under `LOCK IN SHARE MODE`
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_shared_lock(&self, db: &Database) -> Result<Vec<Record>> {
        self.fetch_records(db, Target::SharedLock).await
    }

    /// Records under `LOCK IN SHARE MODE`; empty on failure
    pub async fn shared_lock(&self, db: &Database) -> Vec<Record> {
        self.try_shared_lock(db).await.unwrap_or_else(|e| {
            db.report(&e);
            Vec::new()
        })
    }

    /// Whether a row matches every `column = value` condition
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on execution failure.
    pub async fn try_exists<K, V>(
        &self,
        db: &Database,
        conditions: impl IntoIterator<Item = (K, V)>,
    ) -> Result<bool>
    where
        K: AsRef<str>,
        V: Into<DbValue>,
    {
        let query = conditions
            .into_iter()
            .fold(self.clone(), |q, (column, value)| {
                q.where_(column.as_ref(), "=", value)
            });
        Ok(query.try_first(db).await?.is_some())
    }

    /// Whether a row matches; `false` on failure
    pub async fn exists<K, V>(&self, db: &Database, conditions: impl IntoIterator<Item = (K, V)>) -> bool
    where
        K: AsRef<str>,
        V: Into<DbValue>,
    {
        self.try_exists(db, conditions).await.unwrap_or_else(|e| {
            db.report(&e);
            false
        })
    }

    /// Mass-assign, insert and return the saved record
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAttributes` or `Error::Database`.
    pub async fn try_create<K, V>(
        &self,
        db: &Database,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Record>
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        let mut record = Record::new(self.schema, attributes).with_table(self.table.clone());
        record.try_save(db).await?;
        Ok(record)
    }

    /// Mass-assign and insert; `None` on failure
    pub async fn create<K, V>(
        &self,
        db: &Database,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Option<Record>
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        self.try_create(db, attributes).await.map_err(|e| db.report(&e)).ok()
    }

    async fn fetch_records(&self, db: &Database, target: Target) -> Result<Vec<Record>> {
        let rows = db.fetch_all(&self.compile(target)).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Record::from_row(self.schema, self.table.clone(), row);
            for relation in &self.with {
                record.load(db, relation).await?;
            }
            records.push(record);
        }
        Ok(records)
    }
}

async fn count_of(db: &Database, stmt: &Statement, column: &str) -> Result<u64> {
    let rows = db.fetch_all(stmt).await?;
    Ok(rows
        .first()
        .and_then(|row| row.get(column))
        .and_then(DbValue::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{Loaded, Model, Relation};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(crate::Model)]
    #[model(table = "users", fillable = ["name", "email", "team_id"], relations = user_relations)]
    struct User;

    #[derive(crate::Model)]
    #[model(table = "posts", fillable = ["user_id", "title"], relations = post_relations)]
    struct Post;

    #[derive(crate::Model)]
    #[model(table = "roles", fillable = ["name"])]
    struct Role;

    #[derive(crate::Model)]
    #[model(table = "profiles", fillable = ["user_id", "bio"])]
    struct Profile;

    fn user_relations(name: &str) -> Option<Relation> {
        match name {
            "posts" => Some(Relation::has_many::<Post>("user_id")),
            "profile" => Some(Relation::has_one::<Profile>("user_id")),
            "roles" => Some(Relation::belongs_to_many::<Role>(
                "role_user",
                "user_id",
                "role_id",
            )),
            _ => None,
        }
    }

    fn post_relations(name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to::<User>("user_id")),
            _ => None,
        }
    }

    async fn seeded() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_raw(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT, team_id INTEGER);
             CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);
             CREATE TABLE profiles (id INTEGER PRIMARY KEY, user_id INTEGER, bio TEXT);
             CREATE TABLE roles (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE role_user (user_id INTEGER, role_id INTEGER);
             INSERT INTO users (name, email, team_id) VALUES ('Ann', 'ann@example.com', 1), ('Bob', NULL, 1), ('Cy', 'cy@example.com', 2);
             INSERT INTO posts (user_id, title) VALUES (1, 'First'), (1, 'Second'), (2, 'Third'), (NULL, 'Orphan');
             INSERT INTO profiles (user_id, bio) VALUES (1, 'Hello');
             INSERT INTO roles (name) VALUES ('admin'), ('editor'), ('viewer');
             INSERT INTO role_user (user_id, role_id) VALUES (1, 1), (1, 2), (2, 3);",
        )
        .await
        .unwrap();
        db
    }

    #[test]
    fn test_param_names_are_unique() {
        let query = User::query()
            .where_("users.id", ">", 1)
            .where_("users.id", "<", 10)
            .where_in("users.id", [1, 2, 3])
            .unwrap()
            .where_in("users.id", [4])
            .unwrap()
            .where_between("users.id", 1, 5)
            .where_between("users.id", 6, 9)
            .or_where("name", "LIKE", "%a%")
            .where_month("created_at", 3)
            .where_year("created_at", 2024);

        let names: HashSet<&String> = query.params().keys().collect();
        assert_eq!(names.len(), query.params().len());
        assert_eq!(query.params().len(), 13);
        assert!(query.params().contains_key("users_id_0"));
        assert!(query.params().contains_key("users_id_in_2"));
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let query = User::query()
            .where_("email", "=", DbValue::Null)
            .where_("name", "!=", "")
            .where_("team_id", ">", None::<i64>);

        assert_eq!(
            query.to_sql(),
            "SELECT * FROM users WHERE (email IS NULL AND name IS NOT NULL AND team_id > NULL)"
        );
        assert!(query.params().is_empty());
    }

    #[test]
    fn test_like_binds_value_even_when_empty() {
        let query = User::query().where_("name", "like", "");
        assert_eq!(query.to_sql(), "SELECT * FROM users WHERE (name like :name_0)");
        assert_eq!(query.params()["name_0"], DbValue::from(""));
    }

    #[test]
    fn test_empty_where_in_fails() {
        let result = User::query().where_in("id", Vec::<i64>::new());
        assert!(matches!(result, Err(Error::EmptyInput { column }) if column == "id"));
    }

    #[test]
    fn test_and_or_groups() {
        let sql = User::query()
            .where_("team_id", "=", 1)
            .where_("name", "!=", "Bob")
            .or_where("email", "LIKE", "%@example.com")
            .or_where("id", "=", 3)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE (team_id = :team_id_0 AND name != :name_1) \
             AND (email LIKE :email_2 OR id = :id_3)"
        );
    }

    #[test]
    fn test_full_select_shape() {
        let sql = User::query()
            .distinct()
            .select(["users.id", "users.name"])
            .select_raw("COUNT(posts.id) AS post_count")
            .left_join("posts", "posts.user_id", "=", "users.id")
            .where_("users.team_id", "=", 1)
            .group_by(["users.id", "users.name"])
            .order_by("post_count", "desc")
            .order_by("users.name", "sideways")
            .limit(10)
            .offset(20)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT DISTINCT users.id, users.name, COUNT(posts.id) AS post_count FROM users \
             LEFT JOIN posts ON posts.user_id = users.id WHERE (users.team_id = :users_team_id_0) \
             GROUP BY users.id, users.name ORDER BY post_count DESC, users.name ASC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_invalid_join_type() {
        let result = User::query().join("CROSS", "posts", "posts.user_id", "=", "users.id");
        assert!(matches!(result, Err(Error::InvalidJoinType { kind }) if kind == "CROSS"));

        let sql = User::query()
            .join("right", "posts", "posts.user_id", "=", "users.id")
            .unwrap()
            .to_sql();
        assert_eq!(sql, "SELECT * FROM users RIGHT JOIN posts ON posts.user_id = users.id");
    }

    #[test]
    fn test_date_filters() {
        let sql = Post::query()
            .where_date("published_on", "2024-05-01")
            .where_month("published_on", 5)
            .where_year("published_on", 2024)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM posts WHERE (published_on = :published_on_0 \
             AND MONTH(published_on) = :published_on_month_1 \
             AND YEAR(published_on) = :published_on_year_2)"
        );
    }

    #[test]
    fn test_unknown_eager_relation() {
        let result = User::query().with("comments");
        assert!(matches!(result, Err(Error::RelationNotDefined { .. })));
    }

    #[test]
    fn test_table_override() {
        assert_eq!(User::query().from_table("archived_users").to_sql(), "SELECT * FROM archived_users");
        assert_eq!(Post::query().table_suffix("_2024").to_sql(), "SELECT * FROM posts_2024");
    }

    #[tokio::test]
    async fn test_get_and_first() {
        let db = seeded().await;
        let query = User::query().where_("team_id", "=", 1).order_by("id", "asc");

        let users = query.get(&db).await;
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].get("name"), Some(&DbValue::from("Bob")));

        let first = query.first(&db).await.unwrap();
        assert_eq!(first.get("name"), Some(&DbValue::from("Ann")));
        // execution leaves the builder untouched
        assert_eq!(query.get(&db).await.len(), 2);
    }

    #[tokio::test]
    async fn test_rows_where_null() {
        let db = seeded().await;
        let rows = User::query().where_("email", "=", DbValue::Null).rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DbValue::from("Bob"));
    }

    #[tokio::test]
    async fn test_where_in_and_between() {
        let db = seeded().await;
        let count = User::query()
            .where_in("id", [1, 3])
            .unwrap()
            .count(&db)
            .await;
        assert_eq!(count, 2);

        let count = User::query().where_between("id", 2, 3).count(&db).await;
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_find_and_exists() {
        let db = seeded().await;
        let bob = User::query().find(&db, 2).await.unwrap();
        assert_eq!(bob.get("name"), Some(&DbValue::from("Bob")));
        assert!(User::query().find(&db, 99).await.is_none());

        assert!(User::query().exists(&db, [("name", "Cy"), ("team_id", "2")]).await);
        assert!(!User::query().exists(&db, [("name", "Cy"), ("team_id", "1")]).await);
    }

    #[tokio::test]
    async fn test_pagination_clamps_pages() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_raw("CREATE TABLE items (id INTEGER PRIMARY KEY, n INTEGER)")
            .await
            .unwrap();
        for n in 0..25 {
            db.execute(&Statement::new("INSERT INTO items (n) VALUES (:n)").bind("n", n))
                .await
                .unwrap();
        }
        let query = Query::new(Schema::new("items")).order_by("id", "asc");

        let page = query.paginate(&db, 10, 1).await;
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.last_page, 3);
        assert_eq!(page.pagination.from, Some(1));
        assert_eq!(page.pagination.to, Some(10));
        assert_eq!(page.data.len(), 10);

        let page = query.paginate(&db, 10, 3).await;
        assert_eq!(page.pagination.from, Some(21));
        assert_eq!(page.pagination.to, Some(25));

        let page = query.paginate(&db, 10, 99).await;
        assert_eq!(page.pagination.current_page, 3);
        assert_eq!(page.data.len(), 5);

        let page = query.paginate(&db, 10, 0).await;
        assert_eq!(page.pagination.current_page, 1);

        let page = query.clone().where_("n", "<", 0).paginate(&db, 10, 1).await;
        assert_eq!(page.pagination.total, 0);
        assert_eq!((page.pagination.from, page.pagination.to), (Some(1), Some(0)));
    }

    #[tokio::test]
    async fn test_paginate_with_group_by_counts_groups() {
        let db = seeded().await;
        let page = Post::query()
            .select(["user_id"])
            .select_raw("COUNT(*) AS n")
            .where_("user_id", "!=", DbValue::Null)
            .group_by(["user_id"])
            .paginate(&db, 10, 1)
            .await;
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.data.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_defaulted() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let db = Database::connect("sqlite::memory:")
            .await
            .unwrap()
            .with_reporter(move |e: &Error| sink.lock().unwrap().push(e.kind()));

        let query = Query::new(Schema::new("missing_table"));
        assert!(query.get(&db).await.is_empty());
        assert_eq!(query.count(&db).await, 0);
        let page = query.paginate(&db, 15, 2).await;
        assert_eq!(page.pagination, Pagination::empty(15));
        assert!(query.first(&db).await.is_none());

        assert_eq!(reported.lock().unwrap().len(), 4);
        assert!(reported.lock().unwrap().iter().all(|k| *k == "DatabaseError"));
    }

    #[tokio::test]
    async fn test_eager_loading() {
        let db = seeded().await;
        let users = User::query()
            .with("posts")
            .unwrap()
            .with("profile")
            .unwrap()
            .order_by("id", "asc")
            .get(&db)
            .await;

        assert_eq!(users[0].get_relation("posts").map(Loaded::len), Some(2));
        assert!(users[0].get_relation("profile").and_then(Loaded::as_one).is_some());
        assert_eq!(users[2].get_relation("posts").map(Loaded::len), Some(0));
        assert!(users[2].get_relation("profile").and_then(Loaded::as_one).is_none());
    }

    #[test]
    fn test_lock_clauses_compile() {
        let query = User::query().where_("id", "=", 1);
        assert!(query
            .compile(Target::LockForUpdate)
            .sql
            .ends_with(" FOR UPDATE"));
        assert!(query
            .compile(Target::SharedLock)
            .sql
            .ends_with(" LOCK IN SHARE MODE"));
    }

    #[tokio::test]
    async fn test_lock_for_update_on_sqlite_is_reported() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let db = seeded()
            .await
            .with_reporter(move |e: &Error| sink.lock().unwrap().push(e.kind()));
        let query = User::query().where_("id", "=", 1);

        let tx = db.begin_transaction().await.unwrap();
        assert!(query.lock_for_update(&tx).await.is_empty());
        assert!(query.shared_lock(&tx).await.is_empty());
        assert!(matches!(
            query.try_lock_for_update(&tx).await,
            Err(Error::Database { .. })
        ));
        tx.rollback().await.unwrap();

        assert_eq!(
            *reported.lock().unwrap(),
            vec!["DatabaseError", "DatabaseError"]
        );
        assert_eq!(query.get(&db).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_inserts_filtered_attributes() {
        let db = seeded().await;
        let user = User::query()
            .create(&db, [("name", "Dee"), ("email", "dee@example.com"), ("is_admin", "1")])
            .await
            .unwrap();
        assert_eq!(user.key(), Some(&DbValue::Int(4)));
        assert!(user.get("is_admin").is_none());
        assert_eq!(User::query().count(&db).await, 4);
    }
}
