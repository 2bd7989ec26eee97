//! # Records
//!
//! A [`Record`] is one row of a model table: its attributes plus any
//! relations loaded so far. Relations are cached separately and are never
//! written back on save.

use crate::database::{Database, DbValue, Row};
use crate::error::{Error, Result};
use crate::orm::compile::{compile_delete, compile_insert, compile_update};
use crate::orm::{Loaded, Schema};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One materialized row
#[derive(Debug, Clone)]
pub struct Record {
    schema: Schema,
    table: String,
    attributes: Row,
    relations: IndexMap<String, Loaded>,
}

impl Record {
    /// Unsaved record; attributes pass through mass-assignment filtering
    #[must_use]
    pub fn new<K, V>(schema: Schema, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        let mut record = Self {
            schema,
            table: schema.table.to_string(),
            attributes: Row::new(),
            relations: IndexMap::new(),
        };
        record.fill(attributes);
        record
    }

    /// Record loaded from storage; every column is kept
    pub(crate) fn from_row(schema: Schema, table: String, attributes: Row) -> Self {
        Self {
            schema,
            table,
            attributes,
            relations: IndexMap::new(),
        }
    }

    /// Persist to a different table than the model's default
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Merge attributes allowed by `fillable`/`guarded`
    pub fn fill<K, V>(&mut self, attributes: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        for (key, value) in attributes {
            let key = key.into();
            if self.schema.accepts(&key) {
                self.attributes.insert(key, value.into());
            }
        }
    }

    /// Attribute value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DbValue> {
        self.attributes.get(key)
    }

    /// Set one attribute, bypassing mass-assignment rules
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DbValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// All attributes in column order
    #[must_use]
    pub const fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Table the record is persisted to
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Model metadata
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Primary key value, if set and non-empty
    #[must_use]
    pub fn key(&self) -> Option<&DbValue> {
        self.attributes
            .get(self.schema.primary_key)
            .filter(|v| !v.is_empty())
    }

    /// A relation loaded earlier by [`Record::load`] or an eager load
    #[must_use]
    pub fn get_relation(&self, name: &str) -> Option<&Loaded> {
        self.relations.get(name)
    }

    /// Resolve a declared relation now and cache it under its name
    ///
    /// # Errors
    ///
    /// Returns `Error::RelationNotDefined` for an undeclared name and
    /// `Error::Database` if the relation query fails.
    pub async fn load(&mut self, db: &Database, name: &str) -> Result<&Loaded> {
        let relation = self
            .schema
            .relation(name)
            .ok_or_else(|| self.undefined(name))?;
        let loaded = relation.resolve(db, self).await?;
        self.relations.insert(name.to_string(), loaded);
        self.relations
            .get(name)
            .ok_or_else(|| self.undefined(name))
    }

    /// Cached relation, loading it on first access
    ///
    /// # Errors
    ///
    /// Same as [`Record::load`].
    pub async fn related(&mut self, db: &Database, name: &str) -> Result<&Loaded> {
        if !self.relations.contains_key(name) {
            self.load(db, name).await?;
        }
        self.relations
            .get(name)
            .ok_or_else(|| self.undefined(name))
    }

    fn undefined(&self, name: &str) -> Error {
        Error::RelationNotDefined {
            relation: name.to_string(),
            model: self.table.clone(),
        }
    }

    /// INSERT when the primary key is unset, otherwise UPDATE every attribute
    ///
    /// After an insert the generated identity is stored as the primary key.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyAttributes` when there is nothing to write and
    /// `Error::Database` on execution failure.
    pub async fn try_save(&mut self, db: &Database) -> Result<()> {
        if self.attributes.is_empty() {
            return Err(Error::EmptyAttributes {
                table: self.table.clone(),
            });
        }

        let primary_key = self.schema.primary_key;
        if let Some(key) = self.key() {
            let stmt = compile_update(&self.table, primary_key, key, &self.attributes);
            db.execute(&stmt).await?;
            return Ok(());
        }

        let mut columns = self.attributes.clone();
        columns.shift_remove(primary_key);
        if columns.is_empty() {
            return Err(Error::EmptyAttributes {
                table: self.table.clone(),
            });
        }
        let outcome = db.execute(&compile_insert(&self.table, &columns)).await?;
        if let Some(id) = outcome.last_insert_id {
            self.attributes.insert(primary_key.to_string(), DbValue::Int(id));
        }
        Ok(())
    }

    /// Save; `false` on failure
    pub async fn save(&mut self, db: &Database) -> bool {
        match self.try_save(db).await {
            Ok(()) => true,
            Err(e) => {
                db.report(&e);
                false
            }
        }
    }

    /// UPDATE only the given columns of this record's row
    ///
    /// The record's own attributes are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingPrimaryKey` for an unsaved record,
    /// `Error::EmptyAttributes` for empty `data` and `Error::Database` on
    /// execution failure.
    pub async fn try_update<K, V>(&self, db: &Database, data: impl IntoIterator<Item = (K, V)>) -> Result<u64>
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        let key = self.key().ok_or_else(|| Error::MissingPrimaryKey {
            table: self.table.clone(),
        })?;
        let data: Row = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if data.is_empty() {
            return Err(Error::EmptyAttributes {
                table: self.table.clone(),
            });
        }
        let stmt = compile_update(&self.table, self.schema.primary_key, key, &data);
        Ok(db.execute(&stmt).await?.rows_affected)
    }

    /// Partial update; `false` on failure
    pub async fn update<K, V>(&self, db: &Database, data: impl IntoIterator<Item = (K, V)>) -> bool
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        self.try_update(db, data)
            .await
            .map_err(|e| db.report(&e))
            .is_ok()
    }

    /// DELETE this record's row
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingPrimaryKey` for an unsaved record and
    /// `Error::Database` on execution failure.
    pub async fn try_delete(&self, db: &Database) -> Result<u64> {
        let key = self.key().ok_or_else(|| Error::MissingPrimaryKey {
            table: self.table.clone(),
        })?;
        let stmt = compile_delete(&self.table, self.schema.primary_key, key);
        Ok(db.execute(&stmt).await?.rows_affected)
    }

    /// Delete; `false` on failure
    pub async fn delete(&self, db: &Database) -> bool {
        self.try_delete(db).await.map_err(|e| db.report(&e)).is_ok()
    }

    /// Attributes followed by loaded relations, as JSON
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
            && self.attributes == other.attributes
            && self.relations == other.relations
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + self.relations.len()))?;
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        for (name, loaded) in &self.relations {
            map.serialize_entry(name, loaded)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{Model, Relation};
    use crate::statement::Statement;
    use serde_json::json;

    #[derive(crate::Model)]
    #[model(table = "users", fillable = ["name", "email"], relations = user_relations)]
    struct User;

    #[derive(crate::Model)]
    #[model(table = "posts", fillable = ["user_id", "title"], relations = post_relations)]
    struct Post;

    #[derive(crate::Model)]
    #[model(table = "tags", fillable = ["label"])]
    struct Tag;

    fn user_relations(name: &str) -> Option<Relation> {
        match name {
            "posts" => Some(Relation::has_many::<Post>("user_id")),
            _ => None,
        }
    }

    fn post_relations(name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to::<User>("user_id")),
            "tags" => Some(Relation::belongs_to_many::<Tag>("post_tag", "post_id", "tag_id")),
            _ => None,
        }
    }

    async fn setup() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.execute_raw(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT);
             CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);
             CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT);
             CREATE TABLE post_tag (post_id INTEGER, tag_id INTEGER);",
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_save_inserts_then_updates() {
        let db = setup().await;
        let mut user = User::make([("name", "Ann"), ("email", "ann@example.com")]);
        assert!(user.key().is_none());

        assert!(user.save(&db).await);
        assert_eq!(user.key(), Some(&DbValue::Int(1)));

        user.set("name", "Annie");
        assert!(user.save(&db).await);

        let rows = User::query().rows(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DbValue::from("Annie"));
    }

    #[tokio::test]
    async fn test_save_without_attributes_fails() {
        let db = setup().await;
        let mut user = User::make(Vec::<(String, DbValue)>::new());
        assert!(matches!(
            user.try_save(&db).await,
            Err(Error::EmptyAttributes { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_writes_only_given_columns() {
        let db = setup().await;
        let mut user = User::make([("name", "Ann"), ("email", "ann@example.com")]);
        user.save(&db).await;

        let changed = user.try_update(&db, [("email", "new@example.com")]).await.unwrap();
        assert_eq!(changed, 1);
        assert_eq!(user.get("email"), Some(&DbValue::from("ann@example.com")));

        let stored = User::query().find(&db, 1).await.unwrap();
        assert_eq!(stored.get("email"), Some(&DbValue::from("new@example.com")));
        assert_eq!(stored.get("name"), Some(&DbValue::from("Ann")));
    }

    #[tokio::test]
    async fn test_update_and_delete_need_a_key() {
        let db = setup().await;
        let user = User::make([("name", "Ghost")]);
        assert!(matches!(
            user.try_update(&db, [("name", "x")]).await,
            Err(Error::MissingPrimaryKey { .. })
        ));
        assert!(!user.delete(&db).await);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let db = setup().await;
        let mut user = User::make([("name", "Ann")]);
        user.save(&db).await;

        assert!(user.delete(&db).await);
        assert_eq!(User::query().count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_loaded_rows_keep_all_columns() {
        let db = setup().await;
        db.execute_raw("INSERT INTO users (name, email) VALUES ('Ann', 'a@example.com')")
            .await
            .unwrap();
        let user = User::query().first(&db).await.unwrap();
        // `id` is not fillable but must survive loading
        assert_eq!(user.key(), Some(&DbValue::Int(1)));
    }

    #[tokio::test]
    async fn test_lazy_relation_is_cached() {
        let db = setup().await;
        let mut user = User::make([("name", "Ann")]);
        user.save(&db).await;
        Post::query().create(&db, [("user_id", DbValue::Int(1)), ("title", DbValue::from("Hi"))]).await;

        assert!(user.get_relation("posts").is_none());
        assert_eq!(user.related(&db, "posts").await.unwrap().len(), 1);

        Post::query().create(&db, [("user_id", DbValue::Int(1)), ("title", DbValue::from("Again"))]).await;
        // cached value, no second query
        assert_eq!(user.related(&db, "posts").await.unwrap().len(), 1);
        // explicit load refreshes
        assert_eq!(user.load(&db, "posts").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_undefined_relation() {
        let db = setup().await;
        let mut user = User::make([("name", "Ann")]);
        assert!(matches!(
            user.load(&db, "comments").await,
            Err(Error::RelationNotDefined { .. })
        ));
    }

    #[tokio::test]
    async fn test_belongs_to_many_through_pivot() {
        let db = setup().await;
        db.execute_raw(
            "INSERT INTO posts (user_id, title) VALUES (1, 'Tagged');
             INSERT INTO tags (label) VALUES ('rust'), ('sql'), ('php');
             INSERT INTO post_tag (post_id, tag_id) VALUES (1, 1), (1, 2);",
        )
        .await
        .unwrap();

        let mut post = Post::query().find(&db, 1).await.unwrap();
        let tags = post.load(&db, "tags").await.unwrap();
        let labels: Vec<_> = tags
            .as_many()
            .iter()
            .filter_map(|t| t.get("label").cloned())
            .collect();
        assert_eq!(labels, vec![DbValue::from("rust"), DbValue::from("sql")]);
    }

    #[tokio::test]
    async fn test_to_json_includes_relations() {
        let db = setup().await;
        db.execute_raw(
            "INSERT INTO users (name, email) VALUES ('Ann', NULL);
             INSERT INTO posts (user_id, title) VALUES (1, 'Hi');",
        )
        .await
        .unwrap();

        let mut post = Post::query().find(&db, 1).await.unwrap();
        post.load(&db, "author").await.unwrap();

        assert_eq!(
            post.to_json(),
            json!({
                "id": 1, "user_id": 1, "title": "Hi",
                "author": {"id": 1, "name": "Ann", "email": null}
            })
        );
    }

    #[tokio::test]
    async fn test_custom_table_round_trip() {
        let db = setup().await;
        db.execute_raw("CREATE TABLE users_archive (id INTEGER PRIMARY KEY, name TEXT, email TEXT)")
            .await
            .unwrap();

        let archived = User::query()
            .from_table("users_archive")
            .create(&db, [("name", "Old")])
            .await
            .unwrap();
        assert_eq!(archived.table(), "users_archive");
        assert_eq!(User::query().count(&db).await, 0);

        let rows = db
            .fetch_all(&Statement::new("SELECT name FROM users_archive"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
