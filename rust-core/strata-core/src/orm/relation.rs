//! Relationship descriptors and their resolution.

use crate::database::{Database, DbValue};
use crate::error::Result;
use crate::middleware::BoxFuture;
use crate::orm::{Model, Query, Record, Schema};
use serde::Serialize;

/// A declared relationship from one model to another
#[derive(Debug, Clone)]
pub enum Relation {
    /// Target row whose `foreign_key` equals this record's `local_key`
    HasOne {
        /// Target model
        related: Schema,
        /// Column on the target table
        foreign_key: String,
        /// Column on this table
        local_key: String,
    },
    /// All target rows whose `foreign_key` equals this record's `local_key`
    HasMany {
        /// Target model
        related: Schema,
        /// Column on the target table
        foreign_key: String,
        /// Column on this table
        local_key: String,
    },
    /// Target row whose `owner_key` equals this record's `foreign_key`
    BelongsTo {
        /// Target model
        related: Schema,
        /// Column on this table
        foreign_key: String,
        /// Column on the target table
        owner_key: String,
    },
    /// Target rows linked through a pivot table
    BelongsToMany {
        /// Target model
        related: Schema,
        /// Pivot table
        pivot_table: String,
        /// Pivot column pointing at this table
        foreign_key: String,
        /// Pivot column pointing at the target table
        related_key: String,
        /// Column on this table referenced by `foreign_key`
        local_key: String,
        /// Column on the target table referenced by `related_key`
        related_local_key: String,
    },
}

impl Relation {
    /// One-to-one, local key `id`
    #[must_use]
    pub fn has_one<M: Model>(foreign_key: &str) -> Self {
        Self::HasOne {
            related: M::schema(),
            foreign_key: foreign_key.to_string(),
            local_key: "id".to_string(),
        }
    }

    /// One-to-many, local key `id`
    #[must_use]
    pub fn has_many<M: Model>(foreign_key: &str) -> Self {
        Self::HasMany {
            related: M::schema(),
            foreign_key: foreign_key.to_string(),
            local_key: "id".to_string(),
        }
    }

    /// Inverse of one-to-one/one-to-many, owner key is the target's primary key
    #[must_use]
    pub fn belongs_to<M: Model>(foreign_key: &str) -> Self {
        Self::BelongsTo {
            related: M::schema(),
            foreign_key: foreign_key.to_string(),
            owner_key: M::PRIMARY_KEY.to_string(),
        }
    }

    /// Many-to-many through `pivot_table`, both local keys `id`
    #[must_use]
    pub fn belongs_to_many<M: Model>(pivot_table: &str, foreign_key: &str, related_key: &str) -> Self {
        Self::BelongsToMany {
            related: M::schema(),
            pivot_table: pivot_table.to_string(),
            foreign_key: foreign_key.to_string(),
            related_key: related_key.to_string(),
            local_key: "id".to_string(),
            related_local_key: "id".to_string(),
        }
    }

    /// Override the column on this table (`HasOne`, `HasMany`, `BelongsToMany`)
    #[must_use]
    pub fn local_key(mut self, key: &str) -> Self {
        match &mut self {
            Self::HasOne { local_key, .. }
            | Self::HasMany { local_key, .. }
            | Self::BelongsToMany { local_key, .. } => *local_key = key.to_string(),
            Self::BelongsTo { .. } => {}
        }
        self
    }

    /// Override the referenced column on the target table (`BelongsTo`)
    #[must_use]
    pub fn owner_key(mut self, key: &str) -> Self {
        if let Self::BelongsTo { owner_key, .. } = &mut self {
            *owner_key = key.to_string();
        }
        self
    }

    /// Override the target column joined to the pivot (`BelongsToMany`)
    #[must_use]
    pub fn related_local_key(mut self, key: &str) -> Self {
        if let Self::BelongsToMany {
            related_local_key, ..
        } = &mut self
        {
            *related_local_key = key.to_string();
        }
        self
    }

    /// Run the relation for `owner`
    ///
    /// A missing or null key on the owner resolves to an empty result
    /// without touching the database.
    pub(crate) fn resolve<'a>(&'a self, db: &'a Database, owner: &Record) -> BoxFuture<'a, Result<Loaded>> {
        let key_column = match self {
            Self::HasOne { local_key, .. }
            | Self::HasMany { local_key, .. }
            | Self::BelongsToMany { local_key, .. } => local_key,
            Self::BelongsTo { foreign_key, .. } => foreign_key,
        };
        let key = owner.get(key_column).filter(|v| !v.is_null()).cloned();

        Box::pin(async move {
            let Some(key) = key else {
                return Ok(match self {
                    Self::HasOne { .. } | Self::BelongsTo { .. } => Loaded::One(None),
                    Self::HasMany { .. } | Self::BelongsToMany { .. } => Loaded::Many(Vec::new()),
                });
            };

            match self {
                Self::HasOne {
                    related,
                    foreign_key,
                    ..
                } => Ok(Loaded::single(
                    Query::new(*related)
                        .where_(foreign_key, "=", key)
                        .try_first(db)
                        .await?,
                )),
                Self::BelongsTo {
                    related, owner_key, ..
                } => Ok(Loaded::single(
                    Query::new(*related)
                        .where_(owner_key, "=", key)
                        .try_first(db)
                        .await?,
                )),
                Self::HasMany {
                    related,
                    foreign_key,
                    ..
                } => Ok(Loaded::Many(
                    Query::new(*related)
                        .where_(foreign_key, "=", key)
                        .try_get(db)
                        .await?,
                )),
                Self::BelongsToMany {
                    related,
                    pivot_table,
                    foreign_key,
                    related_key,
                    related_local_key,
                    ..
                } => {
                    let target = related.table;
                    Ok(Loaded::Many(
                        Query::new(*related)
                            .select([format!("{target}.*")])
                            .inner_join(
                                pivot_table,
                                &format!("{target}.{related_local_key}"),
                                "=",
                                &format!("{pivot_table}.{related_key}"),
                            )
                            .where_(&format!("{pivot_table}.{foreign_key}"), "=", key)
                            .try_get(db)
                            .await?,
                    ))
                }
            }
        })
    }
}

/// Resolved value of a relation, cached on the owning record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Loaded {
    /// `HasOne` / `BelongsTo`
    One(Option<Box<Record>>),
    /// `HasMany` / `BelongsToMany`
    Many(Vec<Record>),
}

impl Loaded {
    pub(crate) fn single(record: Option<Record>) -> Self {
        Self::One(record.map(Box::new))
    }

    /// The related record of a to-one relation
    #[must_use]
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_deref(),
            Self::Many(_) => None,
        }
    }

    /// The related records of a to-many relation; a to-one relation yields
    /// zero or one record
    #[must_use]
    pub fn as_many(&self) -> &[Record] {
        match self {
            Self::One(Some(record)) => std::slice::from_ref(record),
            Self::One(None) => &[],
            Self::Many(records) => records,
        }
    }

    /// Number of related records
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_many().len()
    }

    /// Whether nothing is related
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
