//! Model metadata.
//!
//! A model type carries only static facts about its table. Query state
//! lives in [`Query`] and row data in [`Record`], so a model is usually a
//! unit struct with `#[derive(Model)]`.

use crate::database::DbValue;
use crate::orm::{Query, Record, Relation};
use std::fmt;

/// Static description of a table-backed model
///
/// # Example
///
/// ```ignore
/// #[derive(Model)]
/// #[model(table = "users", fillable = ["name", "email"], relations = user_relations)]
/// struct User;
///
/// fn user_relations(name: &str) -> Option<Relation> {
///     match name {
///         "posts" => Some(Relation::has_many::<Post>("user_id")),
///         _ => None,
///     }
/// }
///
/// let admins = User::query().where_("role", "=", "admin").get(&db).await;
/// ```
pub trait Model: Sized + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Primary key column
    const PRIMARY_KEY: &'static str = "id";
    /// Mass-assignable columns; when non-empty, wins over `GUARDED`
    const FILLABLE: &'static [&'static str] = &[];
    /// Columns rejected by mass assignment
    const GUARDED: &'static [&'static str] = &[];

    /// Relation declared under `name`
    fn relation(_name: &str) -> Option<Relation> {
        None
    }

    /// Runtime copy of the static metadata
    fn schema() -> Schema {
        Schema {
            table: Self::TABLE,
            primary_key: Self::PRIMARY_KEY,
            fillable: Self::FILLABLE,
            guarded: Self::GUARDED,
            relation: Self::relation,
        }
    }

    /// Fresh query over this model's table
    fn query() -> Query {
        Query::new(Self::schema())
    }

    /// Unsaved record built through mass assignment
    fn make<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Record
    where
        K: Into<String>,
        V: Into<DbValue>,
    {
        Record::new(Self::schema(), attributes)
    }
}

fn no_relations(_name: &str) -> Option<Relation> {
    None
}

/// Copyable runtime form of a model's metadata
#[derive(Clone, Copy)]
pub struct Schema {
    /// Default table
    pub table: &'static str,
    /// Primary key column
    pub primary_key: &'static str,
    /// Mass-assignable columns
    pub fillable: &'static [&'static str],
    /// Guarded columns
    pub guarded: &'static [&'static str],
    relation: fn(&str) -> Option<Relation>,
}

impl Schema {
    /// Schema for a table with no model type behind it
    #[must_use]
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            primary_key: "id",
            fillable: &[],
            guarded: &[],
            relation: no_relations,
        }
    }

    /// Override the primary key column
    #[must_use]
    pub const fn with_primary_key(mut self, primary_key: &'static str) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Override the mass-assignable columns
    #[must_use]
    pub const fn with_fillable(mut self, fillable: &'static [&'static str]) -> Self {
        self.fillable = fillable;
        self
    }

    /// Look up a declared relation
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<Relation> {
        (self.relation)(name)
    }

    /// Whether mass assignment may set `key`
    #[must_use]
    pub fn accepts(&self, key: &str) -> bool {
        if !self.fillable.is_empty() {
            self.fillable.contains(&key)
        } else if !self.guarded.is_empty() {
            !self.guarded.contains(&key)
        } else {
            true
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("fillable", &self.fillable)
            .field("guarded", &self.guarded)
            .finish_non_exhaustive()
    }
}
