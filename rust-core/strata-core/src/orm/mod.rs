//! # Active Record ORM
//!
//! Fluent query building over one shared [`Database`](crate::Database).
//!
//! - [`Model`] / [`Schema`]: static table metadata
//! - [`Query`]: builder state, compiled to one parameterized statement per terminal call
//! - [`Record`]: one materialized row plus its loaded relations
//! - [`Relation`]: declarative relationship descriptors
//! - [`Page`] / [`Pagination`]: paginated results
//!
//! Terminal operations come in pairs. `try_*` returns a `Result`; the
//! plain form reports the error through the database's reporter and
//! returns an empty value instead.

mod compile;
mod model;
mod paginate;
mod query;
mod record;
mod relation;

pub use compile::Target;
pub use model::{Model, Schema};
pub use paginate::{Page, Pagination};
pub use query::{JoinType, Query};
pub use record::Record;
pub use relation::{Loaded, Relation};
