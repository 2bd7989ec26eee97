//! # Strata Core
//!
//! Core library for the Strata web framework: an active-record query
//! builder over one shared database connection, and a router that
//! dispatches requests through middleware, CSRF protection and an error
//! boundary to handlers.
//!
//! ## Modules
//!
//! - `orm` - Models, the fluent query builder, records and relations
//! - `database` - Shared SQLite/MySQL connection via sqlx
//! - `statement` - Named-parameter SQL statements
//! - `router` / `route` / `dispatch` - Route table, patterns and dispatch
//! - `handler` - Handler signatures and response conversion
//! - `middleware` - Request/response middleware system
//! - `csrf` / `session` - Session-bound CSRF tokens
//! - `request` / `response` - HTTP request and response wrappers
//! - `render` / `report` - View and error-reporting collaborators
//! - `server` - HTTP server built on Hyper
//! - `config` / `telemetry` - Environment configuration and tracing setup
//! - `state` - Typed application state
//! - `json` - JSON parsing with simd-json
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

extern crate self as strata_core;

pub mod config;
pub mod csrf;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod json;
pub mod middleware;
pub mod orm;
pub mod render;
pub mod report;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod statement;
pub mod telemetry;

pub use config::AppConfig;
pub use database::{Database, DbValue, ExecOutcome, Row};
pub use error::{Error, Result};
pub use handler::{IntoHandler, IntoResponse, Json, Params};
pub use json::{parse_json, to_json};
pub use middleware::{
    LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareResult, SessionAuthMiddleware,
};
pub use orm::{JoinType, Model, Page, Pagination, Query, Record, Relation, Schema};
pub use render::{DefaultRenderer, FileRenderer, Renderer};
pub use report::{ErrorReporter, TracingReporter};
pub use request::Request;
pub use response::Response;
pub use router::{Method, Router};
pub use server::{Server, ServerConfig};
pub use session::{Session, SessionStore};
pub use state::AppState;
pub use statement::Statement;
pub use strata_macros::Model;
pub use telemetry::{init_tracing, LogFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
