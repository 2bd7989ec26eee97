//! # Error Handling
//!
//! Centralized error types for Strata core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Every variant knows the HTTP status it surfaces as and a stable kind
//! name, which the dispatch boundary uses when rendering diagnostics.

use thiserror::Error;

/// Result type alias for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Strata runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No registered route matched the request
    #[error("No route found for {method} {path}")]
    RouteNotFound {
        /// Effective request method
        method: String,
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// `name()` was called before any route was registered
    #[error("Cannot name route '{name}': no route has been registered")]
    NoRouteToName {
        /// Requested route name
        name: String,
    },

    /// Reverse routing asked for an unknown name
    #[error("Route name not found: {name}")]
    RouteNameNotFound {
        /// Requested route name
        name: String,
    },

    /// CSRF token missing or mismatched
    #[error("Invalid CSRF token")]
    InvalidCsrfToken,

    /// A list-valued filter received no values
    #[error("Input array for column '{column}' cannot be empty")]
    EmptyInput {
        /// Column the filter was built for
        column: String,
    },

    /// Join kind outside INNER/LEFT/RIGHT/OUTER
    #[error("Invalid join type: {kind}")]
    InvalidJoinType {
        /// The rejected join kind
        kind: String,
    },

    /// Relation name not declared on the model
    #[error("Relation '{relation}' is not defined on {model}")]
    RelationNotDefined {
        /// Requested relation
        relation: String,
        /// Table of the owning model
        model: String,
    },

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// A placeholder in the statement had no bound value
    #[error("No value bound for parameter :{name}")]
    UnboundParameter {
        /// Placeholder name without the leading colon
        name: String,
    },

    /// Update or delete on a record without a primary key value
    #[error("Record in '{table}' has no primary key value")]
    MissingPrimaryKey {
        /// Table of the record
        table: String,
    },

    /// Save called on a record without attributes
    #[error("No attributes to save for '{table}'")]
    EmptyAttributes {
        /// Table of the record
        table: String,
    },

    /// Connection URL scheme is not supported
    #[error("Unsupported database URL: {url}")]
    UnsupportedDatabase {
        /// The rejected URL
        url: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Malformed request content
    #[error("Bad request: {reason}")]
    BadRequest {
        /// What was wrong with the request
        reason: String,
    },

    /// A handler task panicked or was cancelled
    #[error("Handler panicked: {message}")]
    HandlerPanicked {
        /// Panic payload, when it was a string
        message: String,
    },

    /// View rendering failed
    #[error("Failed to render view '{view}': {reason}")]
    Render {
        /// View name
        view: String,
        /// Underlying cause
        reason: String,
    },

    /// Configuration value could not be parsed
    #[error("Invalid configuration for {key}: {reason}")]
    Config {
        /// Environment key
        key: String,
        /// Parse failure
        reason: String,
    },
}

impl Error {
    /// HTTP status this error is surfaced with
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } | Self::RouteNameNotFound { .. } => 404,
            Self::InvalidCsrfToken => 419,
            Self::PayloadTooLarge { .. } => 413,
            Self::BadRequest { .. } => 400,
            _ => 500,
        }
    }

    /// Stable name of the error kind, shown on diagnostic pages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BindError { .. } => "BindError",
            Self::RouteNotFound { .. } => "RouteNotFoundError",
            Self::InvalidRoutePattern { .. } => "InvalidRoutePatternError",
            Self::NoRouteToName { .. } | Self::RouteNameNotFound { .. } => "RouteNameError",
            Self::InvalidCsrfToken => "InvalidCsrfTokenError",
            Self::EmptyInput { .. } => "EmptyInputError",
            Self::InvalidJoinType { .. } => "InvalidJoinTypeError",
            Self::RelationNotDefined { .. } => "RelationNotDefinedError",
            Self::Database { .. }
            | Self::UnboundParameter { .. }
            | Self::MissingPrimaryKey { .. }
            | Self::EmptyAttributes { .. }
            | Self::UnsupportedDatabase { .. } => "DatabaseError",
            Self::Http(_) => "HttpError",
            Self::Json(_) => "JsonError",
            Self::Io(_) => "IoError",
            Self::PayloadTooLarge { .. } => "PayloadTooLargeError",
            Self::BadRequest { .. } => "BadRequestError",
            Self::HandlerPanicked { .. } => "HandlerPanickedError",
            Self::Render { .. } => "RenderError",
            Self::Config { .. } => "ConfigError",
        }
    }

    /// Short public reason phrase for the status code
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        crate::render::reason_phrase(self.status_code())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            method: "GET".to_string(),
            path: "/unknown".to_string(),
        };
        assert!(err.to_string().contains("/unknown"));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
    }

    #[test]
    fn test_csrf_maps_to_419() {
        assert_eq!(Error::InvalidCsrfToken.status_code(), 419);
        assert_eq!(Error::InvalidCsrfToken.kind(), "InvalidCsrfTokenError");
    }

    #[test]
    fn test_builder_misuse_is_internal_error() {
        let err = Error::EmptyInput {
            column: "id".to_string(),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.kind(), "EmptyInputError");
        assert_eq!(err.reason(), "Internal Server Error");
    }
}
