//! # Error Reporting
//!
//! The reporter is the sink for every error swallowed at an operation
//! boundary (ORM terminals, dispatch). Reporting must never fail.

use crate::error::Error;
use tracing::error;

/// Receives errors that are handled without propagating to the caller
pub trait ErrorReporter: Send + Sync {
    /// Record an error. Implementations must not panic.
    fn report(&self, error: &Error);
}

/// Default reporter: one structured `error!` event per report
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &Error) {
        error!(
            kind = err.kind(),
            status = err.status_code(),
            error = %err,
            "Unhandled error"
        );
    }
}

impl<F> ErrorReporter for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn report(&self, error: &Error) {
        self(error);
    }
}
