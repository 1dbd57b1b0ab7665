#[cfg(test)]
use mockall::automock;
use tracing::error;

use crate::metrics::UNHANDLED_ERRORS;
use crate::Error;

/// Process-wide sink for errors nobody else handles: dropped keys, sync
/// timeouts and reconciler panics.
#[cfg_attr(test, automock)]
pub trait ErrorReporter: Send + Sync + 'static {
    fn handle_error(
        &self,
        error: &Error,
    );

    fn handle_crash(
        &self,
        message: &str,
    );
}

/// Logs through `tracing` and counts by error kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn handle_error(
        &self,
        error: &Error,
    ) {
        UNHANDLED_ERRORS.with_label_values(&[error.kind()]).inc();
        error!(kind = error.kind(), "{}", error);
    }

    fn handle_crash(
        &self,
        message: &str,
    ) {
        UNHANDLED_ERRORS.with_label_values(&["panic"]).inc();
        error!("Observed a panic: {}", message);
    }
}
