//! Controller Error Hierarchy
//!
//! Defines the error types of the reconciliation core, categorized by the
//! component that raises them: key extraction, the local cache, the remote
//! watch source, reconciliation and startup orchestration.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

use crate::ObjectKey;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (background tasks, signalling, metrics)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Control loop failures
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Identity could not be derived from a delta
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Stop signal fired before the initial listing was applied
    #[error("Timed out waiting for caches to sync")]
    CacheSyncTimeout,

    /// Local cache failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote watch source failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Key exceeded the retry ceiling and was dropped from the queue
    #[error("Dropping {key} out of the queue after {attempts} attempts: {source}")]
    RetryExhausted {
        key: ObjectKey,
        attempts: usize,
        #[source]
        source: ReconcileError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Object carries no name
    #[error("object has no name")]
    MissingName,

    /// Key string does not have the `namespace/name` or `name` shape
    #[error("unexpected key format: {0:?}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Indexers can only be registered before the store holds items
    #[error("cannot add indexers to a store that already has {0} items")]
    IndexersAfterItems(usize),

    /// Indexer name registered twice
    #[error("indexer conflict: {0}")]
    IndexerConflict(String),

    /// Lookup through an index that was never registered
    #[error("index with name {0} does not exist")]
    IndexNotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Requested resource version is too old; the caller must relist
    #[error("resource version {0:?} expired, relist required")]
    Expired(String),

    /// Listing the collection failed
    #[error("list failed: {0}")]
    ListFailed(String),

    /// Establishing or reading the watch stream failed
    #[error("watch failed: {0}")]
    WatchFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Reading current state from the cache failed
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Reconciler panicked; the panic payload is kept as text
    #[error("reconciler panicked: {0}")]
    Panicked(String),

    /// Any other failure raised by business logic
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// A single attempt of a retried task exceeded its timeout
    #[error("Task timed out after {0:?}")]
    TaskTimeout(Duration),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

// ============== Conversion Implementations ============== //
impl From<ExtractionError> for Error {
    fn from(e: ExtractionError) -> Self {
        Error::Controller(ControllerError::Extraction(e))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Controller(ControllerError::Store(e))
    }
}

impl From<WatchError> for Error {
    fn from(e: WatchError) -> Self {
        Error::Controller(ControllerError::Watch(e))
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        SystemError::TaskFailed(err).into()
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        SystemError::Metrics(err).into()
    }
}

impl Error {
    /// Short label used by metrics and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::System(_) => "system",
            Error::Config(_) => "config",
            Error::Controller(ControllerError::Extraction(_)) => "extraction",
            Error::Controller(ControllerError::CacheSyncTimeout) => "cache_sync_timeout",
            Error::Controller(ControllerError::Store(_)) => "store",
            Error::Controller(ControllerError::Watch(_)) => "watch",
            Error::Controller(ControllerError::RetryExhausted { .. }) => "retry_exhausted",
            Error::Fatal(_) => "fatal",
        }
    }

    /// Whether this error was raised because the stop signal beat the cache sync.
    pub fn is_sync_timeout(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::CacheSyncTimeout))
    }
}
