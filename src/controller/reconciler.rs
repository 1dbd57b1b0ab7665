use std::io;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;

use crate::Indexer;
use crate::ObjectKey;
use crate::ReconcileError;
use crate::Resource;

/// Business logic run for one key.
///
/// Must be idempotent: the same key can be reconciled any number of times,
/// and a key whose object is gone from the cache must be handled as a
/// deletion rather than an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn reconcile(
        &self,
        key: &ObjectKey,
    ) -> Result<(), ReconcileError>;
}

/// Prints one line per reconcile describing what the cache holds for the key.
pub struct StdoutReconciler<T: Resource> {
    indexer: Arc<Indexer<T>>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl<T: Resource> StdoutReconciler<T> {
    pub fn new(indexer: Arc<Indexer<T>>) -> Self {
        Self::with_writer(indexer, io::stdout())
    }

    pub fn with_writer(
        indexer: Arc<Indexer<T>>,
        out: impl Write + Send + 'static,
    ) -> Self {
        Self {
            indexer,
            out: Mutex::new(Box::new(out)),
        }
    }
}

#[async_trait]
impl<T: Resource> Reconciler for StdoutReconciler<T> {
    async fn reconcile(
        &self,
        key: &ObjectKey,
    ) -> Result<(), ReconcileError> {
        let line = match self.indexer.get_by_key(key) {
            Some(obj) => format!("Sync/Add/Update for {} {}", T::kind(), obj.meta().name),
            None => format!("{} {} does not exist anymore", T::kind(), key),
        };
        writeln!(self.out.lock(), "{line}").map_err(|e| ReconcileError::Other(Box::new(e)))
    }
}
