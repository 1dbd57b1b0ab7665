use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::WatchError;

/// Full listing of a collection at a point in time.
#[derive(Debug, Clone)]
pub struct ObjectList<T> {
    pub items: Vec<T>,
    /// Version to resume the watch from
    pub resource_version: String,
}

/// One change reported by the remote watch.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    /// Carries the final observed state of the object
    Deleted(T),
    /// Progress marker; only advances the resume version
    Bookmark { resource_version: String },
}

pub type WatchStream<T> = BoxStream<'static, Result<WatchEvent<T>, WatchError>>;

/// Remote, authoritative source of a collection of `T`.
///
/// Implementations wrap a concrete transport. A watch started from a version
/// the server no longer retains must fail (either from `watch` or as a stream
/// item) with [`WatchError::Expired`], which makes the reflector relist.
#[async_trait]
pub trait ListWatch<T>: Send + Sync + 'static {
    async fn list(&self) -> Result<ObjectList<T>, WatchError>;

    async fn watch(
        &self,
        resource_version: &str,
    ) -> Result<WatchStream<T>, WatchError>;
}
