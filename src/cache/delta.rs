use std::sync::Arc;

use super::deletion_handling_key;
use super::meta_namespace_key;
use super::ObjectKey;
use super::Resource;
use crate::ExtractionError;

/// Final state of an object whose deletion was missed while the watch was
/// down. Only the key it was cached under is guaranteed.
#[derive(Debug)]
pub struct DeletedFinalStateUnknown<T> {
    pub key: ObjectKey,
    /// Last snapshot the cache held, if any
    pub obj: Option<Arc<T>>,
}

impl<T> Clone for DeletedFinalStateUnknown<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            obj: self.obj.clone(),
        }
    }
}

/// Payload of a delete delta.
#[derive(Debug)]
pub enum DeletedObject<T> {
    /// Final state observed on the watch stream
    Object(Arc<T>),
    /// Deletion inferred from a relist
    Tombstone(DeletedFinalStateUnknown<T>),
}

impl<T> Clone for DeletedObject<T> {
    fn clone(&self) -> Self {
        match self {
            DeletedObject::Object(obj) => DeletedObject::Object(obj.clone()),
            DeletedObject::Tombstone(t) => DeletedObject::Tombstone(t.clone()),
        }
    }
}

impl<T> DeletedObject<T> {
    /// Best known final state, if any.
    pub fn object(&self) -> Option<&Arc<T>> {
        match self {
            DeletedObject::Object(obj) => Some(obj),
            DeletedObject::Tombstone(t) => t.obj.as_ref(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, DeletedObject::Tombstone(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaType {
    Added,
    Updated,
    Deleted,
    /// Periodic resync of an unchanged object
    Sync,
}

impl DeltaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaType::Added => "added",
            DeltaType::Updated => "updated",
            DeltaType::Deleted => "deleted",
            DeltaType::Sync => "sync",
        }
    }
}

/// A single observed change, already reconciled against the cache.
#[derive(Debug)]
pub enum Delta<T> {
    Added(Arc<T>),
    Updated { old: Arc<T>, new: Arc<T> },
    Deleted(DeletedObject<T>),
    Sync(Arc<T>),
}

impl<T> Clone for Delta<T> {
    fn clone(&self) -> Self {
        match self {
            Delta::Added(obj) => Delta::Added(obj.clone()),
            Delta::Updated { old, new } => Delta::Updated {
                old: old.clone(),
                new: new.clone(),
            },
            Delta::Deleted(obj) => Delta::Deleted(obj.clone()),
            Delta::Sync(obj) => Delta::Sync(obj.clone()),
        }
    }
}

impl<T: Resource> Delta<T> {
    pub fn delta_type(&self) -> DeltaType {
        match self {
            Delta::Added(_) => DeltaType::Added,
            Delta::Updated { .. } => DeltaType::Updated,
            Delta::Deleted(_) => DeltaType::Deleted,
            Delta::Sync(_) => DeltaType::Sync,
        }
    }

    /// Key of the object the delta refers to.
    pub fn key(&self) -> Result<ObjectKey, ExtractionError> {
        match self {
            Delta::Added(obj) | Delta::Sync(obj) | Delta::Updated { new: obj, .. } => {
                meta_namespace_key(obj.as_ref())
            }
            Delta::Deleted(obj) => deletion_handling_key(obj),
        }
    }
}
