use std::marker::PhantomData;

use tracing::trace;
use tracing::warn;

use crate::deletion_handling_key;
use crate::meta_namespace_key;
use crate::DeletedObject;
use crate::Delta;
use crate::ObjectKey;
use crate::RateLimitingQueue;
use crate::Resource;

/// Callbacks invoked by the reflector after each delta is applied to the
/// cache. Implementations must not block.
pub trait ResourceEventHandler<T>: Send + Sync + 'static {
    fn on_add(
        &self,
        obj: &T,
    );

    /// Also called with `old == new` on periodic resync.
    fn on_update(
        &self,
        old: &T,
        new: &T,
    );

    fn on_delete(
        &self,
        obj: &DeletedObject<T>,
    );
}

/// Routes `delta` to the matching callback.
pub fn dispatch<T: Resource>(
    handler: &dyn ResourceEventHandler<T>,
    delta: &Delta<T>,
) {
    match delta {
        Delta::Added(obj) => handler.on_add(obj),
        Delta::Updated { old, new } => handler.on_update(old, new),
        Delta::Sync(obj) => handler.on_update(obj, obj),
        Delta::Deleted(obj) => handler.on_delete(obj),
    }
}

/// Turns every delta into its object key and adds it to the queue.
///
/// Objects whose key cannot be derived are logged and dropped.
pub struct QueueingEventHandler<T> {
    queue: RateLimitingQueue<ObjectKey>,
    _resource: PhantomData<fn(&T)>,
}

impl<T> QueueingEventHandler<T> {
    pub fn new(queue: RateLimitingQueue<ObjectKey>) -> Self {
        Self {
            queue,
            _resource: PhantomData,
        }
    }

    fn enqueue(
        &self,
        event: &'static str,
        key: Result<ObjectKey, crate::ExtractionError>,
    ) where
        T: Resource,
    {
        match key {
            Ok(key) => {
                trace!(%key, event, "enqueue");
                self.queue.add(key);
            }
            Err(error) => {
                warn!(kind = T::kind(), event, %error, "couldn't get key for object, dropping");
            }
        }
    }
}

impl<T: Resource> ResourceEventHandler<T> for QueueingEventHandler<T> {
    fn on_add(
        &self,
        obj: &T,
    ) {
        self.enqueue("add", meta_namespace_key(obj));
    }

    fn on_update(
        &self,
        _old: &T,
        new: &T,
    ) {
        self.enqueue("update", meta_namespace_key(new));
    }

    fn on_delete(
        &self,
        obj: &DeletedObject<T>,
    ) {
        self.enqueue("delete", deletion_handling_key(obj));
    }
}
