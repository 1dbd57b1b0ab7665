use std::sync::Arc;

use parking_lot::Mutex;

use crate::deletion_handling_key;
use crate::meta_namespace_key;
use crate::DeletedObject;
use crate::Indexer;
use crate::ObjectKey;
use crate::Resource;
use crate::ResourceEventHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub event: &'static str,
    pub key: String,
    /// Whether the cache held the key when the callback ran
    pub cached: Option<bool>,
    pub tombstone: bool,
}

/// Event handler that records every callback.
pub struct RecordingHandler<T> {
    events: Mutex<Vec<Recorded>>,
    store: Option<Arc<Indexer<T>>>,
}

impl<T: Resource> RecordingHandler<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            store: None,
        })
    }

    /// Also records whether `store` contains the key at callback time.
    pub fn probing(store: Arc<Indexer<T>>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            store: Some(store),
        })
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    /// `"<event> <key>"` per callback.
    pub fn summary(&self) -> Vec<String> {
        self.events.lock().iter().map(|r| format!("{} {}", r.event, r.key)).collect()
    }

    fn record(
        &self,
        event: &'static str,
        key: Option<ObjectKey>,
        tombstone: bool,
    ) {
        let cached = match (&self.store, &key) {
            (Some(store), Some(key)) => Some(store.get_by_key(key).is_some()),
            _ => None,
        };
        self.events.lock().push(Recorded {
            event,
            key: key.map(|k| k.to_string()).unwrap_or_default(),
            cached,
            tombstone,
        });
    }
}

impl<T: Resource> ResourceEventHandler<T> for RecordingHandler<T> {
    fn on_add(
        &self,
        obj: &T,
    ) {
        self.record("add", meta_namespace_key(obj).ok(), false);
    }

    fn on_update(
        &self,
        _old: &T,
        new: &T,
    ) {
        self.record("update", meta_namespace_key(new).ok(), false);
    }

    fn on_delete(
        &self,
        obj: &DeletedObject<T>,
    ) {
        self.record("delete", deletion_handling_key(obj).ok(), obj.is_tombstone());
    }
}
