//! Thread-safe, indexed, in-memory mirror of the remote collection.
//!
//! The [`Indexer`] is written only by the reflector and read by any number
//! of workers. All operations take a short `parking_lot` lock and never touch
//! the network, so reads never block on remote activity.
//!
//! Besides primary lookup by [`ObjectKey`], named secondary indexes can be
//! registered before the first item arrives; they are maintained on every
//! mutation.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::warn;

use super::meta_namespace_key;
use super::DeletedFinalStateUnknown;
use super::DeletedObject;
use super::Delta;
use super::ObjectKey;
use super::Resource;
use crate::Result;
use crate::StoreError;

/// Name of the built-in namespace index.
pub const NAMESPACE_INDEX: &str = "namespace";

/// Computes the index values an object is filed under.
pub type IndexFunc<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Index functions keyed by index name.
pub type Indexers<T> = HashMap<String, IndexFunc<T>>;

type Index = HashMap<String, HashSet<ObjectKey>>;

/// Indexes objects by namespace; cluster-scoped objects land under `""`.
pub fn namespace_index_func<T: Resource>() -> IndexFunc<T> {
    Arc::new(|obj: &T| vec![obj.meta().namespace.clone().unwrap_or_default()])
}

struct StoreState<T> {
    items: HashMap<ObjectKey, Arc<T>>,
    indexers: Indexers<T>,
    indices: HashMap<String, Index>,
}

impl<T> StoreState<T> {
    fn update_indices(
        &mut self,
        old: Option<&T>,
        new: Option<&T>,
        key: &ObjectKey,
    ) {
        let StoreState { indexers, indices, .. } = self;
        for (name, index_func) in indexers.iter() {
            let index = indices.entry(name.clone()).or_default();

            for value in old.map(|o| index_func(o)).unwrap_or_default() {
                if let Some(set) = index.get_mut(&value) {
                    set.remove(key);
                    if set.is_empty() {
                        index.remove(&value);
                    }
                }
            }
            for value in new.map(|n| index_func(n)).unwrap_or_default() {
                index.entry(value).or_default().insert(key.clone());
            }
        }
    }

    fn rebuild_indices(&mut self) {
        self.indices.clear();
        let items: Vec<(ObjectKey, Arc<T>)> =
            self.items.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (key, obj) in items {
            self.update_indices(None, Some(obj.as_ref()), &key);
        }
    }

    fn insert(
        &mut self,
        key: ObjectKey,
        obj: Arc<T>,
    ) -> Option<Arc<T>> {
        let old = self.items.insert(key.clone(), obj.clone());
        self.update_indices(old.as_deref(), Some(obj.as_ref()), &key);
        old
    }

    fn remove(
        &mut self,
        key: &ObjectKey,
    ) -> Option<Arc<T>> {
        let old = self.items.remove(key);
        if let Some(ref old) = old {
            self.update_indices(Some(old.as_ref()), None, key);
        }
        old
    }
}

/// Local indexed cache.
pub struct Indexer<T> {
    state: RwLock<StoreState<T>>,
}

impl<T: Resource> Default for Indexer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> Indexer<T> {
    pub fn new() -> Self {
        Self::with_indexers(Indexers::new())
    }

    pub fn with_indexers(indexers: Indexers<T>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                items: HashMap::new(),
                indexers,
                indices: HashMap::new(),
            }),
        }
    }

    /// Registers more index functions.
    ///
    /// # Errors
    /// - the store already holds items
    /// - an index with the same name is already registered
    pub fn add_indexers(
        &self,
        new_indexers: Indexers<T>,
    ) -> Result<()> {
        let mut state = self.state.write();
        if !state.items.is_empty() {
            return Err(StoreError::IndexersAfterItems(state.items.len()).into());
        }
        if let Some(name) = new_indexers.keys().find(|name| state.indexers.contains_key(*name)) {
            return Err(StoreError::IndexerConflict(name.clone()).into());
        }
        state.indexers.extend(new_indexers);
        Ok(())
    }

    /// Current snapshot stored under `key`; `None` means it does not exist.
    pub fn get_by_key(
        &self,
        key: &ObjectKey,
    ) -> Option<Arc<T>> {
        self.state.read().items.get(key).cloned()
    }

    /// Cached snapshot of the object with the same identity as `obj`.
    pub fn get(
        &self,
        obj: &T,
    ) -> Result<Option<Arc<T>>> {
        let key = meta_namespace_key(obj)?;
        Ok(self.get_by_key(&key))
    }

    pub fn list(&self) -> Vec<Arc<T>> {
        self.state.read().items.values().cloned().collect()
    }

    pub fn list_keys(&self) -> Vec<ObjectKey> {
        self.state.read().items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    /// Inserts or overwrites `obj`, returning the delta that describes the
    /// transition (`Added` when the key was unknown, `Updated` otherwise).
    pub fn upsert(
        &self,
        obj: Arc<T>,
    ) -> Result<Delta<T>> {
        let key = meta_namespace_key(obj.as_ref())?;
        let old = self.state.write().insert(key, obj.clone());
        Ok(match old {
            Some(old) => Delta::Updated { old, new: obj },
            None => Delta::Added(obj),
        })
    }

    /// Removes the object and returns the matching delete delta.
    pub fn delete(
        &self,
        obj: DeletedObject<T>,
    ) -> Result<Delta<T>> {
        let key = super::deletion_handling_key(&obj)?;
        self.state.write().remove(&key);
        Ok(Delta::Deleted(obj))
    }

    /// Applies an already-classified delta; returns the previous snapshot.
    pub fn apply_delta(
        &self,
        delta: &Delta<T>,
    ) -> Result<Option<Arc<T>>> {
        let key = delta.key()?;
        let mut state = self.state.write();
        let old = match delta {
            Delta::Added(obj) | Delta::Sync(obj) | Delta::Updated { new: obj, .. } => {
                state.insert(key, obj.clone())
            }
            Delta::Deleted(_) => state.remove(&key),
        };
        Ok(old)
    }

    /// Swaps the whole content for a fresh listing.
    ///
    /// Returns, in listing order, an `Added` or `Updated` delta for every
    /// listed object, followed by a tombstoned `Deleted` delta for every
    /// cached key the listing no longer contains. Objects without a usable
    /// identity are skipped.
    pub fn replace(
        &self,
        items: Vec<Arc<T>>,
    ) -> Vec<Delta<T>> {
        let mut fresh: HashMap<ObjectKey, Arc<T>> = HashMap::with_capacity(items.len());
        let mut deltas = Vec::with_capacity(items.len());

        let mut state = self.state.write();
        for obj in items {
            let key = match meta_namespace_key(obj.as_ref()) {
                Ok(key) => key,
                Err(e) => {
                    warn!("skip listed object without identity: {:?}", e);
                    continue;
                }
            };
            match state.items.get(&key) {
                Some(old) => deltas.push(Delta::Updated {
                    old: old.clone(),
                    new: obj.clone(),
                }),
                None => deltas.push(Delta::Added(obj.clone())),
            }
            fresh.insert(key, obj);
        }

        for (key, old) in state.items.iter() {
            if !fresh.contains_key(key) {
                debug!(%key, "object vanished during relist");
                deltas.push(Delta::Deleted(DeletedObject::Tombstone(DeletedFinalStateUnknown {
                    key: key.clone(),
                    obj: Some(old.clone()),
                })));
            }
        }

        state.items = fresh;
        state.rebuild_indices();
        deltas
    }

    /// `Sync` deltas for every cached object, used by periodic resync.
    pub fn sync_deltas(&self) -> Vec<Delta<T>> {
        self.state
            .read()
            .items
            .values()
            .map(|obj| Delta::Sync(obj.clone()))
            .collect()
    }

    /// Objects filed under `value` in the named index.
    pub fn by_index(
        &self,
        index_name: &str,
        value: &str,
    ) -> Result<Vec<Arc<T>>> {
        let state = self.state.read();
        if !state.indexers.contains_key(index_name) {
            return Err(StoreError::IndexNotFound(index_name.to_string()).into());
        }
        Ok(state
            .indices
            .get(index_name)
            .and_then(|index| index.get(value))
            .map(|keys| keys.iter().filter_map(|k| state.items.get(k).cloned()).collect())
            .unwrap_or_default())
    }

    /// Keys filed under `value` in the named index.
    pub fn index_keys(
        &self,
        index_name: &str,
        value: &str,
    ) -> Result<Vec<ObjectKey>> {
        let state = self.state.read();
        if !state.indexers.contains_key(index_name) {
            return Err(StoreError::IndexNotFound(index_name.to_string()).into());
        }
        Ok(state
            .indices
            .get(index_name)
            .and_then(|index| index.get(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// All values currently present in the named index.
    pub fn list_index_func_values(
        &self,
        index_name: &str,
    ) -> Vec<String> {
        self.state
            .read()
            .indices
            .get(index_name)
            .map(|index| index.keys().cloned().collect())
            .unwrap_or_default()
    }
}
