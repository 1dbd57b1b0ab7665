//! Object identity and canonical key derivation.
//!
//! Every object mirrored by the cache is addressed by an [`ObjectKey`] of the
//! form `namespace/name`, or plain `name` for cluster-scoped objects. Keys are
//! derived deterministically from [`ObjectMeta`], so two deltas for the same
//! underlying object always route to the same queue entry.

use std::fmt;

use super::DeletedObject;
use crate::ExtractionError;

/// Canonical identity of a cached object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Builds a key from an optional namespace and a name.
    ///
    /// An empty namespace is treated as cluster scope.
    pub fn new(
        namespace: Option<&str>,
        name: &str,
    ) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Self(format!("{ns}/{name}")),
            _ => Self(name.to_string()),
        }
    }

    /// Parses and validates a key string.
    pub fn parse(key: &str) -> Result<Self, ExtractionError> {
        split_meta_namespace_key(key)?;
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `(namespace, name)`; namespace is `None` for cluster scope.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.0.split_once('/') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, self.0.as_str()),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.split().0
    }

    pub fn name(&self) -> &str {
        self.split().1
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity and version metadata carried by every cached object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub namespace: Option<String>,
    pub name: String,
    /// Opaque version assigned by the remote store on every write
    pub resource_version: String,
    pub uid: String,
}

impl ObjectMeta {
    pub fn new(
        namespace: Option<&str>,
        name: &str,
    ) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_resource_version(
        mut self,
        resource_version: impl Into<String>,
    ) -> Self {
        self.resource_version = resource_version.into();
        self
    }

    pub fn with_uid(
        mut self,
        uid: impl Into<String>,
    ) -> Self {
        self.uid = uid.into();
        self
    }
}

/// An object kind that can be listed, watched and cached.
pub trait Resource: Send + Sync + 'static {
    fn meta(&self) -> &ObjectMeta;

    /// Human readable kind used in diagnostics, e.g. `"Pod"`.
    fn kind() -> &'static str
    where
        Self: Sized,
    {
        "Object"
    }
}

/// Derives `namespace/name` (or `name`) from an object's metadata.
pub fn meta_namespace_key<T: Resource>(obj: &T) -> Result<ObjectKey, ExtractionError> {
    let meta = obj.meta();
    if meta.name.is_empty() {
        return Err(ExtractionError::MissingName);
    }
    Ok(ObjectKey::new(meta.namespace.as_deref(), &meta.name))
}

/// Key extractor for delete deltas.
///
/// A tombstone already carries the key it was stored under, so it is used as
/// is; a regular final-state object goes through [`meta_namespace_key`].
pub fn deletion_handling_key<T: Resource>(obj: &DeletedObject<T>) -> Result<ObjectKey, ExtractionError> {
    match obj {
        DeletedObject::Tombstone(tombstone) => Ok(tombstone.key.clone()),
        DeletedObject::Object(obj) => meta_namespace_key(obj.as_ref()),
    }
}

/// Splits a key into `(namespace, name)`.
///
/// Accepts `name` and `namespace/name`; anything with more separators or an
/// empty name is rejected.
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str), ExtractionError> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok((None, name)),
        (Some(ns), Some(name), None) if !name.is_empty() => {
            Ok(((!ns.is_empty()).then_some(ns), name))
        }
        _ => Err(ExtractionError::InvalidKey(key.to_string())),
    }
}
