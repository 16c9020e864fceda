//! Store-level models shared by every implementation

use crate::error::StoreError;
use futures::stream::BoxStream;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;

/// Change notification for a watched resource kind
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    /// Object appeared (including objects replayed when a watch starts)
    Added(K),
    /// Object changed (spec, metadata or status)
    Modified(K),
    /// Object is gone
    Deleted(K),
}

impl<K> WatchEvent<K> {
    /// The object carried by the event
    pub fn object(&self) -> &K {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Deleted(_) => "deleted",
        }
    }
}

/// Stream of change notifications; ends only when the store gives up
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, StoreError>>;

/// Namespaced identity of a single object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a key from object metadata, `None` when the object has no name
    pub fn from_meta(meta: &ObjectMeta, default_namespace: &str) -> Option<Self> {
        let name = meta.name.clone()?;
        let namespace = meta
            .namespace
            .clone()
            .unwrap_or_else(|| default_namespace.to_string());
        Some(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
