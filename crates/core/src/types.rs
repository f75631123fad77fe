//! Identifier types shared by the engine boundary and the bridge
//!
//! - Keyspace: bucket/scope/collection triple addressing a set of documents
//! - DocId: a document key inside a keyspace
//! - AttemptId: bridge-side identity of one attempt invocation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Name of the implicit scope and collection inside every bucket.
pub const DEFAULT_NAME: &str = "_default";

/// A bucket/scope/collection triple.
///
/// Displays (and parses) as `bucket.scope.collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Keyspace {
    /// Bucket name
    pub bucket: String,
    /// Scope name
    pub scope: String,
    /// Collection name
    pub collection: String,
}

impl Keyspace {
    /// Create a keyspace from its three components.
    pub fn new(
        bucket: impl Into<String>,
        scope: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            scope: scope.into(),
            collection: collection.into(),
        }
    }

    /// The default collection of a bucket (`bucket._default._default`).
    pub fn default_collection(bucket: impl Into<String>) -> Self {
        Self::new(bucket, DEFAULT_NAME, DEFAULT_NAME)
    }

    /// Address a document inside this keyspace.
    pub fn doc(&self, key: impl Into<String>) -> DocId {
        DocId::new(self.clone(), key)
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.bucket, self.scope, self.collection)
    }
}

impl FromStr for Keyspace {
    type Err = Error;

    /// Accepts `bucket` (default collection) or `bucket.scope.collection`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::invalid_argument(format!(
                "keyspace '{}' has an empty component",
                s
            )));
        }
        match parts.as_slice() {
            [bucket] => Ok(Keyspace::default_collection(*bucket)),
            [bucket, scope, collection] => Ok(Keyspace::new(*bucket, *scope, *collection)),
            _ => Err(Error::invalid_argument(format!(
                "keyspace '{}' must be 'bucket' or 'bucket.scope.collection'",
                s
            ))),
        }
    }
}

/// Fully qualified document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId {
    /// Keyspace holding the document
    pub keyspace: Keyspace,
    /// Document key
    pub key: String,
}

impl DocId {
    /// Create a document id.
    pub fn new(keyspace: Keyspace, key: impl Into<String>) -> Self {
        Self {
            keyspace,
            key: key.into(),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.keyspace, self.key)
    }
}

/// Identity of one attempt invocation, assigned by the bridge.
///
/// Results carry the id of the attempt that produced them so that
/// replace/remove can reject results from another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}
