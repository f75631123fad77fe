//! Committed document state of the memory engine
//!
//! Every write gets a fresh CAS from a single monotonic counter. A CAS of 0
//! means "absent" in read sets, so allocation starts at 1.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use courier_core::{DocId, Error, Keyspace, Result};

/// A committed document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDoc {
    /// Encoded content
    pub content: Vec<u8>,
    /// CAS of this version
    pub cas: u64,
}

/// A write staged by an attempt, applied at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedWrite {
    /// Insert or replace with a provisional CAS
    Put(StoredDoc),
    /// Remove
    Remove,
}

/// Shared document store backing a `MemoryEngine`.
#[derive(Debug)]
pub struct DocumentStore {
    docs: RwLock<BTreeMap<DocId, StoredDoc>>,
    next_cas: AtomicU64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            next_cas: AtomicU64::new(1),
        }
    }

    /// Allocate a CAS value
    pub fn next_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::Relaxed)
    }

    /// Write a document outside of any transaction. Returns the new CAS.
    pub fn upsert(&self, id: DocId, content: impl Into<Vec<u8>>) -> u64 {
        let cas = self.next_cas();
        self.docs.write().insert(
            id,
            StoredDoc {
                content: content.into(),
                cas,
            },
        );
        cas
    }

    /// Committed version of a document
    pub fn get(&self, id: &DocId) -> Option<StoredDoc> {
        self.docs.read().get(id).cloned()
    }

    /// Committed CAS of a document, 0 when absent
    pub fn current_cas(&self, id: &DocId) -> u64 {
        self.docs.read().get(id).map(|doc| doc.cas).unwrap_or(0)
    }

    /// Committed documents of one keyspace, ordered by key
    pub fn scan(&self, keyspace: &Keyspace) -> Vec<(DocId, StoredDoc)> {
        self.docs
            .read()
            .iter()
            .filter(|(id, _)| &id.keyspace == keyspace)
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect()
    }

    /// Number of committed documents
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Validate `reads` and apply `writes` atomically.
    ///
    /// Every entry of `reads` maps a document to the CAS observed by the
    /// attempt (0 if it was absent). If any of them changed, nothing is
    /// applied and the result is `Conflict`.
    pub fn commit(
        &self,
        reads: &HashMap<DocId, u64>,
        writes: BTreeMap<DocId, StagedWrite>,
    ) -> Result<()> {
        let mut docs = self.docs.write();

        for (id, read_cas) in reads {
            let current_cas = docs.get(id).map(|doc| doc.cas).unwrap_or(0);
            if current_cas != *read_cas {
                return Err(Error::Conflict {
                    reason: format!(
                        "{} changed since read (read cas {}, current cas {})",
                        id, read_cas, current_cas
                    ),
                });
            }
        }

        for (id, write) in writes {
            match write {
                StagedWrite::Put(doc) => {
                    docs.insert(id, doc);
                }
                StagedWrite::Remove => {
                    docs.remove(&id);
                }
            }
        }
        Ok(())
    }
}
