//! Per-attempt staging for the memory engine
//!
//! An attempt sees committed state overlaid with its own staged writes.
//! Every committed version it observes is recorded in its read set and
//! re-validated at commit.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use courier_core::{DocId, DocRef, Error, Keyspace, RawDocument, Result};

use super::store::{DocumentStore, StagedWrite, StoredDoc};

#[derive(Debug, Default)]
struct AttemptState {
    staged: BTreeMap<DocId, StagedWrite>,
    reads: HashMap<DocId, u64>,
}

/// Engine-side state of one attempt.
#[derive(Debug)]
pub struct MemoryAttempt {
    number: usize,
    deadline: Instant,
    live: AtomicBool,
    state: Mutex<AttemptState>,
}

impl MemoryAttempt {
    pub(crate) fn new(number: usize, deadline: Instant) -> Self {
        Self {
            number,
            deadline,
            live: AtomicBool::new(true),
            state: Mutex::new(AttemptState::default()),
        }
    }

    /// Zero-based attempt number within its transaction
    pub fn number(&self) -> usize {
        self.number
    }

    /// Whether operations may still be issued
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Fails once the attempt function returned or the deadline passed.
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if !self.is_live() {
            return Err(Error::invalid_operation(format!(
                "attempt {} is no longer active",
                self.number
            )));
        }
        if Instant::now() >= self.deadline {
            return Err(Error::AttemptExpired);
        }
        Ok(())
    }

    /// Document as visible to this attempt. Records committed reads.
    fn visible(&self, state: &mut AttemptState, store: &DocumentStore, id: &DocId) -> Option<StoredDoc> {
        match state.staged.get(id) {
            Some(StagedWrite::Put(doc)) => Some(doc.clone()),
            Some(StagedWrite::Remove) => None,
            None => {
                let committed = store.get(id);
                state
                    .reads
                    .entry(id.clone())
                    .or_insert_with(|| committed.as_ref().map(|doc| doc.cas).unwrap_or(0));
                committed
            }
        }
    }

    pub(crate) fn get(&self, store: &DocumentStore, id: DocId) -> Result<RawDocument> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        match self.visible(&mut state, store, &id) {
            Some(doc) => Ok(RawDocument {
                id,
                cas: doc.cas,
                content: doc.content,
            }),
            None => Err(Error::DocumentNotFound { id: id.to_string() }),
        }
    }

    pub(crate) fn insert(
        &self,
        store: &DocumentStore,
        id: DocId,
        content: Vec<u8>,
    ) -> Result<RawDocument> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        if self.visible(&mut state, store, &id).is_some() {
            return Err(Error::DocumentExists { id: id.to_string() });
        }
        Ok(Self::stage_put(&mut state, store, id, content))
    }

    pub(crate) fn replace(
        &self,
        store: &DocumentStore,
        doc: DocRef,
        content: Vec<u8>,
    ) -> Result<RawDocument> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        self.check_version(&mut state, store, &doc)?;
        Ok(Self::stage_put(&mut state, store, doc.id, content))
    }

    pub(crate) fn remove(&self, store: &DocumentStore, doc: DocRef) -> Result<()> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        self.check_version(&mut state, store, &doc)?;
        state.staged.insert(doc.id, StagedWrite::Remove);
        Ok(())
    }

    /// Visible documents of `keyspace`, ordered by key
    pub(crate) fn scan(&self, store: &DocumentStore, keyspace: &Keyspace) -> Result<Vec<RawDocument>> {
        self.ensure_usable()?;
        let mut state = self.state.lock();

        let mut view: BTreeMap<DocId, StoredDoc> = BTreeMap::new();
        for (id, doc) in store.scan(keyspace) {
            state.reads.entry(id.clone()).or_insert(doc.cas);
            view.insert(id, doc);
        }
        for (id, write) in state.staged.range(keyspace.doc("")..) {
            if &id.keyspace != keyspace {
                break;
            }
            match write {
                StagedWrite::Put(doc) => {
                    view.insert(id.clone(), doc.clone());
                }
                StagedWrite::Remove => {
                    view.remove(id);
                }
            }
        }

        Ok(view
            .into_iter()
            .map(|(id, doc)| RawDocument {
                id,
                cas: doc.cas,
                content: doc.content,
            })
            .collect())
    }

    fn check_version(&self, state: &mut AttemptState, store: &DocumentStore, doc: &DocRef) -> Result<()> {
        match self.visible(state, store, &doc.id) {
            None => Err(Error::DocumentNotFound {
                id: doc.id.to_string(),
            }),
            Some(current) if current.cas != doc.cas => Err(Error::CasMismatch {
                id: doc.id.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn stage_put(state: &mut AttemptState, store: &DocumentStore, id: DocId, content: Vec<u8>) -> RawDocument {
        let cas = store.next_cas();
        state.staged.insert(
            id.clone(),
            StagedWrite::Put(StoredDoc {
                content: content.clone(),
                cas,
            }),
        );
        RawDocument { id, cas, content }
    }

    /// Validate and apply the staged writes.
    pub(crate) fn commit(&self, store: &DocumentStore) -> Result<usize> {
        if Instant::now() >= self.deadline {
            return Err(Error::AttemptExpired);
        }
        let state = std::mem::take(&mut *self.state.lock());
        let writes = state.staged.len();
        store.commit(&state.reads, state.staged)?;
        Ok(writes)
    }
}
