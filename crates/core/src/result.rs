//! Typed results built from raw engine payloads
//!
//! Each bridged operation is parameterized by the `ResultAdapter` of the value
//! it produces. Adapting is pure and synchronous; it runs on the engine thread
//! inside the success callback and its failure becomes the operation's failure.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::Result;
use crate::raw::{DocRef, QueryMetadata, RawDocument, RawQueryResult, RawTransactionResult};
use crate::serializer::{decode_as, JsonSerializer, Serializer};
use crate::types::{AttemptId, DocId};
use crate::JsonValue;

/// What an adapter may need besides the raw payload.
#[derive(Clone)]
pub struct AdaptContext {
    /// Content serializer
    pub serializer: Arc<dyn Serializer>,
    /// Attempt the payload belongs to, if any
    pub attempt: Option<AttemptId>,
}

impl AdaptContext {
    /// Context outside of any attempt (e.g. the overall transaction result)
    pub fn detached(serializer: Arc<dyn Serializer>) -> Self {
        Self {
            serializer,
            attempt: None,
        }
    }

    /// Context for payloads produced within `attempt`
    pub fn for_attempt(serializer: Arc<dyn Serializer>, attempt: AttemptId) -> Self {
        Self {
            serializer,
            attempt: Some(attempt),
        }
    }
}

impl Default for AdaptContext {
    fn default() -> Self {
        Self::detached(Arc::new(JsonSerializer))
    }
}

impl std::fmt::Debug for AdaptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptContext")
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Construction of a typed value from a raw engine payload.
pub trait ResultAdapter: Sized + Send + 'static {
    /// Payload type the engine delivers
    type Raw: Send + 'static;

    /// Build the value; failure resolves the operation to that error
    fn adapt(raw: Self::Raw, ctx: &AdaptContext) -> Result<Self>;
}

/// Operations with no return value.
impl ResultAdapter for () {
    type Raw = ();

    fn adapt(_raw: (), _ctx: &AdaptContext) -> Result<()> {
        Ok(())
    }
}

/// A document read or written inside an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionGetResult {
    doc_ref: DocRef,
    value: JsonValue,
    attempt: Option<AttemptId>,
}

impl TransactionGetResult {
    /// Document id
    pub fn id(&self) -> &DocId {
        &self.doc_ref.id
    }

    /// CAS as visible to the attempt
    pub fn cas(&self) -> u64 {
        self.doc_ref.cas
    }

    /// Decoded content
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Decoded content as `T`
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        decode_as(&self.value)
    }

    /// Attempt that produced this result
    pub fn attempt(&self) -> Option<AttemptId> {
        self.attempt
    }

    /// Version reference for replace/remove
    pub fn doc_ref(&self) -> &DocRef {
        &self.doc_ref
    }
}

impl ResultAdapter for TransactionGetResult {
    type Raw = RawDocument;

    fn adapt(raw: RawDocument, ctx: &AdaptContext) -> Result<Self> {
        let value = ctx.serializer.deserialize(&raw.content)?;
        Ok(Self {
            doc_ref: raw.doc_ref(),
            value,
            attempt: ctx.attempt,
        })
    }
}

/// Full result set of a query issued inside an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQueryResult {
    rows: Vec<JsonValue>,
    metadata: QueryMetadata,
}

impl TransactionQueryResult {
    /// Decoded rows
    pub fn rows(&self) -> &[JsonValue] {
        &self.rows
    }

    /// Rows converted to `T`
    pub fn rows_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(|row| decode_as(row)).collect()
    }

    /// Response metadata
    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    /// Consume into rows
    pub fn into_rows(self) -> Vec<JsonValue> {
        self.rows
    }
}

impl ResultAdapter for TransactionQueryResult {
    type Raw = RawQueryResult;

    fn adapt(raw: RawQueryResult, ctx: &AdaptContext) -> Result<Self> {
        let rows = raw
            .rows
            .iter()
            .map(|row| ctx.serializer.deserialize(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rows,
            metadata: raw.metadata,
        })
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    /// Engine transaction id
    pub transaction_id: String,
    /// Whether staged writes were fully made visible before `run` returned
    pub unstaging_complete: bool,
}

impl ResultAdapter for TransactionResult {
    type Raw = RawTransactionResult;

    fn adapt(raw: RawTransactionResult, _ctx: &AdaptContext) -> Result<Self> {
        Ok(Self {
            transaction_id: raw.transaction_id,
            unstaging_complete: raw.unstaging_complete,
        })
    }
}
