//! Raw payloads delivered by the engine's success callbacks
//!
//! These are what the engine hands over, before any decoding. The bridge turns
//! them into result values with a `ResultAdapter`.

use crate::types::DocId;

/// A document as the engine returns it from get/insert/replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Document id
    pub id: DocId,
    /// CAS of the document as visible to the attempt
    pub cas: u64,
    /// Encoded content
    pub content: Vec<u8>,
}

impl RawDocument {
    /// Reference used to address this version in replace/remove
    pub fn doc_ref(&self) -> DocRef {
        DocRef {
            id: self.id.clone(),
            cas: self.cas,
        }
    }
}

/// Version reference passed to the engine for replace/remove.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    /// Document id
    pub id: DocId,
    /// CAS the caller last observed
    pub cas: u64,
}

/// Raw query response: encoded rows plus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    /// Encoded rows, in result order
    pub rows: Vec<Vec<u8>>,
    /// Response metadata
    pub metadata: QueryMetadata,
}

/// Metadata attached to a query response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMetadata {
    /// Engine-assigned request id
    pub request_id: String,
    /// Client context id echoed from the options
    pub client_context_id: Option<String>,
    /// Final status, e.g. `success`
    pub status: String,
    /// Execution metrics when requested
    pub metrics: Option<QueryMetrics>,
    /// Non-fatal warnings
    pub warnings: Vec<String>,
}

/// Execution metrics for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMetrics {
    /// Rows returned
    pub result_count: u64,
    /// Mutations performed by the statement
    pub mutation_count: u64,
    /// Wall time in microseconds
    pub elapsed_us: u64,
}

/// Raw outcome of a whole transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionResult {
    /// Engine transaction id
    pub transaction_id: String,
    /// Whether staged writes were fully made visible before `run` returned
    pub unstaging_complete: bool,
}
