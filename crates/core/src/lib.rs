//! Core types for courier
//!
//! This crate defines what crosses the engine boundary:
//! - Error: error taxonomy shared by engine, bridge and application code
//! - Keyspace / DocId / AttemptId: identifiers
//! - TransactionConfig / TransactionOptions / TransactionQueryOptions: configuration
//! - Raw payloads: what engine success callbacks deliver
//! - Serializer: content encoding seam
//! - ResultAdapter: typed results built from raw payloads

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod raw;
pub mod result;
pub mod serializer;
pub mod types;

/// Decoded document content.
pub type JsonValue = serde_json::Value;

pub use config::{
    DurabilityLevel, ResolvedOptions, ScanConsistency, TransactionConfig, TransactionOptions,
    TransactionQueryOptions,
};
pub use error::{BoxError, Error, Result};
pub use raw::{DocRef, QueryMetadata, QueryMetrics, RawDocument, RawQueryResult, RawTransactionResult};
pub use result::{
    AdaptContext, ResultAdapter, TransactionGetResult, TransactionQueryResult, TransactionResult,
};
pub use serializer::{JsonSerializer, Serializer};
pub use types::{AttemptId, DocId, Keyspace};
