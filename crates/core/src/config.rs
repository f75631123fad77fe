//! Transaction configuration
//!
//! `TransactionConfig` is bound to an engine session when it is created.
//! `TransactionOptions` overrides parts of it for a single `run`, and
//! `resolve` merges the two into the `ResolvedOptions` handed to the engine.
//! Both can be loaded from TOML, e.g.:
//!
//! ```toml
//! durability = "majority"
//! timeout_ms = 15000
//! scan_consistency = "request_plus"
//! metadata_collection = "meta.txn.records"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Keyspace;
use crate::JsonValue;

/// Default transaction timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default lost-attempt cleanup window in milliseconds.
pub const DEFAULT_CLEANUP_WINDOW_MS: u64 = 60_000;

/// Durability required before a write is considered committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityLevel {
    /// Acknowledged in memory on the active node
    None,
    /// Replicated in memory to a majority
    Majority,
    /// Majority in memory and persisted on the active node
    MajorityAndPersistActive,
    /// Persisted on a majority
    PersistToMajority,
}

impl Default for DurabilityLevel {
    fn default() -> Self {
        DurabilityLevel::Majority
    }
}

/// Consistency requirement for queries issued inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanConsistency {
    /// Return whatever the index has
    NotBounded,
    /// Wait for the index to catch up with all prior mutations
    RequestPlus,
}

impl Default for ScanConsistency {
    fn default() -> Self {
        ScanConsistency::RequestPlus
    }
}

/// Session-wide transaction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Durability level for commits
    #[serde(default)]
    pub durability: DurabilityLevel,
    /// Time budget for a whole transaction, across all attempts
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consistency for in-transaction queries
    #[serde(default)]
    pub scan_consistency: ScanConsistency,
    /// Where the engine keeps its transaction records (`bucket.scope.collection`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_collection: Option<String>,
    /// Whether the engine cleans up attempts abandoned by crashed clients
    #[serde(default = "default_true")]
    pub cleanup_lost_attempts: bool,
    /// How often lost-attempt cleanup scans, in milliseconds
    #[serde(default = "default_cleanup_window_ms")]
    pub cleanup_window_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_cleanup_window_ms() -> u64 {
    DEFAULT_CLEANUP_WINDOW_MS
}

fn default_true() -> bool {
    true
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            durability: DurabilityLevel::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            scan_consistency: ScanConsistency::default(),
            metadata_collection: None,
            cleanup_lost_attempts: true,
            cleanup_window_ms: DEFAULT_CLEANUP_WINDOW_MS,
        }
    }
}

impl TransactionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: TransactionConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration rendered as commented TOML.
    pub fn default_toml() -> &'static str {
        r#"# Transaction configuration
#
# Durability: "none", "majority" (default), "majority_and_persist_active",
# or "persist_to_majority"
durability = "majority"

# Budget for a whole transaction across all attempts
timeout_ms = 15000

# Query consistency: "not_bounded" or "request_plus" (default)
scan_consistency = "request_plus"

# metadata_collection = "bucket.scope.collection"

cleanup_lost_attempts = true
cleanup_window_ms = 60000
"#
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than zero"));
        }
        if self.cleanup_lost_attempts && self.cleanup_window_ms == 0 {
            return Err(Error::config(
                "cleanup_window_ms must be greater than zero when cleanup is enabled",
            ));
        }
        if let Some(ks) = &self.metadata_collection {
            ks.parse::<Keyspace>()
                .map_err(|e| Error::config(format!("metadata_collection: {}", e)))?;
        }
        Ok(())
    }

    /// Transaction timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-transaction overrides of `TransactionConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Durability override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<DurabilityLevel>,
    /// Timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Query consistency override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_consistency: Option<ScanConsistency>,
    /// Metadata collection override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_collection: Option<String>,
}

impl TransactionOptions {
    /// Empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override durability
    pub fn with_durability(mut self, durability: DurabilityLevel) -> Self {
        self.durability = Some(durability);
        self
    }

    /// Override timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Override query consistency
    pub fn with_scan_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.scan_consistency = Some(consistency);
        self
    }

    /// Override metadata collection
    pub fn with_metadata_collection(mut self, keyspace: &Keyspace) -> Self {
        self.metadata_collection = Some(keyspace.to_string());
        self
    }

    /// Merge these overrides onto `config`, producing the options the engine sees.
    pub fn resolve(&self, config: &TransactionConfig) -> Result<ResolvedOptions> {
        let timeout_ms = self.timeout_ms.unwrap_or(config.timeout_ms);
        if timeout_ms == 0 {
            return Err(Error::config("timeout must be greater than zero"));
        }
        let metadata_collection = self
            .metadata_collection
            .as_ref()
            .or(config.metadata_collection.as_ref())
            .map(|s| s.parse::<Keyspace>())
            .transpose()
            .map_err(|e| Error::config(format!("metadata_collection: {}", e)))?;

        Ok(ResolvedOptions {
            durability: self.durability.unwrap_or(config.durability),
            timeout: Duration::from_millis(timeout_ms),
            scan_consistency: self.scan_consistency.unwrap_or(config.scan_consistency),
            metadata_collection,
        })
    }
}

/// Effective options for one transaction, after merging overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    /// Durability for commits
    pub durability: DurabilityLevel,
    /// Whole-transaction deadline, measured from `run`
    pub timeout: Duration,
    /// Consistency for queries
    pub scan_consistency: ScanConsistency,
    /// Transaction record location
    pub metadata_collection: Option<Keyspace>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        let config = TransactionConfig::default();
        Self {
            durability: config.durability,
            timeout: config.timeout(),
            scan_consistency: config.scan_consistency,
            metadata_collection: None,
        }
    }
}

/// Options for a query issued inside an attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionQueryOptions {
    /// `$1`, `$2`, ... parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional_parameters: Vec<JsonValue>,
    /// `$name` parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_parameters: BTreeMap<String, JsonValue>,
    /// Reject mutations in the statement
    #[serde(default)]
    pub read_only: bool,
    /// Consistency override for this query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_consistency: Option<ScanConsistency>,
    /// Skip prepared-statement caching
    #[serde(default = "default_true")]
    pub adhoc: bool,
    /// Caller-chosen id echoed back in the result metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_context_id: Option<String>,
    /// Ask the engine to report execution metrics
    #[serde(default)]
    pub metrics: bool,
}

impl TransactionQueryOptions {
    /// Default query options (adhoc, no parameters)
    pub fn new() -> Self {
        Self {
            adhoc: true,
            ..Default::default()
        }
    }

    /// Append a positional parameter
    pub fn positional(mut self, value: impl Into<JsonValue>) -> Self {
        self.positional_parameters.push(value.into());
        self
    }

    /// Set a named parameter
    pub fn named(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.named_parameters.insert(name.into(), value.into());
        self
    }

    /// Mark the query read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Override scan consistency
    pub fn scan_consistency(mut self, consistency: ScanConsistency) -> Self {
        self.scan_consistency = Some(consistency);
        self
    }

    /// Set the client context id
    pub fn client_context_id(mut self, id: impl Into<String>) -> Self {
        self.client_context_id = Some(id.into());
        self
    }

    /// Request execution metrics
    pub fn metrics(mut self, metrics: bool) -> Self {
        self.metrics = metrics;
        self
    }
}
