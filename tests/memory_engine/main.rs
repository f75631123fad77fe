//! Memory Engine Integration Tests
//!
//! End-to-end transactions through `TransactionRunner` over the in-memory
//! engine: staging, commit, conflict retry, queries and expiry.

#[path = "../common/mod.rs"]
mod common;

mod commits;
mod contention;
mod expiry;
