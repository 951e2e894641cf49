//! Core types, graph storage, and configuration for felix.
//!
//! This crate provides the foundational data structures used across all
//! felix crates:
//! - [`types`] — Components, relationships, kind sets, capability blocks,
//!   and error types
//! - [`store`] — The [`GraphStore`](store::GraphStore) trait for graph
//!   persistence, including the shared bounded walk
//! - [`sqlite`] — SQLite-backed implementation of `GraphStore` with an
//!   ordered, reversible migrations ledger
//! - [`config`] — Configuration loading from `.felix/felix.json`
//! - [`hash`] — Deterministic content hashing and stable ids (base62 of
//!   xxhash64)
//! - [`cancel`] — Cooperative cancellation for long operations

pub mod cancel;
pub mod config;
pub mod hash;
pub mod sqlite;
pub mod sqlite_batch;
pub mod sqlite_helpers;
pub mod sqlite_queries;
pub mod store;
pub mod types;
