//! Multi-language parsing for felix.
//!
//! Layered like the rest of the engine:
//! - [`backend`] — the one contract every parser implements
//! - [`registry`] — language detection and backend registration (built once
//!   at startup, read-only after)
//! - [`treesitter`] — shared driver, query extraction, and graph assembly
//! - per-language semantic backends ([`typescript`], [`python`],
//!   [`rust_lang`], [`go`]) and the structural [`java`] backend
//! - [`detectors`] — basic-tier Markdown/HTML/text outlines
//! - [`segmenter`] / [`boundaries`] — block splitting and embedded-language
//!   recursion
//! - [`walker`] / [`pipeline`] — file discovery and parallel ingestion

pub mod backend;
pub mod boundaries;
pub mod detectors;
pub mod pipeline;
pub mod queries;
pub mod registry;
pub mod segmenter;
pub mod treesitter;
pub mod walker;

pub mod go;
pub mod java;
pub mod python;
pub mod rust_lang;
pub mod typescript;
