//! phobos-bindings: minimal filesystem policies for per-language sandboxes
//!
//! This crate turns observed per-exercise path access into layered sandbox
//! configuration:
//! - Raw log parsing, canonicalization and mode merging (`bindings`)
//! - Per-language and cross-language union/intersection sets
//! - Tail-flag sanitization and config emission
//! - Bounded parallel probing pipeline with a run summary (`pipeline`)

pub mod bindings;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;

pub use config::Config;
pub use error::BindingError;
