//! Binding-set derivation core.
//!
//! Raw observation logs become per-exercise artifacts, artifacts reduce to
//! per-language and cross-language union/intersection sets, and those sets
//! are written as the layered config files the sandbox launcher reads.
//!
//! Everything here is synchronous and free of global state; the
//! [`pipeline`](crate::pipeline) module drives it.

pub mod aggregate;
pub mod artifact;
pub mod canonical;
pub mod emit;
pub mod log;
pub mod mode;
pub mod set;
pub mod tail;

pub use aggregate::{GlobalConfig, LanguageSet, global_config, language_sets};
pub use artifact::{ArtifactRecord, ExerciseArtifact, Provenance};
pub use canonical::{Canonicalizer, canonicalize};
pub use emit::{OutputLayout, PolicySections, emit_all};
pub use mode::Mode;
pub use set::{BindingSet, PathRecord, merge};
pub use tail::{TailAccumulator, TailFlagSet, sanitize};
