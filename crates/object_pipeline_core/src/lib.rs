//! Shared object pipeline domain primitives.
//!
//! This crate owns the custom object model, event and response contracts,
//! fault injection, and the observed-operation envelope. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.
//! See `crates/object_pipeline_core/README.md` for ownership boundaries.

pub mod contract;
pub mod envelope;
pub mod error;
pub mod fault;
pub mod object;
pub mod storage_keys;
