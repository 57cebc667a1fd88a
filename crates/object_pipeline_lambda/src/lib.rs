//! AWS-oriented adapters and handlers for the object pipeline stages.
//!
//! This crate owns runtime integration details (Lambda handlers, S3 and SQS
//! adapters, environment configuration, and tracing setup) on top of the
//! domain primitives in `object_pipeline_core`.
//! See `crates/object_pipeline_lambda/README.md` for ownership boundaries.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod observability;
