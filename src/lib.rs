//! Assemble and run linear pipelines of stages linked by named capabilities.
//!
//! A pipeline document lists stage identifiers (`unit.path.TypeName`) and
//! optional per-stage configuration. [`pipeline::PipelineBuilder`] resolves
//! each identifier through a [`pipeline::StageResolver`], validates its
//! configuration and links neighbouring stages; [`pipeline::Pipeline::execute`]
//! then threads a single value from the first stage to the last.

pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod schema;
