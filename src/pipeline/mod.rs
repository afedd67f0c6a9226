//! Pipeline assembly and execution
//!
//! A pipeline is an ordered list of stage identifiers. Each identifier is
//! resolved to a stage type, one instance is created per occurrence, and
//! adjacent stages are linked by the first capability the upstream stage
//! emits that the downstream stage accepts. The first stage accepts
//! [`Capability::SOURCE`] and the last one emits [`Capability::SINK`].
//!
//! # Example
//! ```
//! use stagelink::config::PipelineDocument;
//! use stagelink::pipeline::{stages, Pipeline};
//!
//! let registry = stages::builtin_registry()?;
//! let document = PipelineDocument::new([
//!     "stagelink.stages.integer.IntegerStage",
//!     "stagelink.stages.scale.ScaleStage",
//!     "stagelink.stages.print.PrintStage",
//! ])
//! .with_stage_config("stagelink.stages.scale.ScaleStage", serde_json::json!({ "factor": 3 }));
//!
//! let pipeline = Pipeline::assemble(&document, &registry)?;
//! assert_eq!(
//!     pipeline.describe(),
//!     "SOURCE -> [stagelink.stages.integer.IntegerStage] -> Integer \
//!      -> [stagelink.stages.scale.ScaleStage] -> Integer \
//!      -> [stagelink.stages.print.PrintStage] -> SINK"
//! );
//!
//! let summary = pipeline.execute()?;
//! assert_eq!(summary.executed_stages(), 3);
//! # Ok::<(), stagelink::error::LinkError>(())
//! ```

pub mod builder;
pub mod capability;
pub mod core;
pub mod executor;
pub mod registry;
pub mod stages;

// Re-export main types
pub use builder::PipelineBuilder;
pub use capability::{Capability, CapabilityDeclarations, CapabilityTable, Direction};
pub use core::{Stage, StageType, TypedStage};
pub use executor::{Pipeline, RunSummary, StageBinding, StageTiming};
pub use registry::{
    ResolvedStage, StageDescriptor, StageRegistry, StageResolver, StageUnit, UnitMember,
};
