//! Built-in stages
//!
//! Each module is one unit of the built-in registry:
//! 1. IntegerStage - Starts a pipeline with a configured integer
//! 2. ScaleStage - Multiplies and offsets an integer
//! 3. PrintStage - Prints an integer or text and ends the pipeline

pub mod integer;
pub mod print;
pub mod scale;

use crate::error::LinkResult;
use crate::pipeline::registry::{StageRegistry, StageUnit};
use serde_json::Value;

// Re-export stages
pub use integer::IntegerStage;
pub use print::PrintStage;
pub use scale::ScaleStage;

/// Registry holding every built-in unit
///
/// `stagelink.stages.integer.DEFAULT_VALUE` is registered as a plain value,
/// so naming it in a pipeline fails with a "not a stage type" error.
pub fn builtin_registry() -> LinkResult<StageRegistry> {
    let integer = StageUnit::new(integer::UNIT)
        .stage::<IntegerStage>()?
        .data("DEFAULT_VALUE", Value::from(integer::DEFAULT_VALUE))
        .schema_yaml(integer::SCHEMA)?;

    let scale = StageUnit::new(scale::UNIT)
        .stage::<ScaleStage>()?
        .schema_yaml(scale::SCHEMA)?;

    let print = StageUnit::new(print::UNIT)
        .stage::<PrintStage>()?
        .schema_yaml(print::SCHEMA)?;

    Ok(StageRegistry::new()
        .with_unit(integer)
        .with_unit(scale)
        .with_unit(print))
}
