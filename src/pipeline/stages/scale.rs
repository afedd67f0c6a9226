use crate::error::{LinkError, LinkResult};
use crate::pipeline::{CapabilityDeclarations, StageType};
use serde::Deserialize;
use serde_json::Value;

/// Unit path of this module's stages
pub const UNIT: &str = "stagelink.stages.scale";

/// Configuration schema for stages in this unit
pub const SCHEMA: &str = r#"
type: object
properties:
  factor:
    type: integer
  offset:
    type: integer
additionalProperties: false
"#;

/// Stage that computes `value * factor + offset`
///
/// # Capabilities
/// - Consumes: `Integer`
/// - Emits: `Integer`
///
/// Can be chained any number of times between an integer producer and a
/// consumer. Each occurrence in a pipeline is configured separately.
#[derive(Debug)]
pub struct ScaleStage {
    factor: i64,
    offset: i64,
    value: i64,
}

#[derive(Debug, Deserialize)]
pub struct ScaleConfig {
    #[serde(default = "one")]
    pub factor: i64,
    #[serde(default)]
    pub offset: i64,
}

fn one() -> i64 {
    1
}

impl ScaleStage {
    pub fn new() -> Self {
        Self {
            factor: 1,
            offset: 0,
            value: 0,
        }
    }

    fn take_integer(&mut self, input: Option<Value>) -> LinkResult<()> {
        self.value = input
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| LinkError::handler(format!("expected an integer, got {:?}", input)))?;
        Ok(())
    }

    fn scaled(&mut self) -> LinkResult<Option<Value>> {
        let scaled = self
            .value
            .checked_mul(self.factor)
            .and_then(|v| v.checked_add(self.offset))
            .ok_or_else(|| LinkError::handler("integer overflow while scaling"))?;
        Ok(Some(Value::from(scaled)))
    }
}

impl Default for ScaleStage {
    fn default() -> Self {
        Self::new()
    }
}

impl StageType for ScaleStage {
    const TYPE_NAME: &'static str = "ScaleStage";
    type Config = ScaleConfig;

    fn declare(caps: &mut CapabilityDeclarations<Self>) {
        caps.accepts("Integer", Self::take_integer)
            .emits("Integer", Self::scaled);
    }

    fn configure(&mut self, config: ScaleConfig) {
        self.factor = config.factor;
        self.offset = config.offset;
    }
}
