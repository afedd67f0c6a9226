use crate::error::LinkResult;
use crate::pipeline::{Capability, CapabilityDeclarations, StageType};
use serde::Deserialize;
use serde_json::Value;

/// Unit path of this module's stages
pub const UNIT: &str = "stagelink.stages.integer";

/// Value used when no configuration is given
pub const DEFAULT_VALUE: i64 = 1;

/// Configuration schema for stages in this unit
pub const SCHEMA: &str = r#"
type: object
properties:
  value:
    type: integer
additionalProperties: false
"#;

/// Stage that starts a pipeline with a single integer
///
/// # Capabilities
/// - Consumes: `SOURCE`
/// - Emits: `Integer` (the value), then `SINK` (prints the value to stdout)
///
/// # Configuration
/// ```yaml
/// stagelink.stages.integer.IntegerStage:
///   value: 42
/// ```
#[derive(Debug)]
pub struct IntegerStage {
    configured: i64,
    value: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IntegerConfig {
    #[serde(default = "default_value")]
    pub value: i64,
}

fn default_value() -> i64 {
    DEFAULT_VALUE
}

impl IntegerStage {
    pub fn new() -> Self {
        Self {
            configured: DEFAULT_VALUE,
            value: None,
        }
    }

    fn set_integer(&mut self, _input: Option<Value>) -> LinkResult<()> {
        self.value = Some(self.configured);
        Ok(())
    }

    fn integer(&mut self) -> LinkResult<Option<Value>> {
        Ok(self.value.map(Value::from))
    }

    fn print_integer(&mut self) -> LinkResult<Option<Value>> {
        if let Some(value) = self.value {
            println!("{}", value);
        }
        Ok(None)
    }
}

impl Default for IntegerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl StageType for IntegerStage {
    const TYPE_NAME: &'static str = "IntegerStage";
    type Config = IntegerConfig;

    fn declare(caps: &mut CapabilityDeclarations<Self>) {
        caps.accepts(Capability::SOURCE, Self::set_integer)
            .emits("Integer", Self::integer)
            .emits(Capability::SINK, Self::print_integer);
    }

    fn configure(&mut self, config: IntegerConfig) {
        self.configured = config.value;
    }
}
