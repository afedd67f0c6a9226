use crate::error::LinkResult;
use crate::pipeline::{Capability, CapabilityDeclarations, StageType};
use serde::Deserialize;
use serde_json::Value;

/// Unit path of this module's stages
pub const UNIT: &str = "stagelink.stages.print";

/// Configuration schema for stages in this unit
pub const SCHEMA: &str = r#"
type: object
properties:
  prefix:
    type: string
additionalProperties: false
"#;

/// Stage that ends a pipeline by printing what it receives
///
/// # Capabilities
/// - Consumes: `Integer`, `Text`
/// - Emits: `SINK`
#[derive(Debug, Default)]
pub struct PrintStage {
    prefix: String,
    line: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrintConfig {
    #[serde(default)]
    pub prefix: String,
}

impl PrintStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line printed by the next `SINK`
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }

    fn take_integer(&mut self, input: Option<Value>) -> LinkResult<()> {
        self.line = input.map(|value| format!("{}{}", self.prefix, value));
        Ok(())
    }

    fn take_text(&mut self, input: Option<Value>) -> LinkResult<()> {
        self.line = input.map(|value| match value {
            Value::String(text) => format!("{}{}", self.prefix, text),
            other => format!("{}{}", self.prefix, other),
        });
        Ok(())
    }

    fn print(&mut self) -> LinkResult<Option<Value>> {
        if let Some(line) = &self.line {
            println!("{}", line);
        }
        Ok(None)
    }
}

impl StageType for PrintStage {
    const TYPE_NAME: &'static str = "PrintStage";
    type Config = PrintConfig;

    fn declare(caps: &mut CapabilityDeclarations<Self>) {
        caps.accepts("Integer", Self::take_integer)
            .accepts("Text", Self::take_text)
            .emits(Capability::SINK, Self::print);
    }

    fn configure(&mut self, config: PrintConfig) {
        self.prefix = config.prefix;
    }
}
