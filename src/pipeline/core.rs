use crate::error::{LinkError, LinkResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::capability::{Capability, CapabilityDeclarations, CapabilityTable, Direction};

/// A running stage instance, as seen by the builder and the executor
///
/// Every call is dispatched through the capability table of the stage's type.
/// Instances are created with [`StageType`] and wrapped in [`TypedStage`];
/// the trait exists so a pipeline can hold stages of different types.
pub trait Stage: Send {
    /// Name of the stage type, for logging and error messages
    fn type_name(&self) -> &str;

    /// Feed `value` to the handler registered for `capability`
    fn consume(&mut self, capability: &Capability, value: Option<Value>) -> LinkResult<()>;

    /// Ask the handler registered for `capability` for its output
    fn produce(&mut self, capability: &Capability) -> LinkResult<Option<Value>>;

    /// Hand the stage its configuration
    ///
    /// Allowed at most once, and only before the first `consume`/`produce`.
    fn configure(&mut self, config: Value) -> LinkResult<()>;
}

/// A stage implementation known at compile time
///
/// # Example
/// ```
/// use stagelink::error::LinkResult;
/// use stagelink::pipeline::{Capability, CapabilityDeclarations, StageType};
/// use serde::Deserialize;
/// use serde_json::Value;
///
/// #[derive(Default)]
/// struct Greeter {
///     greeting: String,
/// }
///
/// #[derive(Deserialize)]
/// struct GreeterConfig {
///     greeting: String,
/// }
///
/// impl Greeter {
///     fn start(&mut self, _: Option<Value>) -> LinkResult<()> {
///         Ok(())
///     }
///
///     fn greet(&mut self) -> LinkResult<Option<Value>> {
///         Ok(Some(Value::from(self.greeting.clone())))
///     }
/// }
///
/// impl StageType for Greeter {
///     const TYPE_NAME: &'static str = "Greeter";
///     type Config = GreeterConfig;
///
///     fn declare(caps: &mut CapabilityDeclarations<Self>) {
///         caps.accepts(Capability::SOURCE, Self::start)
///             .emits("Text", Self::greet);
///     }
///
///     fn configure(&mut self, config: GreeterConfig) {
///         self.greeting = config.greeting;
///     }
/// }
/// ```
pub trait StageType: Sized + Send + 'static {
    /// Type name, the last segment of a stage identifier
    const TYPE_NAME: &'static str;

    /// Shape of this stage's configuration entry
    type Config: DeserializeOwned;

    /// Register every capability handler, in the order they should be tried
    fn declare(caps: &mut CapabilityDeclarations<Self>);

    /// Store the configuration for the handlers to read
    fn configure(&mut self, config: Self::Config);

    /// Build the frozen capability table for this type
    fn capability_table() -> LinkResult<CapabilityTable<Self>> {
        let mut caps = CapabilityDeclarations::new();
        Self::declare(&mut caps);
        caps.finish(Self::TYPE_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Fresh,
    Configured,
    Running,
}

/// Adapts a [`StageType`] to the dynamic [`Stage`] contract
pub struct TypedStage<S: StageType> {
    inner: S,
    table: Arc<CapabilityTable<S>>,
    lifecycle: Lifecycle,
}

impl<S: StageType> TypedStage<S> {
    pub fn new(inner: S, table: Arc<CapabilityTable<S>>) -> Self {
        Self {
            inner,
            table,
            lifecycle: Lifecycle::Fresh,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn unsupported(&self, capability: &Capability, direction: Direction) -> LinkError {
        LinkError::UnsupportedCapability {
            stage: S::TYPE_NAME.to_string(),
            capability: capability.clone(),
            direction,
        }
    }
}

impl<S: StageType> Stage for TypedStage<S> {
    fn type_name(&self) -> &str {
        S::TYPE_NAME
    }

    fn consume(&mut self, capability: &Capability, value: Option<Value>) -> LinkResult<()> {
        if !self.table.has_consumers() {
            tracing::error!("{} has no consumers", S::TYPE_NAME);
            return Err(self.unsupported(capability, Direction::Accepts));
        }
        let handler = self
            .table
            .consumer(capability)
            .ok_or_else(|| self.unsupported(capability, Direction::Accepts))?;
        self.lifecycle = Lifecycle::Running;
        handler(&mut self.inner, value)
    }

    fn produce(&mut self, capability: &Capability) -> LinkResult<Option<Value>> {
        if !self.table.has_providers() {
            tracing::error!("{} has no providers", S::TYPE_NAME);
            return Err(self.unsupported(capability, Direction::Emits));
        }
        let handler = self
            .table
            .provider(capability)
            .ok_or_else(|| self.unsupported(capability, Direction::Emits))?;
        self.lifecycle = Lifecycle::Running;
        handler(&mut self.inner)
    }

    fn configure(&mut self, config: Value) -> LinkResult<()> {
        match self.lifecycle {
            Lifecycle::Fresh => {}
            Lifecycle::Configured => {
                return Err(LinkError::InvalidStageState {
                    stage: S::TYPE_NAME.to_string(),
                    reason: "already configured".to_string(),
                })
            }
            Lifecycle::Running => {
                return Err(LinkError::InvalidStageState {
                    stage: S::TYPE_NAME.to_string(),
                    reason: "configured after it started running".to_string(),
                })
            }
        }

        let config = serde_json::from_value::<S::Config>(config).map_err(|e| {
            LinkError::InvalidConfiguration {
                key: S::TYPE_NAME.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.inner.configure(config);
        self.lifecycle = Lifecycle::Configured;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Default)]
    struct Doubler {
        value: i64,
        offset: i64,
    }

    #[derive(Deserialize)]
    struct DoublerConfig {
        offset: i64,
    }

    impl Doubler {
        fn take(&mut self, value: Option<Value>) -> LinkResult<()> {
            self.value = value
                .and_then(|v| v.as_i64())
                .ok_or_else(|| LinkError::handler("expected an integer"))?;
            Ok(())
        }

        fn give(&mut self) -> LinkResult<Option<Value>> {
            Ok(Some(Value::from(self.value * 2 + self.offset)))
        }
    }

    impl StageType for Doubler {
        const TYPE_NAME: &'static str = "Doubler";
        type Config = DoublerConfig;

        fn declare(caps: &mut CapabilityDeclarations<Self>) {
            caps.accepts("Num", Self::take).emits("Num", Self::give);
        }

        fn configure(&mut self, config: DoublerConfig) {
            self.offset = config.offset;
        }
    }

    struct Mute;

    impl StageType for Mute {
        const TYPE_NAME: &'static str = "Mute";
        type Config = serde::de::IgnoredAny;

        fn declare(_caps: &mut CapabilityDeclarations<Self>) {}

        fn configure(&mut self, _config: serde::de::IgnoredAny) {}
    }

    fn doubler() -> TypedStage<Doubler> {
        TypedStage::new(
            Doubler::default(),
            Arc::new(Doubler::capability_table().unwrap()),
        )
    }

    #[test]
    fn test_consume_then_produce() {
        let mut stage = doubler();
        let num = Capability::new("Num");

        stage.consume(&num, Some(Value::from(21))).unwrap();
        assert_eq!(stage.produce(&num).unwrap(), Some(Value::from(42)));
        assert_eq!(stage.type_name(), "Doubler");
    }

    #[test]
    fn test_configure_reaches_handlers() {
        let mut stage = doubler();
        let num = Capability::new("Num");

        stage.configure(serde_json::json!({ "offset": 1 })).unwrap();
        stage.consume(&num, Some(Value::from(2))).unwrap();
        assert_eq!(stage.produce(&num).unwrap(), Some(Value::from(5)));
        assert_eq!(stage.inner().offset, 1);
    }

    #[test]
    fn test_configure_at_most_once() {
        let mut stage = doubler();
        stage.configure(serde_json::json!({ "offset": 1 })).unwrap();

        let result = stage.configure(serde_json::json!({ "offset": 2 }));
        assert!(matches!(result, Err(LinkError::InvalidStageState { .. })));
    }

    #[test]
    fn test_configure_after_running_rejected() {
        let mut stage = doubler();
        stage
            .consume(&Capability::new("Num"), Some(Value::from(1)))
            .unwrap();

        let result = stage.configure(serde_json::json!({ "offset": 2 }));
        assert!(matches!(result, Err(LinkError::InvalidStageState { .. })));
    }

    #[test]
    fn test_configure_with_wrong_shape() {
        let mut stage = doubler();
        let result = stage.configure(serde_json::json!({ "offset": "one" }));
        assert!(matches!(
            result,
            Err(LinkError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_unknown_capability() {
        let mut stage = doubler();
        let text = Capability::new("Text");

        let result = stage.consume(&text, None);
        assert!(matches!(
            result,
            Err(LinkError::UnsupportedCapability {
                direction: Direction::Accepts,
                ..
            })
        ));

        let result = stage.produce(&text);
        assert!(matches!(
            result,
            Err(LinkError::UnsupportedCapability {
                direction: Direction::Emits,
                ..
            })
        ));
    }

    #[test]
    fn test_stage_without_capabilities() {
        let mut stage = TypedStage::new(Mute, Arc::new(Mute::capability_table().unwrap()));

        assert!(stage.consume(&Capability::SOURCE, None).is_err());
        assert!(stage.produce(&Capability::SINK).is_err());
    }
}
