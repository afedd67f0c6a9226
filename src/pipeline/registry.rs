//! Stage resolution: turning `<unit>.<TypeName>` identifiers into stage types.
//!
//! Stage types are grouped into units. A unit is addressed by a dotted path,
//! may carry a schema for the configuration of its stages, and may export
//! plain data next to its stage types. The compiled-in [`StageRegistry`] is
//! the resolver shipped with the crate; anything that can look a stage up by
//! identifier can implement [`StageResolver`].

use crate::error::{LinkError, LinkResult};
use crate::schema::Schema;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::capability::Capability;
use super::core::{Stage, StageType, TypedStage};

type StageFactory = Box<dyn Fn() -> Box<dyn Stage> + Send + Sync>;

/// Everything the builder needs to know about one stage type
pub struct StageDescriptor {
    identifier: String,
    type_name: &'static str,
    accepts: Vec<Capability>,
    emits: Vec<Capability>,
    factory: StageFactory,
}

impl StageDescriptor {
    /// Describe `S` as a member of `unit`, creating instances with `make`
    ///
    /// The capability table is built here, once, and shared by every
    /// instance the descriptor creates.
    pub fn of<S, F>(unit: &str, make: F) -> LinkResult<Self>
    where
        S: StageType,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let table = Arc::new(S::capability_table()?);
        let accepts = table.accepted().cloned().collect();
        let emits = table.emitted().cloned().collect();

        Ok(Self {
            identifier: format!("{}.{}", unit, S::TYPE_NAME),
            type_name: S::TYPE_NAME,
            accepts,
            emits,
            factory: Box::new(move || -> Box<dyn Stage> {
                Box::new(TypedStage::new(make(), Arc::clone(&table)))
            }),
        })
    }

    /// Fully-qualified identifier, also the key of the stage's configuration
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    /// Accepted capabilities in declaration order
    pub fn accepted(&self) -> &[Capability] {
        &self.accepts
    }

    /// Emitted capabilities in declaration order
    pub fn emitted(&self) -> &[Capability] {
        &self.emits
    }

    pub fn accepts(&self, capability: &Capability) -> bool {
        self.accepts.contains(capability)
    }

    pub fn emits(&self, capability: &Capability) -> bool {
        self.emits.contains(capability)
    }

    /// Create a fresh, unconfigured instance
    pub fn instantiate(&self) -> Box<dyn Stage> {
        (self.factory)()
    }
}

impl std::fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("identifier", &self.identifier)
            .field("accepts", &self.accepts)
            .field("emits", &self.emits)
            .finish()
    }
}

/// A stage type together with the schema of the unit that provides it
#[derive(Debug, Clone)]
pub struct ResolvedStage {
    pub descriptor: Arc<StageDescriptor>,
    pub schema: Option<Arc<Schema>>,
}

/// Looks stage types up by identifier
pub trait StageResolver {
    /// Resolve `<unit>.<TypeName>`
    ///
    /// Fails with `StageNotFound` if the unit or the member does not exist and
    /// with `NotAStageType` if the member is not a stage type. Resolving the
    /// same identifier twice must yield the same descriptor.
    fn resolve(&self, identifier: &str) -> LinkResult<ResolvedStage>;
}

/// Something a unit exports
pub enum UnitMember {
    Stage(Arc<StageDescriptor>),
    Data(Value),
}

/// A named group of stage types sharing one configuration schema
pub struct StageUnit {
    path: String,
    members: HashMap<String, UnitMember>,
    schema: Option<Arc<Schema>>,
}

impl StageUnit {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            members: HashMap::new(),
            schema: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Add a stage type whose instances start from `Default`
    pub fn stage<S: StageType + Default>(self) -> LinkResult<Self> {
        self.stage_with(S::default)
    }

    /// Add a stage type whose instances are created by `make`
    pub fn stage_with<S, F>(mut self, make: F) -> LinkResult<Self>
    where
        S: StageType,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let descriptor = StageDescriptor::of::<S, F>(&self.path, make)?;
        tracing::debug!(
            "Registered {} (accepts: {:?}, emits: {:?})",
            descriptor.identifier(),
            descriptor.accepted(),
            descriptor.emitted()
        );
        self.insert(S::TYPE_NAME, UnitMember::Stage(Arc::new(descriptor)));
        Ok(self)
    }

    /// Export a plain data member
    pub fn data(mut self, name: &str, value: Value) -> Self {
        self.insert(name, UnitMember::Data(value));
        self
    }

    /// Attach a configuration schema written as YAML
    pub fn schema_yaml(mut self, text: &str) -> LinkResult<Self> {
        self.schema = Some(Arc::new(Schema::from_yaml(self.path.clone(), text)?));
        Ok(self)
    }

    /// Attach a configuration schema given as a JSON value
    pub fn schema(mut self, schema: &Value) -> LinkResult<Self> {
        self.schema = Some(Arc::new(Schema::compile(self.path.clone(), schema)?));
        Ok(self)
    }

    fn insert(&mut self, name: &str, member: UnitMember) {
        if self.members.insert(name.to_string(), member).is_some() {
            tracing::warn!("{} has already defined {}, replacing it", self.path, name);
        }
    }

    fn stages(&self) -> impl Iterator<Item = &Arc<StageDescriptor>> {
        self.members.values().filter_map(|member| match member {
            UnitMember::Stage(descriptor) => Some(descriptor),
            UnitMember::Data(_) => None,
        })
    }
}

/// Compiled-in table of stage units
///
/// # Example
/// ```
/// use stagelink::pipeline::{StageRegistry, StageResolver};
/// use stagelink::pipeline::stages::IntegerStage;
/// use stagelink::pipeline::registry::StageUnit;
///
/// let registry = StageRegistry::new()
///     .with_unit(StageUnit::new("demo").stage::<IntegerStage>().unwrap());
///
/// let resolved = registry.resolve("demo.IntegerStage").unwrap();
/// assert_eq!(resolved.descriptor.identifier(), "demo.IntegerStage");
/// ```
#[derive(Default)]
pub struct StageRegistry {
    units: BTreeMap<String, StageUnit>,
}

impl StageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
        }
    }

    /// Add a unit, replacing any unit registered under the same path
    pub fn add_unit(&mut self, unit: StageUnit) {
        if self.units.contains_key(unit.path()) {
            tracing::warn!("Unit {} registered twice, replacing it", unit.path());
        }
        self.units.insert(unit.path().to_string(), unit);
    }

    pub fn with_unit(mut self, unit: StageUnit) -> Self {
        self.add_unit(unit);
        self
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// All registered stage types, ordered by identifier
    pub fn stages(&self) -> Vec<Arc<StageDescriptor>> {
        let mut stages: Vec<Arc<StageDescriptor>> = self
            .units
            .values()
            .flat_map(|unit| unit.stages())
            .cloned()
            .collect();
        stages.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        stages
    }
}

impl StageResolver for StageRegistry {
    fn resolve(&self, identifier: &str) -> LinkResult<ResolvedStage> {
        let not_found = |reason: String| LinkError::StageNotFound {
            identifier: identifier.to_string(),
            reason,
        };

        let (unit_path, member_name) = split_identifier(identifier)
            .ok_or_else(|| not_found("expected <unit>.<TypeName>".to_string()))?;

        let unit = self
            .units
            .get(unit_path)
            .ok_or_else(|| not_found(format!("no unit named '{}'", unit_path)))?;

        match unit.members.get(member_name) {
            Some(UnitMember::Stage(descriptor)) => Ok(ResolvedStage {
                descriptor: Arc::clone(descriptor),
                schema: unit.schema.clone(),
            }),
            Some(UnitMember::Data(_)) => Err(LinkError::NotAStageType {
                identifier: identifier.to_string(),
            }),
            None => Err(not_found(format!(
                "unit '{}' defines no member '{}'",
                unit_path, member_name
            ))),
        }
    }
}

/// Split `<unit>.<TypeName>` at its last dot
fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    let (unit, member) = identifier.rsplit_once('.')?;
    if unit.is_empty() || member.is_empty() {
        return None;
    }
    Some((unit, member))
}
