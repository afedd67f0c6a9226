//! Capabilities and the per-type tables that map them to handlers.
//!
//! A stage type declares every capability it can consume or emit exactly once,
//! in the order it wants them tried during linking. The resulting
//! [`CapabilityTable`] is immutable and shared by every instance of the type.

use crate::error::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// A named contract between two adjacent stages
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// Accepted by the first stage of a pipeline: there is no real input
    pub const SOURCE: Capability = Capability(Cow::Borrowed("SOURCE"));

    /// Emitted by the last stage of a pipeline: there is no real output
    pub const SINK: Capability = Capability(Cow::Borrowed("SINK"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SOURCE || *self == Self::SINK
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Capability {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Which side of a stage a capability sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Accepts,
    Emits,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Accepts => f.write_str("consume"),
            Direction::Emits => f.write_str("emit"),
        }
    }
}

/// Handler invoked by `consume`; stores whatever it needs on the stage
pub type ConsumeHandler<S> = fn(&mut S, Option<Value>) -> LinkResult<()>;

/// Handler invoked by `produce`
pub type ProduceHandler<S> = fn(&mut S) -> LinkResult<Option<Value>>;

/// Immutable, ordered capability table of one stage type
pub struct CapabilityTable<S> {
    accepts: Vec<(Capability, ConsumeHandler<S>)>,
    emits: Vec<(Capability, ProduceHandler<S>)>,
}

impl<S> CapabilityTable<S> {
    pub fn consumer(&self, capability: &Capability) -> Option<ConsumeHandler<S>> {
        self.accepts
            .iter()
            .find(|(name, _)| name == capability)
            .map(|(_, handler)| *handler)
    }

    pub fn provider(&self, capability: &Capability) -> Option<ProduceHandler<S>> {
        self.emits
            .iter()
            .find(|(name, _)| name == capability)
            .map(|(_, handler)| *handler)
    }

    /// Accepted capabilities in declaration order
    pub fn accepted(&self) -> impl Iterator<Item = &Capability> {
        self.accepts.iter().map(|(name, _)| name)
    }

    /// Emitted capabilities in declaration order
    pub fn emitted(&self) -> impl Iterator<Item = &Capability> {
        self.emits.iter().map(|(name, _)| name)
    }

    pub fn has_consumers(&self) -> bool {
        !self.accepts.is_empty()
    }

    pub fn has_providers(&self) -> bool {
        !self.emits.is_empty()
    }
}

/// Collects a stage type's declarations before they are frozen into a table
///
/// # Example
/// ```
/// use stagelink::pipeline::capability::{Capability, CapabilityDeclarations};
///
/// struct Counter(u64);
///
/// let mut caps = CapabilityDeclarations::<Counter>::new();
/// caps.accepts(Capability::SOURCE, |counter, _| {
///     counter.0 += 1;
///     Ok(())
/// })
/// .emits(Capability::SINK, |_| Ok(None));
///
/// let table = caps.finish("Counter").unwrap();
/// assert!(table.has_consumers());
/// ```
pub struct CapabilityDeclarations<S> {
    table: CapabilityTable<S>,
    duplicates: Vec<(Direction, Capability)>,
}

impl<S> CapabilityDeclarations<S> {
    pub fn new() -> Self {
        Self {
            table: CapabilityTable {
                accepts: Vec::new(),
                emits: Vec::new(),
            },
            duplicates: Vec::new(),
        }
    }

    /// Declare that the stage can consume `capability`
    pub fn accepts(
        &mut self,
        capability: impl Into<Capability>,
        handler: ConsumeHandler<S>,
    ) -> &mut Self {
        let capability = capability.into();
        if self.table.consumer(&capability).is_some() {
            self.duplicates.push((Direction::Accepts, capability));
        } else {
            self.table.accepts.push((capability, handler));
        }
        self
    }

    /// Declare that the stage can emit `capability`
    pub fn emits(
        &mut self,
        capability: impl Into<Capability>,
        handler: ProduceHandler<S>,
    ) -> &mut Self {
        let capability = capability.into();
        if self.table.provider(&capability).is_some() {
            self.duplicates.push((Direction::Emits, capability));
        } else {
            self.table.emits.push((capability, handler));
        }
        self
    }

    /// Freeze the declarations, rejecting any capability declared twice
    pub fn finish(self, stage: &str) -> LinkResult<CapabilityTable<S>> {
        for (direction, capability) in &self.duplicates {
            tracing::warn!(
                "{} has already declared '{}' as a capability it can {}",
                stage,
                capability,
                direction
            );
        }

        match self.duplicates.into_iter().next() {
            Some((direction, capability)) => Err(LinkError::DuplicateCapability {
                stage: stage.to_string(),
                capability,
                direction,
            }),
            None => Ok(self.table),
        }
    }
}

impl<S> Default for CapabilityDeclarations<S> {
    fn default() -> Self {
        Self::new()
    }
}
