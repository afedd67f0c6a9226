//! Pipeline assembly: resolve, link, configure.
//!
//! Linking is greedy. For each pair of neighbours the upstream stage's emitted
//! capabilities are tried in declaration order and the first one the
//! downstream stage accepts wins. Nothing after a broken link is resolved or
//! instantiated.

use crate::config::PipelineDocument;
use crate::error::{ChainBreak, LinkError, LinkResult};
use std::sync::Arc;

use super::capability::Capability;
use super::core::Stage;
use super::executor::{Pipeline, StageBinding};
use super::registry::{ResolvedStage, StageDescriptor, StageResolver};

/// Builds verified pipelines from documents
pub struct PipelineBuilder<'r> {
    resolver: &'r dyn StageResolver,
}

/// The stage at the end of the chain, still waiting for its emitted capability
struct OpenBinding {
    descriptor: Arc<StageDescriptor>,
    accepted: Capability,
    stage: Box<dyn Stage>,
}

impl OpenBinding {
    fn close(self, emitted: Capability) -> StageBinding {
        StageBinding::new(
            self.descriptor.identifier(),
            self.accepted,
            self.stage,
            emitted,
        )
    }
}

impl<'r> PipelineBuilder<'r> {
    pub fn new(resolver: &'r dyn StageResolver) -> Self {
        Self { resolver }
    }

    /// Assemble the pipeline described by `document`
    ///
    /// The first stage must accept `SOURCE` and the last must emit `SINK`.
    /// An empty stage list yields an empty pipeline.
    pub fn build(&self, document: &PipelineDocument) -> LinkResult<Pipeline> {
        let Some((first, rest)) = document.stages().split_first() else {
            tracing::info!("Pipeline document lists no stages");
            return Ok(Pipeline::empty());
        };

        tracing::info!("Assembling pipeline of {} stages", document.stages().len());

        let resolved = self.resolver.resolve(first)?;
        if !resolved.descriptor.accepts(&Capability::SOURCE) {
            return Err(LinkError::ChainBroken(ChainBreak::NoSource {
                stage: resolved.descriptor.identifier().to_string(),
            }));
        }
        let mut open = self.open(resolved, Capability::SOURCE, document)?;
        let mut bindings = Vec::with_capacity(document.stages().len());

        for identifier in rest {
            let resolved = self.resolver.resolve(identifier)?;
            let link = Self::link(&open.descriptor, &resolved.descriptor)?;
            let next = self.open(resolved, link.clone(), document)?;
            bindings.push(open.close(link));
            open = next;
        }

        if !open.descriptor.emits(&Capability::SINK) {
            return Err(LinkError::ChainBroken(ChainBreak::NoSink {
                stage: open.descriptor.identifier().to_string(),
            }));
        }
        bindings.push(open.close(Capability::SINK));

        let pipeline = Pipeline::from_bindings(bindings);
        tracing::info!("Assembled pipeline: {}", pipeline.describe());
        Ok(pipeline)
    }

    /// First capability emitted by `upstream` that `downstream` accepts
    fn link(upstream: &StageDescriptor, downstream: &StageDescriptor) -> LinkResult<Capability> {
        let link = upstream
            .emitted()
            .iter()
            .find(|capability| downstream.accepts(capability))
            .cloned();

        match link {
            Some(capability) => {
                tracing::debug!(
                    "Linked {} -> {} via '{}'",
                    upstream.identifier(),
                    downstream.identifier(),
                    capability
                );
                Ok(capability)
            }
            None => {
                tracing::error!(
                    "{} has no consumer for anything {} emits",
                    downstream.identifier(),
                    upstream.identifier()
                );
                Err(LinkError::ChainBroken(ChainBreak::NoLink {
                    upstream: upstream.identifier().to_string(),
                    downstream: downstream.identifier().to_string(),
                    offered: upstream.emitted().to_vec(),
                }))
            }
        }
    }

    /// Instantiate a stage as a consumer of `accepted` and configure it
    fn open(
        &self,
        resolved: ResolvedStage,
        accepted: Capability,
        document: &PipelineDocument,
    ) -> LinkResult<OpenBinding> {
        let mut stage = resolved.descriptor.instantiate();
        Self::configure(&resolved, stage.as_mut(), document)?;

        Ok(OpenBinding {
            descriptor: resolved.descriptor,
            accepted,
            stage,
        })
    }

    /// Validate and apply the stage's configuration entry, if it has one
    fn configure(
        resolved: &ResolvedStage,
        stage: &mut dyn Stage,
        document: &PipelineDocument,
    ) -> LinkResult<()> {
        let key = resolved.descriptor.identifier();
        let Some(config) = document.stage_config(key) else {
            tracing::debug!("No configuration for {}", key);
            return Ok(());
        };

        if let Some(schema) = &resolved.schema {
            if let Err(e) = schema.validate_config(key, config) {
                tracing::error!("Configuration for {} rejected: {}", key, e);
                return Err(e);
            }
        }

        stage.configure(config.clone()).map_err(|e| match e {
            LinkError::InvalidConfiguration { reason, .. } => LinkError::InvalidConfiguration {
                key: key.to_string(),
                reason,
            },
            other => other,
        })?;
        tracing::debug!("Configured {}", key);
        Ok(())
    }
}

impl Pipeline {
    /// Assemble a pipeline; shorthand for [`PipelineBuilder::build`]
    pub fn assemble(document: &PipelineDocument, resolver: &dyn StageResolver) -> LinkResult<Self> {
        PipelineBuilder::new(resolver).build(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::CapabilityDeclarations;
    use crate::pipeline::core::StageType;
    use crate::pipeline::registry::{StageRegistry, StageUnit};
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::cell::Cell;

    fn pass<S>(_: &mut S, _: Option<Value>) -> LinkResult<()> {
        Ok(())
    }

    fn none<S>(_: &mut S) -> LinkResult<Option<Value>> {
        Ok(None)
    }

    macro_rules! test_stage {
        ($name:ident, accepts [$($a:expr),*], emits [$($e:expr),*]) => {
            #[derive(Default)]
            struct $name;

            impl StageType for $name {
                const TYPE_NAME: &'static str = stringify!($name);
                type Config = serde::de::IgnoredAny;

                fn declare(caps: &mut CapabilityDeclarations<Self>) {
                    $(caps.accepts($a, pass);)*
                    $(caps.emits($e, none);)*
                }

                fn configure(&mut self, _config: serde::de::IgnoredAny) {}
            }
        };
    }

    test_stage!(Start, accepts [Capability::SOURCE], emits ["Num", "Text"]);
    test_stage!(TextFirst, accepts [Capability::SOURCE], emits ["Text", "Num"]);
    test_stage!(Both, accepts ["Text", "Num"], emits [Capability::SINK]);
    test_stage!(NumOnly, accepts ["Num"], emits ["Num", Capability::SINK]);
    test_stage!(Lonely, accepts ["Bytes"], emits [Capability::SINK]);
    test_stage!(Whole, accepts [Capability::SOURCE], emits [Capability::SINK]);
    test_stage!(Endless, accepts [Capability::SOURCE], emits ["Num"]);

    thread_local! {
        static INSTANTIATED: Cell<usize> = Cell::new(0);
    }

    #[derive(Default)]
    struct Counted {
        limit: u32,
    }

    #[derive(Deserialize)]
    struct CountedConfig {
        limit: u32,
    }

    impl StageType for Counted {
        const TYPE_NAME: &'static str = "Counted";
        type Config = CountedConfig;

        fn declare(caps: &mut CapabilityDeclarations<Self>) {
            caps.accepts("Num", pass).emits(Capability::SINK, none);
        }

        fn configure(&mut self, config: CountedConfig) {
            self.limit = config.limit;
        }
    }

    fn registry() -> StageRegistry {
        let unit = StageUnit::new("t")
            .stage::<Start>()
            .and_then(|u| u.stage::<TextFirst>())
            .and_then(|u| u.stage::<Both>())
            .and_then(|u| u.stage::<NumOnly>())
            .and_then(|u| u.stage::<Lonely>())
            .and_then(|u| u.stage::<Whole>())
            .and_then(|u| u.stage::<Endless>())
            .unwrap();
        let counted = StageUnit::new("counted")
            .stage_with(|| {
                INSTANTIATED.with(|count| count.set(count.get() + 1));
                Counted::default()
            })
            .and_then(|u| {
                u.schema_yaml(
                    "type: object\nproperties:\n  limit:\n    type: integer\n    maximum: 10\n",
                )
            })
            .unwrap();
        StageRegistry::new().with_unit(unit).with_unit(counted)
    }

    fn links(pipeline: &Pipeline) -> Vec<(&str, &str, &str)> {
        pipeline
            .bindings()
            .iter()
            .map(|b| (b.accepted().as_str(), b.identifier(), b.emitted().as_str()))
            .collect()
    }

    fn build(stages: &[&str]) -> LinkResult<Pipeline> {
        let registry = registry();
        PipelineBuilder::new(&registry).build(&PipelineDocument::new(stages.iter().copied()))
    }

    #[test]
    fn test_single_stage() {
        let pipeline = build(&["t.Whole"]).unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(links(&pipeline), vec![("SOURCE", "t.Whole", "SINK")]);
    }

    #[test]
    fn test_empty_document() {
        let pipeline = build(&[]).unwrap();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_first_common_capability_wins() {
        let pipeline = build(&["t.Start", "t.Both"]).unwrap();
        assert_eq!(
            links(&pipeline),
            vec![
                ("SOURCE", "t.Start", "Num"),
                ("Num", "t.Both", "SINK"),
            ]
        );

        let pipeline = build(&["t.TextFirst", "t.Both"]).unwrap();
        assert_eq!(pipeline.bindings()[0].emitted(), &Capability::new("Text"));
    }

    #[test]
    fn test_same_type_twice() {
        let pipeline = build(&["t.Start", "t.NumOnly", "t.NumOnly"]).unwrap();
        assert_eq!(
            links(&pipeline),
            vec![
                ("SOURCE", "t.Start", "Num"),
                ("Num", "t.NumOnly", "Num"),
                ("Num", "t.NumOnly", "SINK"),
            ]
        );
    }

    #[test]
    fn test_first_stage_must_accept_source() {
        match build(&["t.Both"]) {
            Err(LinkError::ChainBroken(ChainBreak::NoSource { stage })) => {
                assert_eq!(stage, "t.Both")
            }
            _ => panic!("expected missing SOURCE"),
        }
    }

    #[test]
    fn test_last_stage_must_emit_sink() {
        match build(&["t.Endless"]) {
            Err(LinkError::ChainBroken(ChainBreak::NoSink { stage })) => {
                assert_eq!(stage, "t.Endless")
            }
            _ => panic!("expected missing SINK"),
        }
    }

    #[test]
    fn test_broken_link_names_the_pair() {
        match build(&["t.Start", "t.Lonely", "t.Both"]) {
            Err(LinkError::ChainBroken(ChainBreak::NoLink {
                upstream,
                downstream,
                offered,
            })) => {
                assert_eq!(upstream, "t.Start");
                assert_eq!(downstream, "t.Lonely");
                assert_eq!(offered, vec![Capability::new("Num"), Capability::new("Text")]);
            }
            _ => panic!("expected broken link"),
        }
    }

    #[test]
    fn test_nothing_after_the_break_is_instantiated() {
        let before = INSTANTIATED.with(Cell::get);
        let result = build(&["t.Start", "t.Lonely", "counted.Counted"]);
        assert!(result.is_err());
        assert_eq!(INSTANTIATED.with(Cell::get), before);

        build(&["t.Start", "counted.Counted"]).unwrap();
        assert_eq!(INSTANTIATED.with(Cell::get), before + 1);
    }

    #[test]
    fn test_unknown_stage() {
        let result = build(&["t.Start", "t.Nope"]);
        assert!(matches!(result, Err(LinkError::StageNotFound { .. })));
    }

    #[test]
    fn test_configuration_applied() {
        let registry = registry();
        let document = PipelineDocument::new(["t.Start", "counted.Counted"])
            .with_stage_config("counted.Counted", json!({ "limit": 3 }));

        let pipeline = PipelineBuilder::new(&registry).build(&document).unwrap();
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_schema_violation_aborts_assembly() {
        let registry = registry();
        let document = PipelineDocument::new(["t.Start", "counted.Counted"])
            .with_stage_config("counted.Counted", json!({ "limit": 11 }));

        match PipelineBuilder::new(&registry).build(&document) {
            Err(LinkError::InvalidConfiguration { key, .. }) => {
                assert_eq!(key, "counted.Counted")
            }
            _ => panic!("expected schema violation"),
        }
    }

    #[test]
    fn test_config_that_does_not_deserialize() {
        let registry = registry();
        let document = PipelineDocument::new(["t.Start", "counted.Counted"])
            .with_stage_config("counted.Counted", json!({}));

        match Pipeline::assemble(&document, &registry) {
            Err(LinkError::InvalidConfiguration { key, reason }) => {
                assert_eq!(key, "counted.Counted");
                assert!(reason.contains("limit"));
            }
            _ => panic!("expected invalid configuration"),
        }
    }
}
