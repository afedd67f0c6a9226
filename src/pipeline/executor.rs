use super::capability::Capability;
use super::core::Stage;
use crate::error::{LinkError, LinkResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A stage instance fixed to the capabilities it consumes and emits
pub struct StageBinding {
    identifier: String,
    accepted: Capability,
    stage: Box<dyn Stage>,
    emitted: Capability,
}

impl StageBinding {
    pub(crate) fn new(
        identifier: impl Into<String>,
        accepted: Capability,
        stage: Box<dyn Stage>,
        emitted: Capability,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            accepted,
            stage,
            emitted,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn accepted(&self) -> &Capability {
        &self.accepted
    }

    pub fn emitted(&self) -> &Capability {
        &self.emitted
    }

    /// Run this binding's consume/produce pair
    fn run(&mut self, input: Option<Value>) -> LinkResult<Option<Value>> {
        self.stage.consume(&self.accepted, input)?;
        self.stage.produce(&self.emitted)
    }
}

impl std::fmt::Debug for StageBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageBinding")
            .field("identifier", &self.identifier)
            .field("accepted", &self.accepted)
            .field("emitted", &self.emitted)
            .finish()
    }
}

/// Timing of one executed binding
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub identifier: String,
    pub accepted: Capability,
    pub emitted: Capability,
    pub duration: Duration,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,

    /// One entry per binding, in execution order
    pub stages: Vec<StageTiming>,

    pub total_duration: Duration,
}

impl RunSummary {
    pub fn executed_stages(&self) -> usize {
        self.stages.len()
    }

    /// The binding that took longest, if anything ran
    pub fn slowest_stage(&self) -> Option<&StageTiming> {
        self.stages.iter().max_by_key(|timing| timing.duration)
    }
}

/// An assembled chain of stage bindings
///
/// Only [`PipelineBuilder`](super::PipelineBuilder) creates non-empty
/// pipelines, so every pipeline starts at `SOURCE` and ends at `SINK`.
/// Executing consumes the pipeline; build a new one for another run.
///
/// # Example
/// ```
/// use stagelink::config::PipelineDocument;
/// use stagelink::pipeline::{stages, Pipeline};
///
/// let registry = stages::builtin_registry().unwrap();
/// let document = PipelineDocument::from_yaml_str(
///     "pipeline:\n  - stagelink.stages.integer.IntegerStage\n",
/// )
/// .unwrap();
///
/// let pipeline = Pipeline::assemble(&document, &registry).unwrap();
/// let summary = pipeline.execute().unwrap();
/// assert_eq!(summary.executed_stages(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Pipeline {
    bindings: Vec<StageBinding>,
}

impl Pipeline {
    /// A pipeline with no stages; executing it does nothing
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub(crate) fn from_bindings(bindings: Vec<StageBinding>) -> Self {
        Self { bindings }
    }

    /// Get the number of stages
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[StageBinding] {
        &self.bindings
    }

    /// One-line rendering of the chain, e.g. `SOURCE -> [a.A] -> Num -> [b.B] -> SINK`
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(self.bindings.len() * 2 + 1);
        for binding in &self.bindings {
            if parts.is_empty() {
                parts.push(binding.accepted.to_string());
            }
            parts.push(format!("[{}]", binding.identifier));
            parts.push(binding.emitted.to_string());
        }
        if parts.is_empty() {
            return "(empty)".to_string();
        }
        parts.join(" -> ")
    }

    /// Thread one value through every binding, in order
    ///
    /// The first stage consumes `None`; each later stage consumes what its
    /// predecessor produced. The last produced value is discarded. The first
    /// failure aborts the run.
    pub fn execute(mut self) -> LinkResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let pipeline_start = Instant::now();
        let total = self.bindings.len();
        let mut stages = Vec::with_capacity(total);

        if total == 0 {
            tracing::info!("Pipeline is empty, nothing to run (run: {})", run_id);
        } else {
            tracing::info!("Starting pipeline with {} stages (run: {})", total, run_id);
        }

        let mut current: Option<Value> = None;
        for (index, binding) in self.bindings.iter_mut().enumerate() {
            tracing::info!(
                "Executing stage {}/{}: {} ({} -> {}) (run: {})",
                index + 1,
                total,
                binding.identifier,
                binding.accepted,
                binding.emitted,
                run_id
            );

            let stage_start = Instant::now();
            current = match binding.run(current.take()) {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(
                        "Stage '{}' failed: {} (run: {})",
                        binding.identifier,
                        e,
                        run_id
                    );
                    return Err(LinkError::StageFailed {
                        stage: binding.identifier.clone(),
                        source: Box::new(e),
                    });
                }
            };
            let duration = stage_start.elapsed();

            tracing::debug!(
                "Stage '{}' completed in {:.3}s (run: {})",
                binding.identifier,
                duration.as_secs_f64(),
                run_id
            );
            stages.push(StageTiming {
                identifier: binding.identifier.clone(),
                accepted: binding.accepted.clone(),
                emitted: binding.emitted.clone(),
                duration,
            });
        }

        if let Some(output) = current {
            tracing::debug!("Discarding final output {} (run: {})", output, run_id);
        }

        let total_duration = pipeline_start.elapsed();
        if total > 0 {
            tracing::info!(
                "Pipeline completed successfully in {:.2}s (run: {})",
                total_duration.as_secs_f64(),
                run_id
            );
        }

        Ok(RunSummary {
            run_id,
            started_at,
            stages,
            total_duration,
        })
    }
}
