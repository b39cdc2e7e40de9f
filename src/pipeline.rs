//! Sequential stage pipeline.
//!
//! The provisioning flow is table-driven: each dispatcher verb builds an
//! [`ExecutionPlan`] (an ordered stage list) and hands it to [`run_plan`].
//! Stages run strictly one after another; the first failure aborts the run.
//! There is deliberately no parallel mode and no rollback: a partially
//! completed stage leaves whatever external state it created, and cleanup is
//! an explicit operator action (`destroy`).

use std::time::Instant;

use async_trait::async_trait;

use crate::errors::ForgeResult;

/// A single pipeline stage. Stages share a cheaply cloneable context and
/// communicate through it (interior mutability for writes).
#[async_trait]
pub trait StageTask<Ctx>: Send + Sync {
    async fn run(self: Box<Self>, ctx: Ctx) -> ForgeResult<()>;

    /// Stage name for logging and metrics.
    fn name(&self) -> &str;
}

pub type BoxedStage<Ctx> = Box<dyn StageTask<Ctx>>;

/// Ordered list of stages for one dispatcher verb.
pub struct ExecutionPlan<Ctx> {
    stages: Vec<BoxedStage<Ctx>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<BoxedStage<Ctx>>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub index: usize,
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    pub fn stage_duration_ms(&self, name: &str) -> Option<u128> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .map(|stage| stage.duration_ms)
    }
}

/// Execute a plan stage by stage.
///
/// The context is cloned per stage, so `Ctx` should be an `Arc`-backed handle.
pub async fn run_plan<Ctx>(plan: ExecutionPlan<Ctx>, ctx: Ctx) -> ForgeResult<PipelineMetrics>
where
    Ctx: Clone,
{
    let total = plan.stages.len();
    let total_start = Instant::now();
    let mut stages = Vec::with_capacity(total);

    for (index, stage) in plan.stages.into_iter().enumerate() {
        let name = stage.name().to_string();
        tracing::info!(stage = %name, step = index + 1, total, "stage starting");

        let stage_start = Instant::now();
        stage.run(ctx.clone()).await.inspect_err(|e| {
            tracing::error!(stage = %name, error = %e, "stage failed");
        })?;
        let duration_ms = stage_start.elapsed().as_millis();

        tracing::info!(stage = %name, duration_ms, "stage finished");
        stages.push(StageMetrics {
            index,
            name,
            duration_ms,
        });
    }

    Ok(PipelineMetrics {
        total_duration_ms: total_start.elapsed().as_millis(),
        stages,
    })
}
