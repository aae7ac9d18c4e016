use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use flowgate_core::error::Result;
use flowgate_core::metadata::{aggregate, Descriptor};
use flowgate_core::{InboundRequest, Pipeline, Plan, RequestContext};

use super::engine;

/// A pipeline resolved once and ready to serve requests.
///
/// Cheap to clone; every clone shares the same plan and metadata.
#[derive(Clone)]
pub struct FlowRunner {
    plan: Arc<Plan>,
    metadata: Arc<Descriptor>,
}

impl FlowRunner {
    /// Resolve `pipeline` and precompute its merged metadata.
    pub fn new(pipeline: &Pipeline) -> Self {
        Self::from_plan(pipeline.resolve())
    }

    pub fn from_plan(plan: Arc<Plan>) -> Self {
        let metadata = Arc::new(aggregate(&plan));
        Self { plan, metadata }
    }

    pub fn plan(&self) -> &Arc<Plan> {
        &self.plan
    }

    pub fn metadata(&self) -> &Descriptor {
        &self.metadata
    }

    pub async fn run(&self, request: impl Into<Arc<InboundRequest>>) -> Result<RequestContext> {
        engine::execute(&self.plan, request).await
    }

    pub async fn run_until_cancelled(
        &self,
        request: impl Into<Arc<InboundRequest>>,
        cancel: &CancellationToken,
    ) -> Result<RequestContext> {
        engine::execute_until_cancelled(&self.plan, request, cancel).await
    }
}

impl std::fmt::Debug for FlowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRunner")
            .field("plan", &self.plan)
            .finish()
    }
}
