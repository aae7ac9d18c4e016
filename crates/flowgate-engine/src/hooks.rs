//! Ready-made lifecycle hooks.

use async_trait::async_trait;

use flowgate_core::error::FlowError;
use flowgate_core::hooks::{FlowHook, FlowOutcome};
use flowgate_core::{PolicyUnit, RequestContext};

/// Emits one structured `tracing` event per unit and per flow.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl TracingHook {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FlowHook for TracingHook {
    async fn on_flow_start(&self, ctx: &mut RequestContext) {
        let req = ctx.request();
        tracing::debug!(method = req.method(), path = req.path(), "flow started");
    }

    async fn on_unit(
        &self,
        _ctx: &mut RequestContext,
        unit: &dyn PolicyUnit,
        error: Option<&FlowError>,
    ) {
        match error {
            None => tracing::trace!(unit = unit.name(), category = %unit.category(), "unit passed"),
            Some(e) => tracing::info!(
                unit = unit.name(),
                category = %unit.category(),
                status = e.status(),
                code = %e.code(),
                detail = e.detail(),
                "unit failed"
            ),
        }
    }

    async fn on_flow_end(&self, ctx: &mut RequestContext, outcome: FlowOutcome) {
        let req = ctx.request();
        tracing::debug!(method = req.method(), path = req.path(), %outcome, "flow finished");
    }
}
