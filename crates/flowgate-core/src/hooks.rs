//! Lifecycle hooks.
//!
//! Hooks observe a flow without taking part in category composition: they are
//! never merged and must be attached to the pipeline that gets executed.

use std::fmt;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::FlowError;
use crate::unit::PolicyUnit;

/// Terminal state of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
    Completed,
    Aborted,
    Errored,
    Cancelled,
}

impl FlowOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowOutcome::Completed => "completed",
            FlowOutcome::Aborted => "aborted",
            FlowOutcome::Errored => "errored",
            FlowOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle callbacks. Every method is a no-op by default.
#[async_trait]
pub trait FlowHook: Send + Sync {
    /// Before the first unit runs.
    async fn on_flow_start(&self, _ctx: &mut RequestContext) {}

    /// After each executed unit. `error` is set for the failing unit.
    async fn on_unit(
        &self,
        _ctx: &mut RequestContext,
        _unit: &dyn PolicyUnit,
        _error: Option<&FlowError>,
    ) {
    }

    /// Exactly once per execution, on every exit path.
    async fn on_flow_end(&self, _ctx: &mut RequestContext, _outcome: FlowOutcome) {}
}

type CtxCallback = Box<dyn for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync>;

type EndCallback =
    Box<dyn for<'a> Fn(&'a mut RequestContext, FlowOutcome) -> BoxFuture<'a, ()> + Send + Sync>;

type UnitCallback = Box<
    dyn for<'a> Fn(
            &'a mut RequestContext,
            &'a dyn PolicyUnit,
            Option<&'a FlowError>,
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

/// Fires only on flow start.
pub struct BeforeFlow {
    callback: CtxCallback,
}

impl BeforeFlow {
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl FlowHook for BeforeFlow {
    async fn on_flow_start(&self, ctx: &mut RequestContext) {
        (self.callback)(ctx).await;
    }
}

/// Fires only on flow end.
pub struct AfterFlow {
    callback: EndCallback,
}

impl AfterFlow {
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext, FlowOutcome) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl FlowHook for AfterFlow {
    async fn on_flow_end(&self, ctx: &mut RequestContext, outcome: FlowOutcome) {
        (self.callback)(ctx, outcome).await;
    }
}

/// Fires after each unit.
pub struct AfterUnit {
    callback: UnitCallback,
}

impl AfterUnit {
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut RequestContext,
                &'a dyn PolicyUnit,
                Option<&'a FlowError>,
            ) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl FlowHook for AfterUnit {
    async fn on_unit(
        &self,
        ctx: &mut RequestContext,
        unit: &dyn PolicyUnit,
        error: Option<&FlowError>,
    ) {
        (self.callback)(ctx, unit, error).await;
    }
}
