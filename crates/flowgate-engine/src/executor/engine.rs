use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use flowgate_core::error::{FlowError, Result, UnitError};
use flowgate_core::hooks::FlowOutcome;
use flowgate_core::trace::{FlowTrace, TraceEntry, TraceOutcome, UnitOutcome, TRACE_KEY};
use flowgate_core::{InboundRequest, Plan, PolicyUnit, RequestContext};

/// Cause recorded when a unit panics instead of returning an error.
#[derive(Debug, Error)]
#[error("unit panicked: {0}")]
pub struct UnitPanicked(pub String);

/// Run `plan` against one inbound request.
///
/// Returns the populated context on completion, or the boundary error of the
/// abort / internal failure. End hooks run on every path.
pub async fn execute(
    plan: &Plan,
    request: impl Into<Arc<InboundRequest>>,
) -> Result<RequestContext> {
    run(plan, request.into(), None).await
}

/// Same as [`execute`], abandoning remaining units once `cancel` fires.
///
/// Cancellation is observed before each unit and while a unit is suspended.
/// The caller gets [`FlowError::Cancelled`]; per-unit hooks are not told about
/// it, end hooks still fire with [`FlowOutcome::Cancelled`].
pub async fn execute_until_cancelled(
    plan: &Plan,
    request: impl Into<Arc<InboundRequest>>,
    cancel: &CancellationToken,
) -> Result<RequestContext> {
    run(plan, request.into(), Some(cancel)).await
}

async fn run(
    plan: &Plan,
    request: Arc<InboundRequest>,
    cancel: Option<&CancellationToken>,
) -> Result<RequestContext> {
    let mut ctx = RequestContext::new(request);
    // no clock reads or trace allocation unless debug
    let mut recorder = plan.debug().then(TraceRecorder::start);

    for hook in plan.hooks() {
        hook.on_flow_start(&mut ctx).await;
    }

    let result = run_units(plan, &mut ctx, recorder.as_mut(), cancel).await;

    let outcome = match &result {
        Ok(()) => FlowOutcome::Completed,
        Err(FlowError::Aborted(_)) => FlowOutcome::Aborted,
        Err(FlowError::Cancelled) => FlowOutcome::Cancelled,
        Err(_) => FlowOutcome::Errored,
    };

    if let Some(recorder) = recorder {
        let trace = recorder.finish(outcome, result.as_ref().err());
        ctx.insert(TRACE_KEY, trace);
    }

    for hook in plan.hooks() {
        hook.on_flow_end(&mut ctx, outcome).await;
    }

    result.map(|()| ctx)
}

async fn run_units(
    plan: &Plan,
    ctx: &mut RequestContext,
    mut recorder: Option<&mut TraceRecorder>,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    for unit in plan.units() {
        let unit: &dyn PolicyUnit = unit.as_ref();

        if cancel.is_some_and(|c| c.is_cancelled()) {
            tracing::debug!(unit = unit.name(), "flow cancelled before unit");
            return Err(FlowError::Cancelled);
        }

        let started = recorder.is_some().then(Instant::now);

        let checked = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                r = guarded_check(unit, ctx) => Some(r),
            },
            None => Some(guarded_check(unit, ctx).await),
        };

        let Some(checked) = checked else {
            tracing::debug!(unit = unit.name(), "flow cancelled during unit");
            return Err(FlowError::Cancelled);
        };

        let elapsed = started.map(|t| t.elapsed()).unwrap_or_default();

        let err = match checked {
            Ok(()) => {
                if let Some(rec) = recorder.as_deref_mut() {
                    rec.record(unit, elapsed, None);
                }
                for hook in plan.hooks() {
                    hook.on_unit(ctx, unit, None).await;
                }
                continue;
            }
            Err(UnitError::Abort(abort)) => {
                tracing::debug!(
                    unit = unit.name(),
                    category = %unit.category(),
                    status = abort.status(),
                    detail = abort.detail(),
                    "flow aborted"
                );
                if let Some(rec) = recorder.as_deref_mut() {
                    rec.record(unit, elapsed, Some(abort.detail().to_string()));
                }
                FlowError::Aborted(abort)
            }
            Err(UnitError::Failure(cause)) => {
                tracing::error!(
                    unit = unit.name(),
                    category = %unit.category(),
                    error = %cause,
                    "unit failed unexpectedly"
                );
                if let Some(rec) = recorder.as_deref_mut() {
                    rec.record(unit, elapsed, Some(cause.to_string()));
                }
                FlowError::Internal { cause }
            }
        };

        for hook in plan.hooks() {
            hook.on_unit(ctx, unit, Some(&err)).await;
        }
        return Err(err);
    }
    Ok(())
}

/// Run one unit, turning a panic into an ordinary failure.
async fn guarded_check(
    unit: &dyn PolicyUnit,
    ctx: &mut RequestContext,
) -> std::result::Result<(), UnitError> {
    match AssertUnwindSafe(unit.check(ctx)).catch_unwind().await {
        Ok(r) => r,
        Err(payload) => Err(UnitError::failure(UnitPanicked(panic_message(payload.as_ref())))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct TraceRecorder {
    started: Instant,
    trace: FlowTrace,
}

impl TraceRecorder {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            trace: FlowTrace::new(),
        }
    }

    fn record(&mut self, unit: &dyn PolicyUnit, elapsed: Duration, reason: Option<String>) {
        let outcome = if reason.is_some() {
            UnitOutcome::Failed
        } else {
            UnitOutcome::Ok
        };
        self.trace.entries.push(TraceEntry {
            unit: unit.name().to_string(),
            category: unit.category(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            outcome,
            reason,
        });
    }

    fn finish(mut self, outcome: FlowOutcome, err: Option<&FlowError>) -> FlowTrace {
        self.trace.total_duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.trace.outcome = match outcome {
            FlowOutcome::Completed => TraceOutcome::Ok,
            FlowOutcome::Aborted => TraceOutcome::Aborted,
            FlowOutcome::Errored => TraceOutcome::Error,
            FlowOutcome::Cancelled => TraceOutcome::Cancelled,
        };
        self.trace.error = err.map(Into::into);
        self.trace
    }
}
