#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use flowgate_core::{
    AfterFlow, Abort, Category, FlowError, FlowHook, FlowOutcome, FlowTrace, InboundRequest,
    Pipeline, PolicyUnit, RequestContext, TraceOutcome, UnitError, UnitOutcome, TRACE_KEY,
};
use flowgate_engine::executor::UnitPanicked;
use flowgate_engine::units::{HasPermission, JwtAuthentication};
use flowgate_engine::{execute, execute_until_cancelled, FlowRunner};

type Log = Arc<Mutex<Vec<String>>>;

enum Behaviour {
    Pass,
    Abort(Abort),
    Fail,
    Panic,
    Sleep(Duration),
}

struct Step {
    category: Category,
    name: &'static str,
    behaviour: Behaviour,
    log: Log,
}

#[async_trait]
impl PolicyUnit for Step {
    fn category(&self) -> Category {
        self.category
    }

    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        self.log.lock().unwrap().push(format!("run:{}", self.name));
        match &self.behaviour {
            Behaviour::Pass => {
                ctx.insert(self.name, true);
                Ok(())
            }
            Behaviour::Abort(a) => Err(a.clone().into()),
            Behaviour::Fail => Err(UnitError::failure(io::Error::new(
                io::ErrorKind::Other,
                "backend unreachable",
            ))),
            Behaviour::Panic => panic!("unit blew up"),
            Behaviour::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
        }
    }
}

struct Recorder {
    log: Log,
}

#[async_trait]
impl FlowHook for Recorder {
    async fn on_flow_start(&self, _ctx: &mut RequestContext) {
        self.log.lock().unwrap().push("start".into());
    }

    async fn on_unit(
        &self,
        _ctx: &mut RequestContext,
        unit: &dyn PolicyUnit,
        error: Option<&FlowError>,
    ) {
        let tag = match error {
            None => "ok".to_string(),
            Some(e) => e.code().as_str().to_string(),
        };
        self.log.lock().unwrap().push(format!("unit:{}:{tag}", unit.name()));
    }

    async fn on_flow_end(&self, _ctx: &mut RequestContext, outcome: FlowOutcome) {
        self.log.lock().unwrap().push(format!("end:{outcome}"));
    }
}

fn step(log: &Log, category: Category, name: &'static str, behaviour: Behaviour) -> Step {
    Step {
        category,
        name,
        behaviour,
        log: Arc::clone(log),
    }
}

fn request() -> InboundRequest {
    InboundRequest::new("GET", "/items")
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

type TraceSlot = Arc<Mutex<Option<FlowTrace>>>;

/// End hook copying the debug trace out of the context, which the caller
/// never gets back on a failed flow.
fn capture_trace() -> (AfterFlow, TraceSlot) {
    let slot: TraceSlot = Arc::default();
    let sink = Arc::clone(&slot);
    let hook = AfterFlow::new(move |ctx, _outcome| {
        let sink = Arc::clone(&sink);
        async move {
            *sink.lock().unwrap() = ctx.get::<FlowTrace>(TRACE_KEY).cloned();
        }
        .boxed()
    });
    (hook, slot)
}

fn take_trace(slot: &TraceSlot) -> FlowTrace {
    slot.lock().unwrap().take().expect("trace recorded")
}

#[tokio::test]
async fn hooks_wrap_every_unit_in_order() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Pagination, "page", Behaviour::Pass))
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_hook(Recorder { log: Arc::clone(&log) });

    let ctx = execute(&p.resolve(), request()).await.unwrap();

    assert_eq!(
        entries(&log),
        ["start", "run:auth", "unit:auth:ok", "run:page", "unit:page:ok", "end:completed"]
    );
    assert_eq!(ctx.get::<bool>("auth"), Some(&true));
    assert_eq!(ctx.get::<bool>("page"), Some(&true));
}

#[tokio::test]
async fn abort_stops_the_flow_and_reaches_the_caller_unchanged() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(
            &log,
            Category::Permission,
            "perm",
            Behaviour::Abort(Abort::permission_denied()),
        ))
        .with_unit(step(&log, Category::Custom, "handler-prep", Behaviour::Pass))
        .with_hook(Recorder { log: Arc::clone(&log) });

    let err = execute(&p.resolve(), request()).await.unwrap_err();

    assert_eq!(err.status(), 403);
    assert_eq!(err.detail(), "Permission denied");
    assert_eq!(
        entries(&log),
        [
            "start",
            "run:auth",
            "unit:auth:ok",
            "run:perm",
            "unit:perm:PERMISSION_DENIED",
            "end:aborted"
        ]
    );
}

#[tokio::test]
async fn unexpected_failure_becomes_a_generic_internal_error() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Custom, "lookup", Behaviour::Fail))
        .with_hook(Recorder { log: Arc::clone(&log) });

    let err = execute(&p.resolve(), request()).await.unwrap_err();

    assert!(matches!(err, FlowError::Internal { .. }));
    assert_eq!(err.status(), 500);
    assert_eq!(err.detail(), "Internal flow error");
    assert!(!err.to_string().contains("unreachable"));
    assert!(err.cause().unwrap().to_string().contains("backend unreachable"));
    assert_eq!(entries(&log).last().unwrap(), "end:errored");
}

#[tokio::test]
async fn panicking_unit_is_contained() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Custom, "boom", Behaviour::Panic))
        .with_hook(Recorder { log: Arc::clone(&log) });

    let err = execute(&p.resolve(), request()).await.unwrap_err();

    assert_eq!(err.status(), 500);
    let cause = err.cause().unwrap();
    assert!(cause.downcast_ref::<UnitPanicked>().is_some());
    assert!(cause.to_string().contains("unit blew up"));
    assert_eq!(
        entries(&log),
        ["start", "run:boom", "unit:boom:INTERNAL", "end:errored"]
    );
}

#[tokio::test]
async fn debug_trace_records_every_unit() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(&log, Category::Filter, "filter", Behaviour::Pass))
        .with_unit(step(&log, Category::Pagination, "page", Behaviour::Pass))
        .with_debug(true);

    let ctx = execute(&p.resolve(), request()).await.unwrap();
    let trace = ctx.get::<FlowTrace>(TRACE_KEY).unwrap();

    assert_eq!(trace.outcome, TraceOutcome::Ok);
    assert_eq!(trace.entries.len(), 3);
    assert!(trace.entries.iter().all(|e| e.outcome == UnitOutcome::Ok));
    assert!(trace.entries.iter().all(|e| e.duration_ms >= 0.0));
    assert_eq!(trace.entries[1].unit, "filter");
    assert_eq!(trace.entries[1].category, Category::Filter);
    assert!(trace.error.is_none());
}

#[tokio::test]
async fn internal_failure_is_traced_as_error() {
    let log: Log = Log::default();
    let (hook, slot) = capture_trace();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(&log, Category::Custom, "lookup", Behaviour::Fail))
        .with_unit(step(&log, Category::Custom, "never", Behaviour::Pass))
        .with_debug(true)
        .with_hook(hook);

    let err = execute(&p.resolve(), request()).await.unwrap_err();
    assert_eq!(err.status(), 500);

    let trace = take_trace(&slot);
    assert_eq!(trace.outcome, TraceOutcome::Error);
    assert_eq!(trace.entries.len(), 2);
    assert_eq!(trace.entries[1].unit, "lookup");
    assert_eq!(trace.entries[1].outcome, UnitOutcome::Failed);
    assert_eq!(trace.entries[1].reason.as_deref(), Some("backend unreachable"));

    // the summary carries the client-safe text only
    let failure = trace.error.unwrap();
    assert_eq!(failure.status, 500);
    assert_eq!(failure.code, "INTERNAL");
    assert_eq!(failure.detail, "Internal flow error");
}

#[tokio::test(start_paused = true)]
async fn cancelled_flow_is_traced_as_cancelled() {
    let log: Log = Log::default();
    let (hook, slot) = capture_trace();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(
            &log,
            Category::Custom,
            "slow",
            Behaviour::Sleep(Duration::from_secs(30)),
        ))
        .with_debug(true)
        .with_hook(hook);
    let plan = p.resolve();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = execute_until_cancelled(&plan, request(), &token).await.unwrap_err();
    assert_eq!(err.status(), 499);

    let trace = take_trace(&slot);
    assert_eq!(trace.outcome, TraceOutcome::Cancelled);
    // the abandoned unit leaves no entry
    assert_eq!(trace.entries.len(), 1);
    assert_eq!(trace.entries[0].unit, "auth");
    assert_eq!(trace.error.unwrap().code, "CANCELLED");
}

#[tokio::test]
async fn no_trace_without_debug() {
    let log: Log = Log::default();
    let p = Pipeline::new().with_unit(step(&log, Category::Custom, "c", Behaviour::Pass));

    let ctx = execute(&p.resolve(), request()).await.unwrap();
    assert!(ctx.get::<FlowTrace>(TRACE_KEY).is_none());
}

#[tokio::test]
async fn failed_trace_is_visible_to_end_hooks() {
    let (hook, slot) = capture_trace();
    let log: Log = Log::default();

    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(
            &log,
            Category::Throttling,
            "limit",
            Behaviour::Abort(Abort::throttled(Some(12))),
        ))
        .with_unit(step(&log, Category::Pagination, "page", Behaviour::Pass))
        .with_debug(true)
        .with_hook(hook);

    let err = execute(&p.resolve(), request()).await.unwrap_err();
    assert_eq!(err.retry_after(), Some(12));

    let trace = take_trace(&slot);
    assert_eq!(trace.outcome, TraceOutcome::Aborted);
    assert_eq!(trace.entries.len(), 2);
    let failed: Vec<_> = trace.failed_entries().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].unit, "limit");
    assert_eq!(failed[0].reason.as_deref(), Some("Rate limit exceeded"));
    let failure = trace.error.unwrap();
    assert_eq!(failure.status, 429);
    assert_eq!(failure.code, "THROTTLED");
}

#[tokio::test]
async fn auth_then_permission_end_to_end() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(JwtAuthentication::new(|token: String| async move {
            match token.as_str() {
                "reader" => Ok(json!({ "sub": "u1", "permissions": ["read"] })),
                _ => Err(UnitError::from(Abort::authentication_failed())),
            }
        }))
        .with_unit(HasPermission::new("write"))
        .with_unit(step(&log, Category::Custom, "after", Behaviour::Pass))
        .with_debug(true);
    let (hook, slot) = capture_trace();
    let p = p.with_hook(hook);
    let runner = FlowRunner::new(&p);

    let denied = runner
        .run(request().with_header("Authorization", "Bearer reader"))
        .await
        .unwrap_err();
    assert_eq!(denied.status(), 403);
    assert_eq!(denied.code().as_str(), "PERMISSION_DENIED");
    assert!(entries(&log).is_empty());

    let trace = take_trace(&slot);
    assert_eq!(trace.outcome, TraceOutcome::Aborted);
    assert_eq!(trace.entries.len(), 2);
    assert_eq!(trace.entries[0].outcome, UnitOutcome::Ok);
    let failed: Vec<_> = trace.failed_entries().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].unit, "HasPermission");
    assert_eq!(failed[0].category, Category::Permission);
    assert_eq!(failed[0].reason.as_deref(), Some("Permission denied"));

    let unauthenticated = runner.run(request()).await.unwrap_err();
    assert_eq!(unauthenticated.status(), 401);

    let wrong_scheme = runner
        .run(request().with_header("Authorization", "Basic reader"))
        .await
        .unwrap_err();
    assert_eq!(wrong_scheme.status(), 401);
}

#[tokio::test]
async fn same_plan_serves_concurrent_requests() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(&log, Category::Custom, "custom", Behaviour::Pass));
    let runner = FlowRunner::new(&p);

    let mut tasks = Vec::new();
    for i in 0..32 {
        let runner = runner.clone();
        tasks.push(tokio::spawn(async move {
            runner.run(InboundRequest::new("GET", format!("/items/{i}"))).await
        }));
    }
    for t in tasks {
        let ctx = t.await.unwrap().unwrap();
        assert_eq!(ctx.get::<bool>("custom"), Some(&true));
    }
    assert_eq!(entries(&log).len(), 64);
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_the_suspended_unit() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Authentication, "auth", Behaviour::Pass))
        .with_unit(step(
            &log,
            Category::Custom,
            "slow",
            Behaviour::Sleep(Duration::from_secs(30)),
        ))
        .with_unit(step(&log, Category::Custom, "never", Behaviour::Pass))
        .with_hook(Recorder { log: Arc::clone(&log) });
    let plan = p.resolve();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = execute_until_cancelled(&plan, request(), &token).await.unwrap_err();

    assert!(matches!(err, FlowError::Cancelled));
    assert_eq!(err.status(), 499);
    assert_eq!(
        entries(&log),
        ["start", "run:auth", "unit:auth:ok", "run:slow", "end:cancelled"]
    );
}

#[tokio::test]
async fn already_cancelled_token_runs_nothing() {
    let log: Log = Log::default();
    let p = Pipeline::new()
        .with_unit(step(&log, Category::Custom, "c", Behaviour::Pass))
        .with_hook(Recorder { log: Arc::clone(&log) });

    let token = CancellationToken::new();
    token.cancel();
    let err = execute_until_cancelled(&p.resolve(), request(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.code().as_str(), "CANCELLED");
    assert_eq!(entries(&log), ["start", "end:cancelled"]);
}

#[tokio::test]
async fn empty_plan_completes_with_a_fresh_context() {
    let log: Log = Log::default();
    let p = Pipeline::new().with_hook(Recorder { log: Arc::clone(&log) });

    let ctx = execute(&p.resolve(), request()).await.unwrap();
    assert!(ctx.state().is_empty());
    assert!(ctx.principal().is_none());
    assert_eq!(entries(&log), ["start", "end:completed"]);
}
