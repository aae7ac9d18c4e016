//! flowgate core: the request pipeline model.
//!
//! This crate defines categories, policy units, pipelines and their merge
//! rules, resolved plans, lifecycle hooks, traces, metadata aggregation, and
//! the error surface shared by the engine and adapters. It carries no runtime
//! dependency so adapters can reuse it anywhere.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `FlowError`/`UnitError` so a bad request can never crash the
//! process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod category;
pub mod context;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod pipeline;
pub mod throttle;
pub mod trace;
pub mod unit;

pub use category::Category;
pub use context::{InboundRequest, Principal, RequestContext, StateStore};
pub use error::{Abort, AbortKind, BoxError, ErrorCode, FlowError, Result, UnitError};
pub use hooks::{AfterFlow, AfterUnit, BeforeFlow, FlowHook, FlowOutcome};
pub use metadata::{aggregate, Descriptor};
pub use pipeline::{merge, Disable, Item, Override, Pipeline, Plan};
pub use throttle::ThrottleBackend;
pub use trace::{FlowTrace, TraceEntry, TraceOutcome, UnitOutcome, TRACE_KEY};
pub use unit::{PolicyUnit, SharedUnit};
