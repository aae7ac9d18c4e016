//! Execution engine.
//!
//! Runs a resolved plan once per request: start hooks, units in plan order,
//! per-unit hooks, end hooks on every exit path, optional debug trace.

pub mod engine;
pub mod runner;

pub use engine::{execute, execute_until_cancelled, UnitPanicked};
pub use runner::FlowRunner;
