//! flowgate engine library entry.
//!
//! This crate wires the execution engine, the built-in policy units, the
//! in-memory throttle backend, lifecycle hooks, metrics, and the YAML route
//! configuration into a runnable stack. It is consumed by the binary
//! (`main.rs`), by integration tests, and by transport adapters.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod executor;
pub mod hooks;
pub mod obs;
pub mod registry;
pub mod routes;
pub mod throttle;
pub mod units;

pub use executor::{execute, execute_until_cancelled, FlowRunner};
pub use registry::Registry;
pub use routes::RouteTable;
pub use throttle::InMemoryThrottleBackend;
