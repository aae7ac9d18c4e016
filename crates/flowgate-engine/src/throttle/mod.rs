//! Throttle backends.
//!
//! The contract lives in `flowgate_core::throttle`; this module provides the
//! default process-local implementation.

pub mod memory;

pub use flowgate_core::throttle::ThrottleBackend;
pub use memory::InMemoryThrottleBackend;
