//! Top-level facade crate for flowgate.
//!
//! Re-exports the pipeline model and the execution engine so users can depend
//! on a single crate.

pub mod core {
    pub use flowgate_core::*;
}

pub mod engine {
    pub use flowgate_engine::*;
}
