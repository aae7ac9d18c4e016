//! Policy unit contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::category::Category;
use crate::context::RequestContext;
use crate::error::UnitError;
use crate::metadata::Descriptor;

/// A single ordered step of a pipeline.
///
/// Units are immutable once built: thresholds, callbacks and backend handles
/// are fixed at construction, so one instance can serve any number of
/// concurrent requests.
#[async_trait]
pub trait PolicyUnit: Send + Sync {
    /// Phase this unit runs in.
    fn category(&self) -> Category;

    /// Display name used in traces, logs and metrics labels.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Check and/or mutate the context. May suspend.
    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError>;

    /// Optional documentation fragment.
    fn describe(&self) -> Option<Descriptor> {
        None
    }
}

/// Shared handle to a unit.
pub type SharedUnit = Arc<dyn PolicyUnit>;

/// `a::b::Foo<c::Bar>` -> `Foo`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
