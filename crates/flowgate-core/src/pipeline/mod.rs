//! Pipeline builder, plan resolution and merge.
//!
//! A [`Pipeline`] is a mutable declaration: units, nested pipelines and merge
//! directives in insertion order. [`Pipeline::resolve`] turns it into an
//! immutable [`Plan`] (flattened, sorted by category rank) and caches it until
//! the next mutation. [`merge`] combines pipelines declared at different
//! scopes into one.

mod merge;
mod plan;

use std::fmt;
use std::sync::{Arc, OnceLock};

pub use merge::{merge, Disable, Override};
pub use plan::Plan;

use crate::hooks::FlowHook;
use crate::unit::{PolicyUnit, SharedUnit};

/// One entry of a pipeline.
#[derive(Clone)]
pub enum Item {
    Unit(SharedUnit),
    Nested(Pipeline),
    Override(Override),
    Disable(Disable),
}

impl Item {
    pub fn unit<U>(unit: U) -> Self
    where
        U: PolicyUnit + 'static,
    {
        Item::Unit(Arc::new(unit))
    }
}

impl From<SharedUnit> for Item {
    fn from(u: SharedUnit) -> Self {
        Item::Unit(u)
    }
}

impl From<Pipeline> for Item {
    fn from(p: Pipeline) -> Self {
        Item::Nested(p)
    }
}

impl From<Override> for Item {
    fn from(o: Override) -> Self {
        Item::Override(o)
    }
}

impl From<Disable> for Item {
    fn from(d: Disable) -> Self {
        Item::Disable(d)
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Unit(u) => write!(f, "Unit({}:{})", u.category(), u.name()),
            Item::Nested(p) => f.debug_tuple("Nested").field(p).finish(),
            Item::Override(o) => write!(f, "Override({}:{})", o.category(), o.unit().name()),
            Item::Disable(d) => write!(f, "Disable({})", d.category()),
        }
    }
}

/// Ordered, mutable container of units, nested pipelines and directives.
#[derive(Clone, Default)]
pub struct Pipeline {
    items: Vec<Item>,
    hooks: Vec<Arc<dyn FlowHook>>,
    debug: bool,
    resolved: OnceLock<Arc<Plan>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            items: items.into_iter().collect(),
            ..Self::default()
        }
    }

    // ---- chaining constructors

    pub fn with(mut self, item: impl Into<Item>) -> Self {
        self.add([item.into()]);
        self
    }

    pub fn with_unit<U>(mut self, unit: U) -> Self
    where
        U: PolicyUnit + 'static,
    {
        self.add_unit(unit);
        self
    }

    pub fn with_hook<H>(mut self, hook: H) -> Self
    where
        H: FlowHook + 'static,
    {
        self.add_hook(hook);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.set_debug(debug);
        self
    }

    // ---- mutation (every call drops the cached plan)

    pub fn add<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = Item>,
    {
        self.items.extend(items);
        self.invalidate();
        self
    }

    pub fn add_unit<U>(&mut self, unit: U) -> &mut Self
    where
        U: PolicyUnit + 'static,
    {
        self.add([Item::unit(unit)])
    }

    pub fn add_hook<H>(&mut self, hook: H) -> &mut Self
    where
        H: FlowHook + 'static,
    {
        self.add_shared_hook(Arc::new(hook))
    }

    /// Register a hook instance shared with other pipelines.
    pub fn add_shared_hook(&mut self, hook: Arc<dyn FlowHook>) -> &mut Self {
        self.hooks.push(hook);
        self.invalidate();
        self
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self.invalidate();
        self
    }

    fn invalidate(&mut self) {
        self.resolved = OnceLock::new();
    }

    // ---- accessors

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn hooks(&self) -> &[Arc<dyn FlowHook>] {
        &self.hooks
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Flatten, sort and cache the execution plan.
    ///
    /// Repeated calls without an intervening mutation return the same `Arc`.
    /// Directives are skipped here; they only mean something to [`merge`].
    pub fn resolve(&self) -> Arc<Plan> {
        let plan = self.resolved.get_or_init(|| {
            let mut flat = Vec::new();
            flatten_into(&self.items, &mut flat);
            // stable: ties keep insertion order
            flat.sort_by_key(|u| u.category().rank());
            tracing::trace!(units = flat.len(), debug = self.debug, "pipeline resolved");
            Arc::new(Plan::new(flat, self.hooks.clone(), self.debug))
        });
        Arc::clone(plan)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("items", &self.items)
            .field("hooks", &self.hooks.len())
            .field("debug", &self.debug)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Depth-first walk collecting units; nested pipelines expand in place.
/// Uses an explicit stack so deep nesting cannot exhaust the call stack.
pub(crate) fn flatten_into(items: &[Item], out: &mut Vec<SharedUnit>) {
    let mut stack = vec![items.iter()];
    loop {
        let next = match stack.last_mut() {
            Some(iter) => iter.next(),
            None => break,
        };
        match next {
            None => {
                stack.pop();
            }
            Some(Item::Unit(u)) => out.push(Arc::clone(u)),
            Some(Item::Nested(p)) => stack.push(p.items.iter()),
            Some(Item::Override(_)) | Some(Item::Disable(_)) => {}
        }
    }
}
