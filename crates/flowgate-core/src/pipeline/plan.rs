use std::fmt;
use std::sync::Arc;

use crate::category::Category;
use crate::hooks::FlowHook;
use crate::unit::SharedUnit;

/// Immutable, pre-computed execution plan.
///
/// Shared by reference between every concurrent execution of a route.
pub struct Plan {
    units: Vec<SharedUnit>,
    hooks: Vec<Arc<dyn FlowHook>>,
    debug: bool,
}

impl Plan {
    pub(crate) fn new(units: Vec<SharedUnit>, hooks: Vec<Arc<dyn FlowHook>>, debug: bool) -> Self {
        Self { units, hooks, debug }
    }

    /// Units in execution order.
    pub fn units(&self) -> &[SharedUnit] {
        &self.units
    }

    pub fn hooks(&self) -> &[Arc<dyn FlowHook>] {
        &self.hooks
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units belonging to one category, in execution order.
    pub fn units_in(&self, category: Category) -> impl Iterator<Item = &SharedUnit> {
        self.units.iter().filter(move |u| u.category() == category)
    }

    pub fn categories(&self) -> Vec<Category> {
        let mut out: Vec<Category> = Vec::new();
        for u in &self.units {
            let c = u.category();
            if out.last() != Some(&c) {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units: Vec<String> = self
            .units
            .iter()
            .map(|u| format!("{}:{}", u.category(), u.name()))
            .collect();
        f.debug_struct("Plan")
            .field("units", &units)
            .field("hooks", &self.hooks.len())
            .field("debug", &self.debug)
            .finish()
    }
}
