use std::collections::BTreeMap;
use std::sync::Arc;

use crate::category::Category;
use crate::unit::{PolicyUnit, SharedUnit};

use super::{flatten_into, Item, Pipeline};

/// Merge directive: replace the whole accumulated group of the unit's
/// category with this single unit.
#[derive(Clone)]
pub struct Override {
    unit: SharedUnit,
}

impl Override {
    pub fn new<U>(unit: U) -> Self
    where
        U: PolicyUnit + 'static,
    {
        Self {
            unit: Arc::new(unit),
        }
    }

    pub fn shared(unit: SharedUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &SharedUnit {
        &self.unit
    }

    pub fn category(&self) -> Category {
        self.unit.category()
    }
}

/// Merge directive: drop the accumulated group of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disable {
    category: Category,
}

impl Disable {
    pub fn new(category: Category) -> Self {
        Self { category }
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

enum Directive<'a> {
    Override(&'a Override),
    Disable(Disable),
}

/// Combine pipelines left to right with per-category last-writer-wins.
///
/// For each input: every category it populates replaces the accumulated group
/// for that category (replace, never append); then its Override/Disable
/// directives apply in declaration order. The result lists surviving groups in
/// rank order, carries the OR of every input's debug flag, and has no hooks.
pub fn merge<'a, I>(pipelines: I) -> Pipeline
where
    I: IntoIterator<Item = &'a Pipeline>,
{
    let mut groups: BTreeMap<Category, Vec<SharedUnit>> = BTreeMap::new();
    let mut debug = false;

    for pipeline in pipelines {
        debug |= pipeline.is_debug();

        let mut contributed: BTreeMap<Category, Vec<SharedUnit>> = BTreeMap::new();
        let mut directives: Vec<Directive<'_>> = Vec::new();

        for item in pipeline.items() {
            match item {
                Item::Unit(u) => contributed.entry(u.category()).or_default().push(Arc::clone(u)),
                Item::Nested(nested) => {
                    let mut flat = Vec::new();
                    flatten_into(nested.items(), &mut flat);
                    for u in flat {
                        contributed.entry(u.category()).or_default().push(u);
                    }
                }
                Item::Override(o) => directives.push(Directive::Override(o)),
                Item::Disable(d) => directives.push(Directive::Disable(*d)),
            }
        }

        groups.extend(contributed);

        for directive in directives {
            match directive {
                Directive::Override(o) => {
                    groups.insert(o.category(), vec![Arc::clone(o.unit())]);
                }
                Directive::Disable(d) => {
                    if groups.remove(&d.category()).is_none() {
                        tracing::debug!(
                            category = %d.category(),
                            "disable on empty category ignored"
                        );
                    }
                }
            }
        }
    }

    let items = groups.into_values().flatten().map(Item::Unit);
    Pipeline::from_items(items).with_debug(debug)
}
