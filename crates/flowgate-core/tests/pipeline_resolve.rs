#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;

use flowgate_core::{Category, FlowHook, Item, Pipeline, PolicyUnit, RequestContext, UnitError};

struct Stub {
    category: Category,
    name: String,
}

fn stub(category: Category, name: &str) -> Stub {
    Stub {
        category,
        name: name.to_string(),
    }
}

#[async_trait]
impl PolicyUnit for Stub {
    fn category(&self) -> Category {
        self.category
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _ctx: &mut RequestContext) -> Result<(), UnitError> {
        Ok(())
    }
}

struct Quiet;

#[async_trait]
impl FlowHook for Quiet {}

fn names(p: &Pipeline) -> Vec<String> {
    p.resolve().units().iter().map(|u| u.name().to_string()).collect()
}

#[test]
fn resolve_returns_cached_plan_until_mutation() {
    let mut p = Pipeline::new().with_unit(stub(Category::Custom, "a"));

    let first = p.resolve();
    let second = p.resolve();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(p.is_resolved());

    p.add_unit(stub(Category::Custom, "b"));
    assert!(!p.is_resolved());
    let third = p.resolve();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), 2);

    // the old handle is still a valid snapshot
    assert_eq!(first.len(), 1);
}

#[test]
fn adding_a_hook_or_toggling_debug_invalidates() {
    let mut p = Pipeline::new().with_unit(stub(Category::Custom, "a"));
    let before = p.resolve();

    p.add_hook(Quiet);
    let with_hook = p.resolve();
    assert!(!Arc::ptr_eq(&before, &with_hook));
    assert_eq!(with_hook.hooks().len(), 1);

    p.set_debug(true);
    let debug = p.resolve();
    assert!(!Arc::ptr_eq(&with_hook, &debug));
    assert!(debug.debug());
}

#[test]
fn units_sort_by_rank_and_keep_insertion_order_within_a_category() {
    let p = Pipeline::new()
        .with_unit(stub(Category::Custom, "custom"))
        .with_unit(stub(Category::Pagination, "page"))
        .with_unit(stub(Category::Permission, "perm-1"))
        .with_unit(stub(Category::Authentication, "auth"))
        .with_unit(stub(Category::Permission, "perm-2"))
        .with_unit(stub(Category::Throttling, "throttle"));

    assert_eq!(
        names(&p),
        ["auth", "perm-1", "perm-2", "throttle", "page", "custom"]
    );
    assert_eq!(
        p.resolve().categories(),
        [
            Category::Authentication,
            Category::Permission,
            Category::Throttling,
            Category::Pagination,
            Category::Custom,
        ]
    );
}

#[test]
fn nested_pipelines_expand_in_place() {
    let inner = Pipeline::new()
        .with_unit(stub(Category::Permission, "inner-perm"))
        .with_unit(stub(Category::Authentication, "inner-auth"));
    let p = Pipeline::new()
        .with_unit(stub(Category::Permission, "outer-perm-1"))
        .with(inner)
        .with_unit(stub(Category::Permission, "outer-perm-2"));

    assert_eq!(
        names(&p),
        ["inner-auth", "outer-perm-1", "inner-perm", "outer-perm-2"]
    );
}

#[test]
fn deep_nesting_flattens() {
    let mut p = Pipeline::new().with_unit(stub(Category::Custom, "leaf"));
    for depth in 0..256 {
        p = Pipeline::new()
            .with_unit(stub(Category::Filter, &format!("f{depth}")))
            .with(p);
    }

    let plan = p.resolve();
    assert_eq!(plan.len(), 257);
    assert_eq!(plan.units().last().unwrap().name(), "leaf");
    assert_eq!(plan.units()[0].name(), "f255");
}

#[test]
fn directives_do_not_reach_a_plan() {
    use flowgate_core::{Disable, Override};

    let p = Pipeline::from_items([
        Item::unit(stub(Category::Authentication, "auth")),
        Item::from(Override::new(stub(Category::Authentication, "other"))),
        Item::from(Disable::new(Category::Authentication)),
    ]);
    assert_eq!(names(&p), ["auth"]);
}

#[test]
fn empty_pipeline_resolves_to_empty_plan() {
    let plan = Pipeline::new().resolve();
    assert!(plan.is_empty());
    assert!(plan.hooks().is_empty());
    assert!(!plan.debug());
}

#[test]
fn category_ranks_are_fixed() {
    let ranks: Vec<u8> = Category::ALL.iter().map(|c| c.rank()).collect();
    assert_eq!(ranks, [1, 2, 3, 4, 5, 6, 7]);
    assert!(Category::Authentication < Category::Custom);
    assert_eq!(Category::Throttling.as_str(), "throttling");
}
