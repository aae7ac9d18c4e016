//! Compiled route table.
//!
//! Each route's runner is `merge(app, group, route)` resolved once at startup.
//! Units built for the app and group scopes are shared by every route that
//! inherits them, so e.g. an app-level rate limit counts across all routes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use flowgate_core::error::Result;
use flowgate_core::{merge, Category, Disable, FlowHook, Item, Override, Pipeline};

use crate::config::{FlowConfig, ScopeConfig};
use crate::executor::FlowRunner;
use crate::registry::Registry;

#[derive(Debug)]
pub struct RouteTable {
    routes: HashMap<String, FlowRunner>,
    order: Vec<String>,
}

impl RouteTable {
    pub fn compile(cfg: &FlowConfig, registry: &Registry) -> Result<Self> {
        Self::compile_with_hooks(cfg, registry, &[])
    }

    /// Compile every route and attach `hooks` to each merged pipeline.
    pub fn compile_with_hooks(
        cfg: &FlowConfig,
        registry: &Registry,
        hooks: &[Arc<dyn FlowHook>],
    ) -> Result<Self> {
        // 1) Build shared scopes once
        let app = build_scope(&cfg.app, registry)?;
        let mut groups = HashMap::new();
        for g in &cfg.groups {
            groups.insert(g.name.as_str(), (build_scope(&g.flow, registry)?, &g.flow));
        }

        // 2) Merge per route
        let mut routes = HashMap::new();
        let mut order = Vec::with_capacity(cfg.routes.len());
        for r in &cfg.routes {
            let route = build_scope(&r.flow, registry)?;
            let group = r.group.as_deref().and_then(|name| groups.get(name));

            let mut scopes: Vec<&Pipeline> = vec![&app];
            if let Some((pipeline, _)) = group {
                scopes.push(pipeline);
            }
            scopes.push(&route);

            // Disabling something no outer scope declares is allowed; flag it.
            let mut declared = declared_categories(&app);
            if let Some((pipeline, scope)) = group {
                warn_unused_disables(&r.name, &declared, &scope.disable);
                declared.extend(declared_categories(pipeline));
            }
            warn_unused_disables(&r.name, &declared, &r.flow.disable);

            let mut merged = merge(scopes);
            if cfg.debug {
                merged.set_debug(true);
            }
            for hook in hooks {
                merged.add_shared_hook(Arc::clone(hook));
            }

            let runner = FlowRunner::new(&merged);
            tracing::debug!(
                route = %r.name,
                units = runner.plan().len(),
                debug = runner.plan().debug(),
                "route compiled"
            );
            routes.insert(r.name.clone(), runner);
            order.push(r.name.clone());
        }

        Ok(Self { routes, order })
    }

    pub fn get(&self, route: &str) -> Option<&FlowRunner> {
        self.routes.get(route)
    }

    /// Route names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Units first, then directives, in declaration order.
fn build_scope(scope: &ScopeConfig, registry: &Registry) -> Result<Pipeline> {
    let mut items =
        Vec::with_capacity(scope.units.len() + scope.overrides.len() + scope.disable.len());
    for spec in &scope.units {
        items.push(Item::Unit(registry.build(spec)?));
    }
    for spec in &scope.overrides {
        items.push(Item::Override(Override::shared(registry.build(spec)?)));
    }
    for category in &scope.disable {
        items.push(Item::Disable(Disable::new(*category)));
    }
    Ok(Pipeline::from_items(items).with_debug(scope.debug))
}

fn declared_categories(pipeline: &Pipeline) -> BTreeSet<Category> {
    pipeline
        .items()
        .iter()
        .filter_map(|item| match item {
            Item::Unit(u) => Some(u.category()),
            Item::Override(o) => Some(o.category()),
            Item::Nested(_) | Item::Disable(_) => None,
        })
        .collect()
}

fn warn_unused_disables(route: &str, outer: &BTreeSet<Category>, disable: &[Category]) {
    for category in disable {
        if !outer.contains(category) {
            tracing::warn!(
                route,
                category = %category,
                "disable refers to a category no outer scope declares"
            );
        }
    }
}
