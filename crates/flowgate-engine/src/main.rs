//! flowgate: compile a route config and print every route's plan.
//!
//! Usage: `flowgate [config.yaml]` (default `flowgate.yaml`).
//! Each route is printed as JSON with its ordered units and merged metadata,
//! then run once with an anonymous request so misconfigured flows show up
//! in the logs before any adapter is wired in.

use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use flowgate_core::{Abort, FlowError, FlowHook, InboundRequest, Principal, UnitError};
use flowgate_engine::obs::{FlowMetrics, MetricsHook};
use flowgate_engine::{config, hooks::TracingHook, Registry, RouteTable};

use std::sync::Arc;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "flowgate.yaml".to_string());
    if let Err(e) = run(&path).await {
        tracing::error!(error = %e, config = %path, "flowgate failed");
        std::process::exit(1);
    }
}

async fn run(path: &str) -> Result<(), FlowError> {
    let cfg = config::load_from_file(path)?;

    let registry = dev_registry();
    let metrics = Arc::new(FlowMetrics::new());
    let hooks: Vec<Arc<dyn FlowHook>> = vec![
        Arc::new(TracingHook),
        Arc::new(MetricsHook::new(Arc::clone(&metrics))),
    ];
    let table = RouteTable::compile_with_hooks(&cfg, &registry, &hooks)?;
    tracing::info!(routes = table.len(), "route table compiled");

    for name in table.names() {
        let Some(runner) = table.get(name) else {
            continue;
        };
        let units: Vec<_> = runner
            .plan()
            .units()
            .iter()
            .map(|u| json!({ "unit": u.name(), "category": u.category() }))
            .collect();
        let doc = json!({
            "route": name,
            "debug": runner.plan().debug(),
            "units": units,
            "metadata": runner.metadata().to_json(),
        });
        println!("{doc}");

        let anonymous = InboundRequest::new("GET", format!("/{name}")).with_client("127.0.0.1");
        match runner.run(anonymous).await {
            Ok(_) => tracing::info!(route = name, "anonymous request passed"),
            Err(e) => tracing::info!(
                route = name,
                status = e.status(),
                code = e.code().as_str(),
                detail = e.detail(),
                "anonymous request stopped"
            ),
        }
    }

    print!("{}", metrics.render(&[("flowgate_routes", table.len() as u64)]));
    Ok(())
}

/// Callbacks available to configs run through the CLI.
///
/// `dev` accepts the literal credential `dev` and yields a principal with
/// read/write permissions and the `admin` role.
fn dev_registry() -> Registry {
    let registry = Registry::new();
    registry.register_credential_fn("dev", |credential: String| async move {
        let principal: Result<Principal, UnitError> = if credential == "dev" {
            Ok(json!({
                "sub": "dev",
                "permissions": ["read", "write"],
                "roles": ["admin"],
            }))
        } else {
            Err(Abort::authentication_failed_with("Unknown credential").into())
        };
        principal
    });
    registry.register_feature_fn("dev", |feature: String| async move {
        Ok::<_, UnitError>(feature != "disabled")
    });
    registry
}
