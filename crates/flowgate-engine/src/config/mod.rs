//! Route config loader (strict parsing).

pub mod schema;

use std::fs;

use flowgate_core::error::{FlowError, Result};

pub use schema::{FlowConfig, GroupConfig, RouteConfig, ScopeConfig, UnitSpec};

pub fn load_from_file(path: &str) -> Result<FlowConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FlowError::InvalidConfig(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<FlowConfig> {
    let cfg: FlowConfig = serde_yaml::from_str(s)
        .map_err(|e| FlowError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
