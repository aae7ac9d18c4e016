use std::collections::HashSet;

use serde::Deserialize;

use flowgate_core::error::{FlowError, Result};
use flowgate_core::Category;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowConfig {
    pub version: u32,

    /// Forces debug tracing on every route.
    #[serde(default)]
    pub debug: bool,

    /// Application scope, merged first into every route.
    #[serde(default)]
    pub app: ScopeConfig,

    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(invalid(format!("unsupported config version: {}", self.version)));
        }
        if self.routes.is_empty() {
            return Err(invalid("routes must not be empty"));
        }

        self.app.validate("app")?;

        let mut group_names = HashSet::new();
        for g in &self.groups {
            if g.name.is_empty() {
                return Err(invalid("group name must not be empty"));
            }
            if !group_names.insert(g.name.as_str()) {
                return Err(invalid(format!("duplicate group: {}", g.name)));
            }
            g.flow.validate(&format!("groups.{}", g.name))?;
        }

        let mut route_names = HashSet::new();
        for r in &self.routes {
            if r.name.is_empty() {
                return Err(invalid("route name must not be empty"));
            }
            if !route_names.insert(r.name.as_str()) {
                return Err(invalid(format!("duplicate route: {}", r.name)));
            }
            if let Some(group) = &r.group {
                if !group_names.contains(group.as_str()) {
                    return Err(invalid(format!(
                        "route {} references unknown group: {group}",
                        r.name
                    )));
                }
            }
            r.flow.validate(&format!("routes.{}", r.name))?;
        }

        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Units and merge directives declared at one scope.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    #[serde(default)]
    pub units: Vec<UnitSpec>,

    /// Each entry replaces the accumulated group of its unit's category.
    #[serde(default, rename = "override")]
    pub overrides: Vec<UnitSpec>,

    /// Categories removed from the accumulated plan.
    #[serde(default)]
    pub disable: Vec<Category>,

    #[serde(default)]
    pub debug: bool,
}

impl ScopeConfig {
    pub fn validate(&self, path: &str) -> Result<()> {
        for spec in self.units.iter().chain(&self.overrides) {
            spec.validate()
                .map_err(|e| invalid(format!("{path}: {e}")))?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.overrides.is_empty() && self.disable.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub flow: ScopeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub flow: ScopeConfig,
}

/// Declarative unit. Callbacks are referenced by registry name.
///
/// Parameterless kinds are empty struct variants so stray keys are rejected
/// like on every other entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum UnitSpec {
    Jwt {
        decoder: String,
        #[serde(default = "default_scheme")]
        scheme: String,
        #[serde(default = "default_auth_header")]
        header: String,
    },
    Cookie {
        lookup: String,
        #[serde(default = "default_cookie_name")]
        cookie_name: String,
    },
    ApiKey {
        validator: String,
        #[serde(default = "default_api_key_header")]
        header: String,
    },
    AllowAnonymous {},
    Authenticated {},
    HasPermission {
        permission: String,
    },
    HasRole {
        role: String,
    },
    FeatureEnabled {
        feature: String,
        #[serde(default)]
        checker: Option<String>,
    },
    RateLimit {
        rate: u64,
        #[serde(default = "default_window_seconds")]
        window_seconds: u64,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        backend: Option<String>,
    },
    QueryFilter {
        fields: Vec<String>,
        #[serde(default = "default_filters_key")]
        state_key: String,
    },
    LimitOffset {
        #[serde(default = "default_max_limit")]
        max_limit: u64,
        #[serde(default = "default_default_limit")]
        default_limit: u64,
        #[serde(default = "default_pagination_key")]
        state_key: String,
    },
    Custom {
        name: String,
    },
}

impl UnitSpec {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            UnitSpec::RateLimit {
                rate,
                window_seconds,
                ..
            } => {
                if *rate == 0 {
                    return Err("rate_limit.rate must be greater than 0".into());
                }
                if *window_seconds == 0 {
                    return Err("rate_limit.window_seconds must be greater than 0".into());
                }
            }
            UnitSpec::LimitOffset {
                max_limit,
                default_limit,
                ..
            } => {
                if *default_limit == 0 || default_limit > max_limit {
                    return Err("limit_offset requires 1 <= default_limit <= max_limit".into());
                }
            }
            UnitSpec::QueryFilter { fields, .. } => {
                if fields.is_empty() {
                    return Err("query_filter.fields must not be empty".into());
                }
            }
            UnitSpec::Jwt { scheme, header, .. } => {
                if scheme.is_empty() || header.is_empty() {
                    return Err("jwt.scheme and jwt.header must not be empty".into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> FlowError {
    FlowError::InvalidConfig(msg.into())
}

fn default_scheme() -> String {
    "Bearer".into()
}
fn default_auth_header() -> String {
    "Authorization".into()
}
fn default_cookie_name() -> String {
    "session".into()
}
fn default_api_key_header() -> String {
    "X-API-Key".into()
}
fn default_window_seconds() -> u64 {
    60
}
fn default_filters_key() -> String {
    crate::units::FILTERS_KEY.into()
}
fn default_max_limit() -> u64 {
    100
}
fn default_default_limit() -> u64 {
    20
}
fn default_pagination_key() -> String {
    crate::units::PAGINATION_KEY.into()
}
