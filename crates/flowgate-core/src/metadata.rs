//! Boundary-documentation fragments and their aggregation.
//!
//! Units optionally describe what they add to an endpoint's contract (security
//! requirements, response codes, parameters, vendor extensions). The
//! aggregator folds those fragments in plan order into one descriptor that an
//! external documentation generator can consume.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::pipeline::Plan;

/// Prefix distinguishing vendor extension keys from standard keys.
pub const EXTENSION_PREFIX: &str = "x-";

/// One security requirement: scheme name -> scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Metadata fragment (per unit) or merged descriptor (per plan).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Descriptor {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<u16, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Vec<Value>>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.security_schemes.is_empty()
            && self.security.is_empty()
            && self.responses.is_empty()
            && self.parameters.is_empty()
            && self.extensions.is_empty()
    }

    pub fn with_security_scheme(mut self, name: impl Into<String>, scheme: Value) -> Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    /// Require `scheme` with the given scopes. Duplicates are ignored.
    pub fn with_security(mut self, scheme: impl Into<String>, scopes: Vec<String>) -> Self {
        let mut req = SecurityRequirement::new();
        req.insert(scheme.into(), scopes);
        if !self.security.contains(&req) {
            self.security.push(req);
        }
        self
    }

    pub fn with_response(mut self, status: u16, response: Value) -> Self {
        self.responses.insert(status, response);
        self
    }

    pub fn with_response_description(self, status: u16, description: &str) -> Self {
        self.with_response(status, json!({ "description": description }))
    }

    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append vendor extension values. `key` gets the `x-` prefix if missing.
    pub fn with_extension(mut self, key: &str, values: Vec<Value>) -> Self {
        let key = if key.starts_with(EXTENSION_PREFIX) {
            key.to_string()
        } else {
            format!("{EXTENSION_PREFIX}{key}")
        };
        self.extensions.entry(key).or_default().extend(values);
        self
    }

    /// Fold `other` into `self` using the aggregation rules.
    pub fn absorb(&mut self, other: &Descriptor) {
        for (name, scheme) in &other.security_schemes {
            self.security_schemes.insert(name.clone(), scheme.clone());
        }
        for req in &other.security {
            if !self.security.contains(req) {
                self.security.push(req.clone());
            }
        }
        for (status, resp) in &other.responses {
            self.responses.insert(*status, resp.clone());
        }
        self.parameters.extend(other.parameters.iter().cloned());
        for (key, values) in &other.extensions {
            self.extensions
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Merge every unit's fragment, in plan order, into one descriptor.
///
/// Pure function of the plan: running it twice yields identical output.
pub fn aggregate(plan: &Plan) -> Descriptor {
    let mut out = Descriptor::new();
    for unit in plan.units() {
        if let Some(fragment) = unit.describe() {
            out.absorb(&fragment);
        }
    }
    out
}
