//! Query filter extraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;

use flowgate_core::error::UnitError;
use flowgate_core::{Category, Descriptor, PolicyUnit, RequestContext};

/// Default context store key for extracted filters.
pub const FILTERS_KEY: &str = "filters";

/// Field -> raw query value, only for fields present in the request.
pub type Filters = BTreeMap<String, String>;

/// Copies the configured query parameters into the context store.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    fields: Vec<String>,
    state_key: String,
}

impl QueryFilter {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            state_key: FILTERS_KEY.into(),
        }
    }

    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = key.into();
        self
    }
}

#[async_trait]
impl PolicyUnit for QueryFilter {
    fn category(&self) -> Category {
        Category::Filter
    }

    fn name(&self) -> &str {
        "QueryFilter"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let req = ctx.request();
        let filters: Filters = self
            .fields
            .iter()
            .filter_map(|f| req.query(f).map(|v| (f.clone(), v.to_string())))
            .collect();
        ctx.insert(self.state_key.clone(), filters);
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        let d = self.fields.iter().fold(Descriptor::new(), |d, f| {
            d.with_parameter(json!({
                "name": f,
                "in": "query",
                "required": false,
                "schema": { "type": "string" },
            }))
        });
        Some(d)
    }
}
