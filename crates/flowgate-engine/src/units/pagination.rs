//! Limit/offset pagination.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use flowgate_core::error::{Abort, UnitError};
use flowgate_core::{Category, Descriptor, PolicyUnit, RequestContext};

/// Default context store key for the parsed window.
pub const PAGINATION_KEY: &str = "pagination";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

/// Parses `limit` / `offset` query parameters.
///
/// Omitted values fall back to the defaults; a limit above `max_limit` is
/// clamped; non-numeric input, `limit <= 0` and `offset < 0` abort with 400.
#[derive(Debug, Clone)]
pub struct LimitOffset {
    max_limit: u64,
    default_limit: u64,
    state_key: String,
}

impl Default for LimitOffset {
    fn default() -> Self {
        Self {
            max_limit: 100,
            default_limit: 20,
            state_key: PAGINATION_KEY.into(),
        }
    }
}

impl LimitOffset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn with_default_limit(mut self, default_limit: u64) -> Self {
        self.default_limit = default_limit;
        self
    }

    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = key.into();
        self
    }

    fn parse(&self, ctx: &RequestContext) -> Result<Pagination, Abort> {
        let req = ctx.request();

        let limit = match req.query("limit") {
            None => self.default_limit,
            Some(raw) => {
                let n = parse_saturating(raw)
                    .ok_or_else(|| Abort::bad_request("Invalid limit parameter"))?;
                if n <= 0 {
                    return Err(Abort::bad_request("Limit must be positive"));
                }
                n as u64
            }
        };

        let offset = match req.query("offset") {
            None => 0,
            Some(raw) => {
                let n = parse_saturating(raw)
                    .ok_or_else(|| Abort::bad_request("Invalid offset parameter"))?;
                if n < 0 {
                    return Err(Abort::bad_request("Offset must not be negative"));
                }
                n as u64
            }
        };

        Ok(Pagination {
            limit: limit.min(self.max_limit),
            offset,
        })
    }
}

/// Integer query value. Well-formed numbers beyond `i64` saturate instead of
/// failing, so an oversized limit still clamps to the maximum.
fn parse_saturating(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

#[async_trait]
impl PolicyUnit for LimitOffset {
    fn category(&self) -> Category {
        Category::Pagination
    }

    fn name(&self) -> &str {
        "LimitOffset"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let page = self.parse(ctx)?;
        ctx.insert(self.state_key.clone(), page);
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        Some(
            Descriptor::new()
                .with_parameter(json!({
                    "name": "limit",
                    "in": "query",
                    "required": false,
                    "schema": {
                        "type": "integer",
                        "default": self.default_limit,
                        "maximum": self.max_limit,
                    },
                    "description": format!(
                        "Max items to return (default: {}, max: {})",
                        self.default_limit, self.max_limit
                    ),
                }))
                .with_parameter(json!({
                    "name": "offset",
                    "in": "query",
                    "required": false,
                    "schema": { "type": "integer", "default": 0, "minimum": 0 },
                    "description": "Number of items to skip",
                }))
                .with_response_description(400, "Invalid pagination parameters"),
        )
    }
}
