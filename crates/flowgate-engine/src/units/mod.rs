//! Built-in policy units.
//!
//! Credential decoding, session lookup and feature checks are pluggable
//! callbacks; these units only sequence them and translate their failures into
//! the matching abort.

pub mod authentication;
pub mod features;
pub mod filters;
pub mod pagination;
pub mod permissions;
pub mod throttling;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use flowgate_core::error::UnitError;
use flowgate_core::{Principal, RequestContext};

pub use authentication::{
    AllowAnonymous, ApiKeyAuthentication, CookieAuthentication, JwtAuthentication,
};
pub use features::{FeatureEnabled, FeatureFlags, FEATURES_KEY};
pub use filters::{Filters, QueryFilter, FILTERS_KEY};
pub use pagination::{LimitOffset, Pagination, PAGINATION_KEY};
pub use permissions::{Authenticated, HasPermission, HasRole};
pub use throttling::{default_rate_limit_key, RateLimit};

/// Turns a raw credential (token, cookie value, API key) into a principal.
pub type CredentialCallback =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Principal, UnitError>> + Send + Sync>;

/// Answers whether a named feature is enabled.
pub type FeatureChecker =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<bool, UnitError>> + Send + Sync>;

/// Derives a rate-limit key from the request context.
pub type KeyFn = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

pub fn credential_fn<F, Fut>(f: F) -> CredentialCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Principal, UnitError>> + Send + 'static,
{
    Arc::new(move |raw| -> BoxFuture<'static, Result<Principal, UnitError>> { Box::pin(f(raw)) })
}

pub fn feature_fn<F, Fut>(f: F) -> FeatureChecker
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, UnitError>> + Send + 'static,
{
    Arc::new(move |name| -> BoxFuture<'static, Result<bool, UnitError>> { Box::pin(f(name)) })
}

pub fn key_fn<F>(f: F) -> KeyFn
where
    F: Fn(&RequestContext) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}
