use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;

use flowgate_core::error::{FlowError, Result, UnitError};
use flowgate_core::{PolicyUnit, Principal, RequestContext, SharedUnit, ThrottleBackend};

use crate::config::schema::UnitSpec;
use crate::units::{
    credential_fn, feature_fn, key_fn, AllowAnonymous, ApiKeyAuthentication, Authenticated,
    CookieAuthentication, CredentialCallback, FeatureChecker, FeatureEnabled, HasPermission,
    HasRole, JwtAuthentication, KeyFn, LimitOffset, QueryFilter, RateLimit,
};

/// Named callbacks, backends and custom units that configuration refers to.
///
/// Register everything at startup, then compile the route table once.
#[derive(Default)]
pub struct Registry {
    credentials: DashMap<String, CredentialCallback>,
    feature_checkers: DashMap<String, FeatureChecker>,
    key_fns: DashMap<String, KeyFn>,
    backends: DashMap<String, Arc<dyn ThrottleBackend>>,
    units: DashMap<String, SharedUnit>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential callback used by `jwt` (decoder), `cookie` (lookup) and
    /// `api_key` (validator) units.
    pub fn register_credential(&self, name: impl Into<String>, callback: CredentialCallback) {
        self.credentials.insert(name.into(), callback);
    }

    pub fn register_credential_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Principal, UnitError>> + Send + 'static,
    {
        self.register_credential(name, credential_fn(f));
    }

    pub fn register_feature_checker(&self, name: impl Into<String>, checker: FeatureChecker) {
        self.feature_checkers.insert(name.into(), checker);
    }

    pub fn register_feature_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<bool, UnitError>> + Send + 'static,
    {
        self.register_feature_checker(name, feature_fn(f));
    }

    pub fn register_key<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        self.key_fns.insert(name.into(), key_fn(f));
    }

    pub fn register_backend(&self, name: impl Into<String>, backend: Arc<dyn ThrottleBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn register_unit<U>(&self, name: impl Into<String>, unit: U)
    where
        U: PolicyUnit + 'static,
    {
        self.units.insert(name.into(), Arc::new(unit));
    }

    pub fn registered_units(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn credential(&self, name: &str) -> Result<CredentialCallback> {
        self.credentials
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| FlowError::InvalidConfig(format!("unknown credential callback: {name}")))
    }

    /// Instantiate the unit a config entry describes.
    pub fn build(&self, spec: &UnitSpec) -> Result<SharedUnit> {
        let unit: SharedUnit = match spec {
            UnitSpec::Jwt {
                decoder,
                scheme,
                header,
            } => Arc::new(
                JwtAuthentication::from_callback(self.credential(decoder)?)
                    .with_scheme(scheme.clone())
                    .with_header(header.clone()),
            ),
            UnitSpec::Cookie {
                lookup,
                cookie_name,
            } => Arc::new(
                CookieAuthentication::from_callback(self.credential(lookup)?)
                    .with_cookie_name(cookie_name.clone()),
            ),
            UnitSpec::ApiKey { validator, header } => Arc::new(
                ApiKeyAuthentication::from_callback(self.credential(validator)?)
                    .with_header(header.clone()),
            ),
            UnitSpec::AllowAnonymous {} => Arc::new(AllowAnonymous),
            UnitSpec::Authenticated {} => Arc::new(Authenticated),
            UnitSpec::HasPermission { permission } => {
                Arc::new(HasPermission::new(permission.clone()))
            }
            UnitSpec::HasRole { role } => Arc::new(HasRole::new(role.clone())),
            UnitSpec::FeatureEnabled { feature, checker } => {
                let mut unit = FeatureEnabled::new(feature.clone());
                if let Some(name) = checker {
                    let checker = self
                        .feature_checkers
                        .get(name)
                        .map(|r| r.value().clone())
                        .ok_or_else(|| {
                            FlowError::InvalidConfig(format!("unknown feature checker: {name}"))
                        })?;
                    unit = unit.with_shared_checker(checker);
                }
                Arc::new(unit)
            }
            UnitSpec::RateLimit {
                rate,
                window_seconds,
                key,
                backend,
            } => {
                let mut unit = RateLimit::new(*rate, *window_seconds);
                if let Some(name) = key {
                    let f = self
                        .key_fns
                        .get(name)
                        .map(|r| r.value().clone())
                        .ok_or_else(|| {
                            FlowError::InvalidConfig(format!("unknown rate limit key: {name}"))
                        })?;
                    unit = unit.with_shared_key(f);
                }
                if let Some(name) = backend {
                    let b = self
                        .backends
                        .get(name)
                        .map(|r| Arc::clone(r.value()))
                        .ok_or_else(|| {
                            FlowError::InvalidConfig(format!("unknown throttle backend: {name}"))
                        })?;
                    unit = unit.with_backend(b);
                }
                Arc::new(unit)
            }
            UnitSpec::QueryFilter { fields, state_key } => {
                Arc::new(QueryFilter::new(fields.iter().cloned()).with_state_key(state_key.clone()))
            }
            UnitSpec::LimitOffset {
                max_limit,
                default_limit,
                state_key,
            } => Arc::new(
                LimitOffset::new()
                    .with_max_limit(*max_limit)
                    .with_default_limit(*default_limit)
                    .with_state_key(state_key.clone()),
            ),
            UnitSpec::Custom { name } => self
                .units
                .get(name)
                .map(|r| Arc::clone(r.value()))
                .ok_or_else(|| FlowError::InvalidConfig(format!("unknown custom unit: {name}")))?,
        };
        Ok(unit)
    }
}
