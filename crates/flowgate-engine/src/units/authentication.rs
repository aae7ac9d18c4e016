//! Authentication units: bearer token, session cookie, API key.

use std::future::Future;

use async_trait::async_trait;
use serde_json::json;

use flowgate_core::error::{Abort, AbortKind, UnitError};
use flowgate_core::{Category, Descriptor, PolicyUnit, Principal, RequestContext};

use super::{credential_fn, CredentialCallback};

const AUTH_FAILED: &str = "Authentication failed";

/// Run a credential callback. An authentication abort passes through; any
/// other failure collapses into a plain authentication abort.
async fn authenticate(
    callback: &CredentialCallback,
    raw: &str,
    unit: &str,
) -> Result<Principal, UnitError> {
    match callback(raw.to_string()).await {
        Ok(principal) => Ok(principal),
        Err(UnitError::Abort(a)) if a.kind() == AbortKind::AuthenticationFailed => Err(a.into()),
        Err(e) => {
            tracing::debug!(unit, error = %e, "credential rejected");
            Err(Abort::authentication_failed().into())
        }
    }
}

fn auth_failed_response(d: Descriptor) -> Descriptor {
    d.with_response_description(401, AUTH_FAILED)
}

/// Extracts `<scheme> <token>` from a header and decodes it via callback.
pub struct JwtAuthentication {
    decode: CredentialCallback,
    scheme: String,
    header: String,
}

impl JwtAuthentication {
    pub fn new<F, Fut>(decode: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Principal, UnitError>> + Send + 'static,
    {
        Self::from_callback(credential_fn(decode))
    }

    pub fn from_callback(decode: CredentialCallback) -> Self {
        Self {
            decode,
            scheme: "Bearer".into(),
            header: "Authorization".into(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl PolicyUnit for JwtAuthentication {
    fn category(&self) -> Category {
        Category::Authentication
    }

    fn name(&self) -> &str {
        "JwtAuthentication"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let value = ctx
            .request()
            .header(&self.header)
            .filter(|v| !v.is_empty())
            .ok_or_else(Abort::authentication_failed)?;

        let token = match value.split_once(' ') {
            Some((scheme, token)) if scheme == self.scheme => token.to_string(),
            _ => return Err(Abort::authentication_failed().into()),
        };

        let principal = authenticate(&self.decode, &token, self.name()).await?;
        ctx.set_principal(principal);
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        let d = Descriptor::new()
            .with_security_scheme(
                self.scheme.clone(),
                json!({
                    "type": "http",
                    "scheme": self.scheme.to_lowercase(),
                    "bearerFormat": "JWT",
                }),
            )
            .with_security(self.scheme.clone(), Vec::new());
        Some(auth_failed_response(d))
    }
}

/// Reads a session cookie and looks the principal up via callback.
pub struct CookieAuthentication {
    lookup: CredentialCallback,
    cookie_name: String,
}

impl CookieAuthentication {
    pub fn new<F, Fut>(lookup: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Principal, UnitError>> + Send + 'static,
    {
        Self::from_callback(credential_fn(lookup))
    }

    pub fn from_callback(lookup: CredentialCallback) -> Self {
        Self {
            lookup,
            cookie_name: "session".into(),
        }
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }
}

#[async_trait]
impl PolicyUnit for CookieAuthentication {
    fn category(&self) -> Category {
        Category::Authentication
    }

    fn name(&self) -> &str {
        "CookieAuthentication"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let cookie = ctx
            .request()
            .cookie(&self.cookie_name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(Abort::authentication_failed)?;

        let principal = authenticate(&self.lookup, &cookie, self.name()).await?;
        ctx.set_principal(principal);
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        let d = Descriptor::new()
            .with_security_scheme(
                "CookieAuth",
                json!({ "type": "apiKey", "in": "cookie", "name": self.cookie_name }),
            )
            .with_security("CookieAuth", Vec::new());
        Some(auth_failed_response(d))
    }
}

/// Reads an API key header and validates it via callback.
pub struct ApiKeyAuthentication {
    validate: CredentialCallback,
    header: String,
}

impl ApiKeyAuthentication {
    pub fn new<F, Fut>(validate: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Principal, UnitError>> + Send + 'static,
    {
        Self::from_callback(credential_fn(validate))
    }

    pub fn from_callback(validate: CredentialCallback) -> Self {
        Self {
            validate,
            header: "X-API-Key".into(),
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl PolicyUnit for ApiKeyAuthentication {
    fn category(&self) -> Category {
        Category::Authentication
    }

    fn name(&self) -> &str {
        "ApiKeyAuthentication"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let key = ctx
            .request()
            .header(&self.header)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(Abort::authentication_failed)?;

        let principal = authenticate(&self.validate, &key, self.name()).await?;
        ctx.set_principal(principal);
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        let d = Descriptor::new()
            .with_security_scheme(
                "ApiKeyAuth",
                json!({ "type": "apiKey", "in": "header", "name": self.header }),
            )
            .with_security("ApiKeyAuth", Vec::new());
        Some(auth_failed_response(d))
    }
}

/// No-op authentication. Meant for `Override` at scopes that must stay public.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAnonymous;

#[async_trait]
impl PolicyUnit for AllowAnonymous {
    fn category(&self) -> Category {
        Category::Authentication
    }

    fn name(&self) -> &str {
        "AllowAnonymous"
    }

    async fn check(&self, _ctx: &mut RequestContext) -> Result<(), UnitError> {
        Ok(())
    }
}
