//! Permission units: authenticated principal, permission, role.

use async_trait::async_trait;
use serde_json::Value;

use flowgate_core::error::{Abort, UnitError};
use flowgate_core::{Category, Descriptor, PolicyUnit, Principal, RequestContext};

/// Whether `principal[field]` is an array containing `wanted`.
fn principal_has(principal: Option<&Principal>, field: &str, wanted: &str) -> bool {
    principal
        .and_then(|p| p.get(field))
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(wanted)))
}

/// Requires an authenticated principal.
#[derive(Debug, Default, Clone, Copy)]
pub struct Authenticated;

#[async_trait]
impl PolicyUnit for Authenticated {
    fn category(&self) -> Category {
        Category::Permission
    }

    fn name(&self) -> &str {
        "Authenticated"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        if ctx.principal().is_none() {
            return Err(Abort::permission_denied().into());
        }
        Ok(())
    }
}

/// Requires `permission` in the principal's `permissions` array.
#[derive(Debug, Clone)]
pub struct HasPermission {
    permission: String,
}

impl HasPermission {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

#[async_trait]
impl PolicyUnit for HasPermission {
    fn category(&self) -> Category {
        Category::Permission
    }

    fn name(&self) -> &str {
        "HasPermission"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        if !principal_has(ctx.principal(), "permissions", &self.permission) {
            return Err(Abort::permission_denied().into());
        }
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        Some(
            Descriptor::new()
                .with_response_description(403, "Permission denied")
                .with_extension("x-permissions", vec![Value::from(self.permission.clone())]),
        )
    }
}

/// Requires `role` in the principal's `roles` array.
#[derive(Debug, Clone)]
pub struct HasRole {
    role: String,
}

impl HasRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

#[async_trait]
impl PolicyUnit for HasRole {
    fn category(&self) -> Category {
        Category::Permission
    }

    fn name(&self) -> &str {
        "HasRole"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        if !principal_has(ctx.principal(), "roles", &self.role) {
            return Err(Abort::permission_denied().into());
        }
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        Some(
            Descriptor::new()
                .with_response_description(403, "Permission denied")
                .with_extension("x-roles", vec![Value::from(self.role.clone())]),
        )
    }
}
