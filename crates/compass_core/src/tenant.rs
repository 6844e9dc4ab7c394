//! Explicit request scope carrying the caller's tenant.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CompassError, Result};

/// Internal tenant ID (primary key of `business_tenant_mappings`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Per-request context threaded through every service call.
///
/// Built once at the transport boundary; services never look the tenant up
/// anywhere else.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    tenant: Option<TenantId>,
    external_tenant: Option<String>,
}

impl RequestScope {
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
            external_tenant: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_external_tenant(mut self, external: impl Into<String>) -> Self {
        self.external_tenant = Some(external.into());
        self
    }

    pub fn tenant(&self) -> Result<TenantId> {
        self.tenant.ok_or(CompassError::TenantRequired)
    }

    pub fn external_tenant(&self) -> Option<&str> {
        self.external_tenant.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_scope_has_no_tenant() {
        let err = RequestScope::anonymous().tenant().unwrap_err();
        assert!(matches!(err, CompassError::TenantRequired));
    }

    #[test]
    fn tenant_scope_returns_tenant() {
        let id = TenantId(Uuid::new_v4());
        let scope = RequestScope::for_tenant(id).with_external_tenant("ext-1");
        assert_eq!(scope.tenant().unwrap(), id);
        assert_eq!(scope.external_tenant(), Some("ext-1"));
    }
}
