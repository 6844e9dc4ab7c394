//! Port implementations over `PgConnection`, one module per table.
//!
//! Every module follows the same shape: a `sqlx::FromRow` row type, the
//! conversions between row and model, an [`Entity`](crate::repo::Entity)
//! impl exposing column values to the builders, and a `Pg*Repository`
//! composed from statically configured builders.

pub mod api;
pub mod application;
pub mod bundle;
pub mod bundle_reference;
pub mod destination;
pub mod entity_type_mapping;
pub mod event;
pub mod label;
pub mod spec;
pub mod tenant;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use compass_core::error::{CompassError, Result};
use compass_core::model::{BaseEntity, Version};
use compass_core::service::Repositories;

use crate::repo::SqlArg;

pub use api::PgApiRepository;
pub use application::PgApplicationRepository;
pub use bundle::PgBundleRepository;
pub use bundle_reference::PgBundleReferenceRepository;
pub use destination::PgDestinationRepository;
pub use entity_type_mapping::PgEntityTypeMappingRepository;
pub use event::PgEventRepository;
pub use label::PgLabelRepository;
pub use spec::PgSpecRepository;
pub use tenant::PgTenantRepository;

/// Every port backed by Postgres.
pub fn repositories() -> Repositories<PgConnection> {
    Repositories {
        applications: Arc::new(PgApplicationRepository),
        bundles: Arc::new(PgBundleRepository),
        apis: Arc::new(PgApiRepository),
        events: Arc::new(PgEventRepository),
        bundle_references: Arc::new(PgBundleReferenceRepository),
        specs: Arc::new(PgSpecRepository),
        entity_type_mappings: Arc::new(PgEntityTypeMappingRepository),
        destinations: Arc::new(PgDestinationRepository),
        labels: Arc::new(PgLabelRepository),
        tenants: Arc::new(PgTenantRepository),
    }
}

// ── Shared column groups ──────────────────────────────────────

/// Audit columns carried by provisioned resources.
#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow)]
pub struct BaseRow {
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl BaseRow {
    pub(crate) fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "ready" => Some(self.ready.into()),
            "created_at" => Some(self.created_at.into()),
            "updated_at" => Some(self.updated_at.into()),
            "deleted_at" => Some(self.deleted_at.into()),
            "error" => Some(self.error.clone().into()),
            _ => None,
        }
    }
}

impl From<&BaseEntity> for BaseRow {
    fn from(base: &BaseEntity) -> Self {
        Self {
            ready: base.ready,
            created_at: base.created_at,
            updated_at: base.updated_at,
            deleted_at: base.deleted_at,
            error: base.error.clone(),
        }
    }
}

impl From<BaseRow> for BaseEntity {
    fn from(row: BaseRow) -> Self {
        Self {
            ready: row.ready,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            error: row.error,
        }
    }
}

/// Flattened [`Version`]; `version_value` being `NULL` means no version.
#[derive(Debug, Clone, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct VersionRow {
    pub version_value: Option<String>,
    pub version_deprecated: Option<bool>,
    pub version_deprecated_since: Option<String>,
    pub version_for_removal: Option<bool>,
}

impl VersionRow {
    pub(crate) fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "version_value" => Some(self.version_value.clone().into()),
            "version_deprecated" => Some(self.version_deprecated.into()),
            "version_deprecated_since" => Some(self.version_deprecated_since.clone().into()),
            "version_for_removal" => Some(self.version_for_removal.into()),
            _ => None,
        }
    }
}

impl From<Option<&Version>> for VersionRow {
    fn from(version: Option<&Version>) -> Self {
        match version {
            Some(v) => Self {
                version_value: Some(v.value.clone()),
                version_deprecated: v.deprecated,
                version_deprecated_since: v.deprecated_since.clone(),
                version_for_removal: v.for_removal,
            },
            None => Self::default(),
        }
    }
}

impl From<VersionRow> for Option<Version> {
    fn from(row: VersionRow) -> Self {
        row.version_value.map(|value| Version {
            value,
            deprecated: row.version_deprecated,
            deprecated_since: row.version_deprecated_since,
            for_removal: row.version_for_removal,
        })
    }
}

/// Parses an enum stored as text, failing loudly on unknown values.
pub(crate) fn parse_column<T: FromStr>(column: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| CompassError::internal(format!("unexpected value {raw:?} in column {column}")))
}
