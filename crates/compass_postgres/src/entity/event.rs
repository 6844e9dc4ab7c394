use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::bundle_reference::pages_per_bundle;
use compass_core::model::{BundleReference, EventDefinition, EventDefinitionPage};
use compass_core::ports::EventRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{BaseRow, VersionRow};
use crate::repo::{Condition, Creator, Deleter, Entity, Lister, OrderBy, SingleGetter, SqlArg};

pub(crate) const TABLE: &str = "event_api_definitions";

const COLUMNS: &[&str] = &[
    "id",
    "app_id",
    "app_template_version_id",
    "package_id",
    "name",
    "description",
    "group_name",
    "ord_id",
    "short_description",
    "tags",
    "visibility",
    "version_value",
    "version_deprecated",
    "version_deprecated_since",
    "version_for_removal",
    "resource_hash",
    "ready",
    "created_at",
    "updated_at",
    "deleted_at",
    "error",
];

const CREATOR: Creator = Creator::new(ResourceType::EventDefinition, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::EventDefinition, TABLE, COLUMNS);
const LISTER: Lister = Lister::new(ResourceType::EventDefinition, TABLE, COLUMNS);
const DELETER: Deleter = Deleter::new(ResourceType::EventDefinition, TABLE);

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventDefinitionRow {
    pub id: Uuid,
    pub app_id: Option<Uuid>,
    pub app_template_version_id: Option<Uuid>,
    pub package_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group_name: Option<String>,
    pub ord_id: Option<String>,
    pub short_description: Option<String>,
    pub tags: Option<JsonValue>,
    pub visibility: Option<String>,
    #[sqlx(flatten)]
    pub version: VersionRow,
    pub resource_hash: Option<String>,
    #[sqlx(flatten)]
    pub base: BaseRow,
}

impl From<&EventDefinition> for EventDefinitionRow {
    fn from(event: &EventDefinition) -> Self {
        Self {
            id: event.id,
            app_id: event.application_id,
            app_template_version_id: event.application_template_version_id,
            package_id: event.package_id.clone(),
            name: event.name.clone(),
            description: event.description.clone(),
            group_name: event.group.clone(),
            ord_id: event.ord_id.clone(),
            short_description: event.short_description.clone(),
            tags: event.tags.clone(),
            visibility: event.visibility.clone(),
            version: VersionRow::from(event.version.as_ref()),
            resource_hash: event.resource_hash.clone(),
            base: BaseRow::from(&event.base),
        }
    }
}

impl From<EventDefinitionRow> for EventDefinition {
    fn from(row: EventDefinitionRow) -> Self {
        Self {
            id: row.id,
            application_id: row.app_id,
            application_template_version_id: row.app_template_version_id,
            package_id: row.package_id,
            name: row.name,
            description: row.description,
            group: row.group_name,
            ord_id: row.ord_id,
            short_description: row.short_description,
            tags: row.tags,
            visibility: row.visibility,
            version: row.version.into(),
            resource_hash: row.resource_hash,
            base: row.base.into(),
        }
    }
}

impl Entity for EventDefinitionRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "app_id" => Some(self.app_id.into()),
            "app_template_version_id" => Some(self.app_template_version_id.into()),
            "package_id" => Some(self.package_id.clone().into()),
            "name" => Some(self.name.as_str().into()),
            "description" => Some(self.description.clone().into()),
            "group_name" => Some(self.group_name.clone().into()),
            "ord_id" => Some(self.ord_id.clone().into()),
            "short_description" => Some(self.short_description.clone().into()),
            "tags" => Some(self.tags.clone().into()),
            "visibility" => Some(self.visibility.clone().into()),
            "resource_hash" => Some(self.resource_hash.clone().into()),
            other => self.version.value(other).or_else(|| self.base.value(other)),
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        self.app_id.map(|app| (ResourceType::Application, app))
    }
}

pub struct PgEventRepository;

#[async_trait]
impl EventRepository<PgConnection> for PgEventRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &EventDefinition) -> Result<()> {
        if item.application_id.is_none() {
            return Err(CompassError::InvalidData(
                "event definition must belong to an application".into(),
            ));
        }
        debug!(id = %item.id, "creating event definition");
        CREATOR.create(conn, tenant, &EventDefinitionRow::from(item)).await
    }

    async fn create_global(&self, conn: &mut PgConnection, item: &EventDefinition) -> Result<()> {
        CREATOR.create_global(conn, &EventDefinitionRow::from(item)).await
    }

    async fn get_by_id(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<EventDefinition> {
        let row: EventDefinitionRow = GETTER.get(conn, tenant, &[Condition::equal("id", id)], &[]).await?;
        Ok(row.into())
    }

    async fn list_by_bundle_ids(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        bundle_ids: &[Uuid],
        bundle_refs: &[BundleReference],
        total_counts: &HashMap<Uuid, i64>,
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<EventDefinitionPage>> {
        let ids = bundle_refs.iter().filter_map(|r| r.object_id).collect::<Vec<_>>();
        let events = if ids.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<EventDefinitionRow> = LISTER
                .list(conn, tenant, &[Condition::in_values("id", ids)], &[OrderBy::asc("id")])
                .await?;
            rows.into_iter().map(EventDefinition::from).collect::<Vec<_>>()
        };

        let pages = pages_per_bundle(bundle_ids, bundle_refs, total_counts, &events, |e| e.id, page_size, cursor)?;
        Ok(pages
            .into_iter()
            .map(|(data, page_info, total_count)| EventDefinitionPage {
                data,
                page_info,
                total_count,
            })
            .collect())
    }

    async fn delete(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<()> {
        DELETER.delete_one(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn delete_global(&self, conn: &mut PgConnection, id: Uuid) -> Result<()> {
        DELETER.delete_one_global(conn, &[Condition::equal("id", id)]).await
    }
}
