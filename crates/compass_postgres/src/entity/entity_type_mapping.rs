use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::EntityTypeMapping;
use compass_core::pagination::Page;
use compass_core::ports::EntityTypeMappingRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::BaseRow;
use crate::repo::{
    Condition, Creator, Deleter, Entity, ExistQuerier, Lister, OrderBy, PageableQuerier, SingleGetter, SqlArg,
    Updater,
};

pub(crate) const TABLE: &str = "entity_type_mappings";

const COLUMNS: &[&str] = &[
    "id",
    "api_definition_id",
    "event_definition_id",
    "api_model_selectors",
    "entity_type_targets",
    "ready",
    "created_at",
    "updated_at",
    "deleted_at",
    "error",
];

const UPDATABLE_COLUMNS: &[&str] = &[
    "api_model_selectors",
    "entity_type_targets",
    "ready",
    "updated_at",
    "deleted_at",
    "error",
];

const CREATOR: Creator = Creator::new(ResourceType::EntityTypeMapping, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::EntityTypeMapping, TABLE, COLUMNS);
const EXISTS: ExistQuerier = ExistQuerier::new(ResourceType::EntityTypeMapping, TABLE);
const LISTER: Lister = Lister::new(ResourceType::EntityTypeMapping, TABLE, COLUMNS);
const PAGER: PageableQuerier = PageableQuerier::new(ResourceType::EntityTypeMapping, TABLE, COLUMNS);
const UPDATER: Updater = Updater::new(ResourceType::EntityTypeMapping, TABLE, UPDATABLE_COLUMNS, &["id"]);
const DELETER: Deleter = Deleter::new(ResourceType::EntityTypeMapping, TABLE);

/// Column referencing a mapping's parent of type `resource_type`.
fn parent_column(resource_type: ResourceType) -> Result<&'static str> {
    match resource_type {
        ResourceType::Api => Ok("api_definition_id"),
        ResourceType::EventDefinition => Ok("event_definition_id"),
        other => Err(CompassError::InvalidData(format!(
            "entity type mappings cannot belong to resource type {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EntityTypeMappingRow {
    pub id: Uuid,
    pub api_definition_id: Option<Uuid>,
    pub event_definition_id: Option<Uuid>,
    pub api_model_selectors: Option<JsonValue>,
    pub entity_type_targets: Option<JsonValue>,
    #[sqlx(flatten)]
    pub base: BaseRow,
}

impl From<&EntityTypeMapping> for EntityTypeMappingRow {
    fn from(mapping: &EntityTypeMapping) -> Self {
        Self {
            id: mapping.id,
            api_definition_id: mapping.api_definition_id,
            event_definition_id: mapping.event_definition_id,
            api_model_selectors: mapping.api_model_selectors.clone(),
            entity_type_targets: mapping.entity_type_targets.clone(),
            base: BaseRow::from(&mapping.base),
        }
    }
}

impl From<EntityTypeMappingRow> for EntityTypeMapping {
    fn from(row: EntityTypeMappingRow) -> Self {
        Self {
            id: row.id,
            api_definition_id: row.api_definition_id,
            event_definition_id: row.event_definition_id,
            api_model_selectors: row.api_model_selectors,
            entity_type_targets: row.entity_type_targets,
            base: row.base.into(),
        }
    }
}

impl Entity for EntityTypeMappingRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "api_definition_id" => Some(self.api_definition_id.into()),
            "event_definition_id" => Some(self.event_definition_id.into()),
            "api_model_selectors" => Some(self.api_model_selectors.clone().into()),
            "entity_type_targets" => Some(self.entity_type_targets.clone().into()),
            other => self.base.value(other),
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        match (self.api_definition_id, self.event_definition_id) {
            (Some(api), _) => Some((ResourceType::Api, api)),
            (None, Some(event)) => Some((ResourceType::EventDefinition, event)),
            (None, None) => None,
        }
    }
}

fn into_models(rows: Vec<EntityTypeMappingRow>) -> Vec<EntityTypeMapping> {
    rows.into_iter().map(EntityTypeMapping::from).collect()
}

pub struct PgEntityTypeMappingRepository;

impl PgEntityTypeMappingRepository {
    /// First visible mapping of a parent, ordered by ID.
    async fn first_for_parent(
        conn: &mut PgConnection,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        let conds = [Condition::equal(parent_column(resource_type)?, resource_id)];
        let rows: Vec<EntityTypeMappingRow> = LISTER.list(conn, tenant, &conds, &[OrderBy::asc("id")]).await?;
        rows.into_iter()
            .next()
            .map(EntityTypeMapping::from)
            .ok_or_else(|| CompassError::not_found(ResourceType::EntityTypeMapping, resource_id))
    }

    async fn page_for_parent(
        conn: &mut PgConnection,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        let conds = [Condition::equal(parent_column(resource_type)?, resource_id)];
        let (rows, page, total): (Vec<EntityTypeMappingRow>, _, _) =
            PAGER.list(conn, tenant, page_size, cursor, "id", &conds).await?;
        Ok((into_models(rows), page, total))
    }
}

#[async_trait]
impl EntityTypeMappingRepository<PgConnection> for PgEntityTypeMappingRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        debug!(id = %item.id, parent = ?item.parent(), "creating entity type mapping");
        CREATOR.create(conn, tenant, &EntityTypeMappingRow::from(item)).await
    }

    async fn create_global(&self, conn: &mut PgConnection, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        CREATOR.create_global(conn, &EntityTypeMappingRow::from(item)).await
    }

    async fn get_by_id(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<EntityTypeMapping> {
        let row: EntityTypeMappingRow = GETTER.get(conn, tenant, &[Condition::equal("id", id)], &[]).await?;
        Ok(row.into())
    }

    async fn get_by_id_global(&self, conn: &mut PgConnection, id: Uuid) -> Result<EntityTypeMapping> {
        let row: EntityTypeMappingRow = GETTER.get_global(conn, &[Condition::equal("id", id)], &[]).await?;
        Ok(row.into())
    }

    async fn get_by_api_definition_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        api_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        Self::first_for_parent(conn, tenant, ResourceType::Api, api_id).await
    }

    async fn get_by_event_definition_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        event_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        Self::first_for_parent(conn, tenant, ResourceType::EventDefinition, event_id).await
    }

    async fn list_by_api_definition_id_page(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        api_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        Self::page_for_parent(conn, tenant, ResourceType::Api, api_id, page_size, cursor).await
    }

    async fn list_by_event_definition_id_page(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        event_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        Self::page_for_parent(conn, tenant, ResourceType::EventDefinition, event_id, page_size, cursor).await
    }

    async fn list_by_resource_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>> {
        let conds = [Condition::equal(parent_column(resource_type)?, resource_id)];
        let rows: Vec<EntityTypeMappingRow> = LISTER
            .list_for_update(conn, tenant, &conds, &[OrderBy::asc("id")])
            .await?;
        Ok(into_models(rows))
    }

    async fn list_by_resource_id_global(
        &self,
        conn: &mut PgConnection,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>> {
        let conds = [Condition::equal(parent_column(resource_type)?, resource_id)];
        let rows: Vec<EntityTypeMappingRow> = LISTER.list_global(conn, &conds, &[OrderBy::asc("id")]).await?;
        Ok(into_models(rows))
    }

    async fn update(&self, conn: &mut PgConnection, tenant: TenantId, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        UPDATER.update_single(conn, tenant, &EntityTypeMappingRow::from(item)).await
    }

    async fn update_global(&self, conn: &mut PgConnection, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        UPDATER.update_single_global(conn, &EntityTypeMappingRow::from(item)).await
    }

    async fn exists(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<bool> {
        EXISTS.exists(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn delete(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<()> {
        DELETER.delete_one(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn delete_global(&self, conn: &mut PgConnection, id: Uuid) -> Result<()> {
        DELETER.delete_one_global(conn, &[Condition::equal("id", id)]).await
    }
}
