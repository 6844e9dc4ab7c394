use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::bundle_reference::pages_per_bundle;
use compass_core::model::{ApiDefinition, ApiDefinitionPage, BundleReference};
use compass_core::ports::ApiRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{BaseRow, VersionRow};
use crate::repo::{
    Condition, Creator, Deleter, Entity, ExistQuerier, Lister, OrderBy, SingleGetter, SqlArg, Updater,
};

pub(crate) const TABLE: &str = "api_definitions";

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
    "api_protocol",
    "tags",
    "countries",
    "links",
    "labels",
    "target_urls",
    "visibility",
    "disabled",
    "release_status",
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

const UPDATABLE_COLUMNS: &[&str] = &[
    "package_id",
    "name",
    "description",
    "group_name",
    "ord_id",
    "short_description",
    "api_protocol",
    "tags",
    "countries",
    "links",
    "labels",
    "target_urls",
    "visibility",
    "disabled",
    "release_status",
    "version_value",
    "version_deprecated",
    "version_deprecated_since",
    "version_for_removal",
    "resource_hash",
    "ready",
    "updated_at",
    "deleted_at",
    "error",
];

const CREATOR: Creator = Creator::new(ResourceType::Api, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Api, TABLE, COLUMNS);
const EXISTS: ExistQuerier = ExistQuerier::new(ResourceType::Api, TABLE);
const LISTER: Lister = Lister::new(ResourceType::Api, TABLE, COLUMNS);
const UPDATER: Updater = Updater::new(ResourceType::Api, TABLE, UPDATABLE_COLUMNS, &["id"]);
const DELETER: Deleter = Deleter::new(ResourceType::Api, TABLE);

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ApiDefinitionRow {
    pub id: Uuid,
    pub app_id: Option<Uuid>,
    pub app_template_version_id: Option<Uuid>,
    pub package_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group_name: Option<String>,
    pub ord_id: Option<String>,
    pub short_description: Option<String>,
    pub api_protocol: Option<String>,
    pub tags: Option<JsonValue>,
    pub countries: Option<JsonValue>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    /// JSON array of strings.
    pub target_urls: Option<JsonValue>,
    pub visibility: Option<String>,
    pub disabled: Option<bool>,
    pub release_status: Option<String>,
    #[sqlx(flatten)]
    pub version: VersionRow,
    pub resource_hash: Option<String>,
    #[sqlx(flatten)]
    pub base: BaseRow,
}

impl From<&ApiDefinition> for ApiDefinitionRow {
    fn from(api: &ApiDefinition) -> Self {
        Self {
            id: api.id,
            app_id: api.application_id,
            app_template_version_id: api.application_template_version_id,
            package_id: api.package_id.clone(),
            name: api.name.clone(),
            description: api.description.clone(),
            group_name: api.group.clone(),
            ord_id: api.ord_id.clone(),
            short_description: api.short_description.clone(),
            api_protocol: api.api_protocol.clone(),
            tags: api.tags.clone(),
            countries: api.countries.clone(),
            links: api.links.clone(),
            labels: api.labels.clone(),
            target_urls: Some(JsonValue::from(api.target_urls.clone())),
            visibility: api.visibility.clone(),
            disabled: api.disabled,
            release_status: api.release_status.clone(),
            version: VersionRow::from(api.version.as_ref()),
            resource_hash: api.resource_hash.clone(),
            base: BaseRow::from(&api.base),
        }
    }
}

impl TryFrom<ApiDefinitionRow> for ApiDefinition {
    type Error = CompassError;

    fn try_from(row: ApiDefinitionRow) -> Result<Self> {
        let target_urls = match row.target_urls {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw).map_err(|e| {
                CompassError::internal(format!("invalid target_urls of api definition {}: {e}", row.id))
            })?,
        };
        Ok(Self {
            id: row.id,
            application_id: row.app_id,
            application_template_version_id: row.app_template_version_id,
            package_id: row.package_id,
            name: row.name,
            description: row.description,
            group: row.group_name,
            ord_id: row.ord_id,
            short_description: row.short_description,
            api_protocol: row.api_protocol,
            tags: row.tags,
            countries: row.countries,
            links: row.links,
            labels: row.labels,
            target_urls,
            visibility: row.visibility,
            disabled: row.disabled,
            release_status: row.release_status,
            version: row.version.into(),
            resource_hash: row.resource_hash,
            base: row.base.into(),
        })
    }
}

impl Entity for ApiDefinitionRow {
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
            "api_protocol" => Some(self.api_protocol.clone().into()),
            "tags" => Some(self.tags.clone().into()),
            "countries" => Some(self.countries.clone().into()),
            "links" => Some(self.links.clone().into()),
            "labels" => Some(self.labels.clone().into()),
            "target_urls" => Some(self.target_urls.clone().into()),
            "visibility" => Some(self.visibility.clone().into()),
            "disabled" => Some(self.disabled.into()),
            "release_status" => Some(self.release_status.clone().into()),
            "resource_hash" => Some(self.resource_hash.clone().into()),
            other => self.version.value(other).or_else(|| self.base.value(other)),
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        self.app_id.map(|app| (ResourceType::Application, app))
    }
}

pub(crate) fn into_models(rows: Vec<ApiDefinitionRow>) -> Result<Vec<ApiDefinition>> {
    rows.into_iter().map(ApiDefinition::try_from).collect()
}

/// IDs of the definitions `bundle_id` references.
fn referenced_by_bundle(bundle_id: Uuid) -> Condition {
    Condition::in_subquery(
        "id",
        "SELECT api_def_id FROM bundle_references WHERE bundle_id = ? AND api_def_id IS NOT NULL",
        vec![bundle_id.into()],
    )
}

pub struct PgApiRepository;

#[async_trait]
impl ApiRepository<PgConnection> for PgApiRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &ApiDefinition) -> Result<()> {
        if item.application_id.is_none() {
            return Err(CompassError::InvalidData(
                "api definition must belong to an application".into(),
            ));
        }
        debug!(id = %item.id, "creating api definition");
        CREATOR.create(conn, tenant, &ApiDefinitionRow::from(item)).await
    }

    async fn create_global(&self, conn: &mut PgConnection, item: &ApiDefinition) -> Result<()> {
        debug!(id = %item.id, "creating api definition without tenant");
        CREATOR.create_global(conn, &ApiDefinitionRow::from(item)).await
    }

    async fn get_by_id(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<ApiDefinition> {
        let row: ApiDefinitionRow = GETTER.get(conn, tenant, &[Condition::equal("id", id)], &[]).await?;
        row.try_into()
    }

    async fn get_by_id_global(&self, conn: &mut PgConnection, id: Uuid) -> Result<ApiDefinition> {
        let row: ApiDefinitionRow = GETTER.get_global(conn, &[Condition::equal("id", id)], &[]).await?;
        row.try_into()
    }

    async fn get_for_bundle(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        id: Uuid,
        bundle_id: Uuid,
    ) -> Result<ApiDefinition> {
        let conds = [Condition::equal("id", id), referenced_by_bundle(bundle_id)];
        let row: ApiDefinitionRow = GETTER.get(conn, tenant, &conds, &[]).await?;
        row.try_into()
    }

    async fn exists(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<bool> {
        EXISTS.exists(conn, tenant, &[Condition::equal("id", id)]).await
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
    ) -> Result<Vec<ApiDefinitionPage>> {
        let ids = bundle_refs.iter().filter_map(|r| r.object_id).collect::<Vec<_>>();
        let apis = if ids.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<ApiDefinitionRow> = LISTER
                .list(conn, tenant, &[Condition::in_values("id", ids)], &[OrderBy::asc("id")])
                .await?;
            into_models(rows)?
        };

        let pages = pages_per_bundle(bundle_ids, bundle_refs, total_counts, &apis, |a| a.id, page_size, cursor)?;
        Ok(pages
            .into_iter()
            .map(|(data, page_info, total_count)| ApiDefinitionPage {
                data,
                page_info,
                total_count,
            })
            .collect())
    }

    async fn list_by_application_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        let rows: Vec<ApiDefinitionRow> = LISTER
            .list(conn, tenant, &[Condition::equal("app_id", app_id)], &[OrderBy::asc("id")])
            .await?;
        into_models(rows)
    }

    async fn list_by_application_template_version_id(
        &self,
        conn: &mut PgConnection,
        app_template_version_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        let conds = [Condition::equal("app_template_version_id", app_template_version_id)];
        let rows: Vec<ApiDefinitionRow> = LISTER.list_global(conn, &conds, &[OrderBy::asc("id")]).await?;
        into_models(rows)
    }

    async fn update(&self, conn: &mut PgConnection, tenant: TenantId, item: &ApiDefinition) -> Result<()> {
        UPDATER.update_single(conn, tenant, &ApiDefinitionRow::from(item)).await
    }

    async fn update_global(&self, conn: &mut PgConnection, item: &ApiDefinition) -> Result<()> {
        UPDATER.update_single_global(conn, &ApiDefinitionRow::from(item)).await
    }

    async fn delete(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<()> {
        DELETER.delete_one(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn delete_global(&self, conn: &mut PgConnection, id: Uuid) -> Result<()> {
        DELETER.delete_one_global(conn, &[Condition::equal("id", id)]).await
    }

    async fn delete_all_by_bundle_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        bundle_id: Uuid,
    ) -> Result<()> {
        let deleted = DELETER
            .delete_many(conn, tenant, &[referenced_by_bundle(bundle_id)])
            .await?;
        debug!(%bundle_id, deleted, "deleted api definitions of bundle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::repo::SqlArgs;
    use compass_core::model::{ApiDefinitionInput, Version};

    fn api(owner: ResourceType) -> ApiDefinition {
        ApiDefinitionInput {
            name: "Foo".into(),
            group: Some("g".into()),
            target_urls: vec!["https://a.example".into(), "https://b.example".into()],
            version: Some(Version {
                value: "v1".into(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .to_api_definition(Uuid::from_u128(3), owner, Uuid::from_u128(1), None, 7, Utc::now())
    }

    #[test]
    fn row_conversion_keeps_every_field() {
        let api = api(ResourceType::Application);
        let row = ApiDefinitionRow::from(&api);
        assert_eq!(row.target_urls, Some(json!(["https://a.example", "https://b.example"])));
        assert_eq!(ApiDefinition::try_from(row).unwrap(), api);
    }

    #[test]
    fn template_version_definition_has_no_parent() {
        let row = ApiDefinitionRow::from(&api(ResourceType::ApplicationTemplateVersion));
        assert_eq!(row.parent(ResourceType::Api), None);
        assert_eq!(row.value("app_template_version_id"), Some(SqlArg::from(Uuid::from_u128(1))));
        for column in COLUMNS.iter().chain(UPDATABLE_COLUMNS) {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
    }

    #[test]
    fn malformed_target_urls_are_internal() {
        let mut row = ApiDefinitionRow::from(&api(ResourceType::Application));
        row.target_urls = Some(json!({"not": "a list"}));
        assert_eq!(ApiDefinition::try_from(row).unwrap_err().http_status(), 500);
    }

    #[test]
    fn bundle_membership_goes_through_references() {
        let mut args = SqlArgs::default();
        assert_eq!(
            referenced_by_bundle(Uuid::nil()).render(&mut args),
            "id IN (SELECT api_def_id FROM bundle_references WHERE bundle_id = $1 AND api_def_id IS NOT NULL)"
        );
    }
}
