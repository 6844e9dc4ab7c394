use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::Result;
use compass_core::model::{Bundle, DestinationInput};
use compass_core::ports::BundleRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::BaseRow;
use crate::repo::{
    Condition, Creator, Deleter, Entity, ExistQuerier, Lister, OrderBy, SingleGetter, SqlArg, Updater,
};

pub(crate) const TABLE: &str = "bundles";

const COLUMNS: &[&str] = &[
    "id",
    "app_id",
    "name",
    "description",
    "instance_auth_request_json_schema",
    "default_instance_auth",
    "ord_id",
    "local_tenant_id",
    "short_description",
    "links",
    "labels",
    "tags",
    "correlation_ids",
    "resource_hash",
    "ready",
    "created_at",
    "updated_at",
    "deleted_at",
    "error",
];

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "instance_auth_request_json_schema",
    "default_instance_auth",
    "ord_id",
    "local_tenant_id",
    "short_description",
    "links",
    "labels",
    "tags",
    "correlation_ids",
    "resource_hash",
    "ready",
    "updated_at",
    "deleted_at",
    "error",
];

const CREATOR: Creator = Creator::new(ResourceType::Bundle, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Bundle, TABLE, COLUMNS);
const EXISTS: ExistQuerier = ExistQuerier::new(ResourceType::Bundle, TABLE);
const LISTER: Lister = Lister::new(ResourceType::Bundle, TABLE, COLUMNS);
const UPDATER: Updater = Updater::new(ResourceType::Bundle, TABLE, UPDATABLE_COLUMNS, &["id"]);
const DELETER: Deleter = Deleter::new(ResourceType::Bundle, TABLE);

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BundleRow {
    pub id: Uuid,
    pub app_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_json_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
    pub ord_id: Option<String>,
    pub local_tenant_id: Option<String>,
    pub short_description: Option<String>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    pub tags: Option<JsonValue>,
    pub correlation_ids: Option<JsonValue>,
    pub resource_hash: Option<String>,
    #[sqlx(flatten)]
    pub base: BaseRow,
}

impl From<&Bundle> for BundleRow {
    fn from(bundle: &Bundle) -> Self {
        Self {
            id: bundle.id,
            app_id: bundle.application_id,
            name: bundle.name.clone(),
            description: bundle.description.clone(),
            instance_auth_request_json_schema: bundle.instance_auth_request_input_schema.clone(),
            default_instance_auth: bundle.default_instance_auth.clone(),
            ord_id: bundle.ord_id.clone(),
            local_tenant_id: bundle.local_tenant_id.clone(),
            short_description: bundle.short_description.clone(),
            links: bundle.links.clone(),
            labels: bundle.labels.clone(),
            tags: bundle.tags.clone(),
            correlation_ids: bundle.correlation_ids.clone(),
            resource_hash: bundle.resource_hash.clone(),
            base: BaseRow::from(&bundle.base),
        }
    }
}

impl From<BundleRow> for Bundle {
    fn from(row: BundleRow) -> Self {
        Self {
            id: row.id,
            application_id: row.app_id,
            name: row.name,
            description: row.description,
            instance_auth_request_input_schema: row.instance_auth_request_json_schema,
            default_instance_auth: row.default_instance_auth,
            ord_id: row.ord_id,
            local_tenant_id: row.local_tenant_id,
            short_description: row.short_description,
            links: row.links,
            labels: row.labels,
            tags: row.tags,
            correlation_ids: row.correlation_ids,
            resource_hash: row.resource_hash,
            base: row.base.into(),
        }
    }
}

impl Entity for BundleRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "app_id" => Some(self.app_id.into()),
            "name" => Some(self.name.as_str().into()),
            "description" => Some(self.description.clone().into()),
            "instance_auth_request_json_schema" => Some(self.instance_auth_request_json_schema.clone().into()),
            "default_instance_auth" => Some(self.default_instance_auth.clone().into()),
            "ord_id" => Some(self.ord_id.clone().into()),
            "local_tenant_id" => Some(self.local_tenant_id.clone().into()),
            "short_description" => Some(self.short_description.clone().into()),
            "links" => Some(self.links.clone().into()),
            "labels" => Some(self.labels.clone().into()),
            "tags" => Some(self.tags.clone().into()),
            "correlation_ids" => Some(self.correlation_ids.clone().into()),
            "resource_hash" => Some(self.resource_hash.clone().into()),
            other => self.base.value(other),
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        self.app_id.map(|app| (ResourceType::Application, app))
    }
}

/// Applications a destination points at: by local tenant ID when the
/// destination carries one, otherwise by base URL and name.
fn destination_system_condition(destination: &DestinationInput) -> Condition {
    if destination.x_system_tenant_id.is_empty() {
        Condition::in_subquery(
            "app_id",
            "SELECT id FROM applications WHERE base_url = ? AND name = ?",
            vec![
                destination.x_system_base_url.as_str().into(),
                destination.x_system_tenant_name.as_str().into(),
            ],
        )
    } else {
        Condition::in_subquery(
            "app_id",
            "SELECT id FROM applications WHERE local_tenant_id = ?",
            vec![destination.x_system_tenant_id.as_str().into()],
        )
    }
}

/// `correlation_ids` JSON array containing the destination's correlation ID.
fn correlation_id_condition(correlation_id: &str) -> Condition {
    Condition::in_subquery(
        "id",
        "SELECT id FROM bundles WHERE correlation_ids @> ?",
        vec![Some(json!([correlation_id])).into()],
    )
}

pub struct PgBundleRepository;

#[async_trait]
impl BundleRepository<PgConnection> for PgBundleRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &Bundle) -> Result<()> {
        debug!(id = %item.id, app_id = ?item.application_id, "creating bundle");
        CREATOR.create(conn, tenant, &BundleRow::from(item)).await
    }

    async fn get_by_id(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<Bundle> {
        let row: BundleRow = GETTER.get(conn, tenant, &[Condition::equal("id", id)], &[]).await?;
        Ok(row.into())
    }

    async fn exists(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<bool> {
        EXISTS.exists(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn list_by_application_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<Bundle>> {
        let rows: Vec<BundleRow> = LISTER
            .list(conn, tenant, &[Condition::equal("app_id", app_id)], &[OrderBy::asc("id")])
            .await?;
        Ok(rows.into_iter().map(Bundle::from).collect())
    }

    async fn list_by_destination(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        destination: &DestinationInput,
    ) -> Result<Vec<Bundle>> {
        let conds = [
            destination_system_condition(destination),
            correlation_id_condition(&destination.x_correlation_id),
        ];
        let rows: Vec<BundleRow> = LISTER.list(conn, tenant, &conds, &[OrderBy::asc("id")]).await?;
        Ok(rows.into_iter().map(Bundle::from).collect())
    }

    async fn update(&self, conn: &mut PgConnection, tenant: TenantId, item: &Bundle) -> Result<()> {
        UPDATER.update_single(conn, tenant, &BundleRow::from(item)).await
    }

    async fn delete(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<()> {
        DELETER.delete_one(conn, tenant, &[Condition::equal("id", id)]).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::repo::SqlArgs;
    use compass_core::model::BundleInput;

    fn bundle() -> Bundle {
        BundleInput {
            name: "b".into(),
            correlation_ids: Some(json!(["corr-1"])),
            ..Default::default()
        }
        .to_bundle(Uuid::from_u128(2), Uuid::from_u128(1), Some("17".into()), Utc::now())
    }

    #[test]
    fn row_conversion_keeps_every_field() {
        let bundle = bundle();
        assert_eq!(Bundle::from(BundleRow::from(&bundle)), bundle);
    }

    #[test]
    fn bundle_hangs_under_its_application() {
        let row = BundleRow::from(&bundle());
        assert_eq!(
            row.parent(ResourceType::Bundle),
            Some((ResourceType::Application, Uuid::from_u128(1)))
        );
        for column in COLUMNS.iter().chain(UPDATABLE_COLUMNS) {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
    }

    #[test]
    fn destination_matches_by_system_id_first() {
        let mut destination = DestinationInput {
            x_system_tenant_id: "sys-1".into(),
            x_system_tenant_name: "foo".into(),
            x_system_base_url: "https://foo.example".into(),
            ..Default::default()
        };
        let mut args = SqlArgs::default();
        assert_eq!(
            destination_system_condition(&destination).render(&mut args),
            "app_id IN (SELECT id FROM applications WHERE local_tenant_id = $1)"
        );

        destination.x_system_tenant_id.clear();
        let mut args = SqlArgs::default();
        assert_eq!(
            destination_system_condition(&destination).render(&mut args),
            "app_id IN (SELECT id FROM applications WHERE base_url = $1 AND name = $2)"
        );
        assert_eq!(
            args.as_slice(),
            &[SqlArg::from("https://foo.example"), SqlArg::from("foo")]
        );
    }

    #[test]
    fn correlation_id_uses_json_containment() {
        let mut args = SqlArgs::default();
        let sql = correlation_id_condition("corr-1").render(&mut args);
        assert_eq!(sql, "id IN (SELECT id FROM bundles WHERE correlation_ids @> $1)");
        assert_eq!(args.as_slice(), &[SqlArg::Json(Some(json!(["corr-1"])))]);
    }
}
