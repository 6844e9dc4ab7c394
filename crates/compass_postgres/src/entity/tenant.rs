use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::{BusinessTenantMapping, TenantStatus, TenantType};
use compass_core::ports::TenantRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::parse_column;
use crate::repo::{Condition, Creator, Entity, ExistQuerier, Lister, OrderBy, SingleGetter, SqlArg};

pub(crate) const TABLE: &str = "business_tenant_mappings";

const COLUMNS: &[&str] = &[
    "id",
    "external_name",
    "external_tenant",
    "subdomain",
    "parent",
    "type",
    "provider_name",
    "status",
];

const CREATOR: Creator = Creator::new(ResourceType::Tenant, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Tenant, TABLE, COLUMNS);
const LISTER: Lister = Lister::new(ResourceType::Tenant, TABLE, COLUMNS);
const EXISTS: ExistQuerier = ExistQuerier::new(ResourceType::Tenant, TABLE);

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TenantRow {
    pub id: Uuid,
    pub external_name: String,
    pub external_tenant: String,
    pub subdomain: Option<String>,
    pub parent: Option<Uuid>,
    #[sqlx(rename = "type")]
    pub tenant_type: String,
    pub provider_name: String,
    pub status: String,
}

impl From<&BusinessTenantMapping> for TenantRow {
    fn from(tenant: &BusinessTenantMapping) -> Self {
        Self {
            id: tenant.id.as_uuid(),
            external_name: tenant.name.clone(),
            external_tenant: tenant.external_tenant.clone(),
            subdomain: tenant.subdomain.clone(),
            parent: tenant.parent.map(|p| p.as_uuid()),
            tenant_type: tenant.tenant_type.to_string(),
            provider_name: tenant.provider.clone(),
            status: tenant.status.to_string(),
        }
    }
}

impl TryFrom<TenantRow> for BusinessTenantMapping {
    type Error = CompassError;

    fn try_from(row: TenantRow) -> Result<Self> {
        Ok(Self {
            id: TenantId(row.id),
            external_tenant: row.external_tenant,
            name: row.external_name,
            subdomain: row.subdomain,
            parent: row.parent.map(TenantId),
            tenant_type: parse_column::<TenantType>("type", &row.tenant_type)?,
            provider: row.provider_name,
            status: parse_column::<TenantStatus>("status", &row.status)?,
        })
    }
}

impl Entity for TenantRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "external_name" => Some(self.external_name.as_str().into()),
            "external_tenant" => Some(self.external_tenant.as_str().into()),
            "subdomain" => Some(self.subdomain.clone().into()),
            "parent" => Some(self.parent.into()),
            "type" => Some(self.tenant_type.as_str().into()),
            "provider_name" => Some(self.provider_name.as_str().into()),
            "status" => Some(self.status.as_str().into()),
            _ => None,
        }
    }
}

/// Subaccounts carrying a tenant-level label under `subdomain_label_key`.
fn subscribed_conditions(subdomain_label_key: &str) -> [Condition; 2] {
    [
        Condition::equal("type", TenantType::Subaccount.to_string()),
        Condition::in_subquery(
            "id",
            "SELECT tenant_id FROM labels WHERE key = ? AND app_id IS NULL AND runtime_id IS NULL",
            vec![subdomain_label_key.into()],
        ),
    ]
}

/// Tenants are global rows.
pub struct PgTenantRepository;

#[async_trait]
impl TenantRepository<PgConnection> for PgTenantRepository {
    async fn create(&self, conn: &mut PgConnection, item: &BusinessTenantMapping) -> Result<()> {
        debug!(id = %item.id, external_tenant = %item.external_tenant, "creating tenant");
        CREATOR.create_global(conn, &TenantRow::from(item)).await
    }

    async fn get(&self, conn: &mut PgConnection, id: TenantId) -> Result<BusinessTenantMapping> {
        let row: TenantRow = GETTER.get_global(conn, &[Condition::equal("id", id)], &[]).await?;
        row.try_into()
    }

    async fn get_by_external_tenant(
        &self,
        conn: &mut PgConnection,
        external_tenant: &str,
    ) -> Result<BusinessTenantMapping> {
        let row: TenantRow = GETTER
            .get_global(conn, &[Condition::equal("external_tenant", external_tenant)], &[])
            .await
            .map_err(|e| match e {
                CompassError::NotFound { .. } => CompassError::not_found(ResourceType::Tenant, external_tenant),
                other => other,
            })?;
        row.try_into()
    }

    async fn list_subscribed(
        &self,
        conn: &mut PgConnection,
        subdomain_label_key: &str,
    ) -> Result<Vec<BusinessTenantMapping>> {
        let rows: Vec<TenantRow> = LISTER
            .list_global(conn, &subscribed_conditions(subdomain_label_key), &[OrderBy::asc("id")])
            .await?;
        rows.into_iter().map(BusinessTenantMapping::try_from).collect()
    }

    async fn exists_subscribed(
        &self,
        conn: &mut PgConnection,
        id: TenantId,
        subdomain_label_key: &str,
    ) -> Result<bool> {
        let mut conds = vec![Condition::equal("id", id)];
        conds.extend(subscribed_conditions(subdomain_label_key));
        EXISTS.exists_global(conn, &conds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::SqlArgs;

    #[test]
    fn row_conversion_keeps_every_field() {
        let tenant = BusinessTenantMapping {
            id: TenantId(Uuid::from_u128(2)),
            external_tenant: "ext-2".into(),
            name: "consumer".into(),
            subdomain: Some("consumer".into()),
            parent: Some(TenantId(Uuid::from_u128(1))),
            tenant_type: TenantType::Subaccount,
            provider: "test".into(),
            status: TenantStatus::Active,
        };
        let row = TenantRow::from(&tenant);
        assert_eq!(row.tenant_type, "subaccount");
        assert_eq!(row.status, "active");
        for column in COLUMNS {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
        assert_eq!(BusinessTenantMapping::try_from(row).unwrap(), tenant);
    }

    #[test]
    fn unknown_tenant_type_is_internal() {
        let row = TenantRow {
            id: Uuid::nil(),
            external_name: "n".into(),
            external_tenant: "e".into(),
            subdomain: None,
            parent: None,
            tenant_type: "galaxy".into(),
            provider_name: "p".into(),
            status: "active".into(),
        };
        assert_eq!(BusinessTenantMapping::try_from(row).unwrap_err().http_status(), 500);
    }

    #[test]
    fn subscription_requires_subaccount_and_tenant_label() {
        let mut args = SqlArgs::default();
        let sql = subscribed_conditions("subdomain")
            .iter()
            .map(|c| c.render(&mut args))
            .collect::<Vec<_>>()
            .join(" AND ");
        assert_eq!(
            sql,
            "type = $1 AND id IN (SELECT tenant_id FROM labels WHERE key = $2 AND app_id IS NULL AND runtime_id IS NULL)"
        );
        assert_eq!(args.as_slice()[0], SqlArg::from("subaccount"));
    }
}
