use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::Result;
use compass_core::model::{Destination, DestinationInput};
use compass_core::ports::DestinationRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use crate::repo::{Condition, Deleter, Entity, Lister, OrderBy, SqlArg, Upserter};

pub(crate) const TABLE: &str = "destinations";

const COLUMNS: &[&str] = &[
    "id",
    "name",
    "type",
    "url",
    "authentication",
    "tenant_id",
    "bundle_id",
    "revision",
];

const UPSERTER: Upserter = Upserter::new(
    ResourceType::Destination,
    TABLE,
    COLUMNS,
    &["name", "tenant_id", "bundle_id"],
    &["type", "url", "authentication", "revision"],
);
const LISTER: Lister = Lister::new(ResourceType::Destination, TABLE, COLUMNS);
const DELETER: Deleter = Deleter::new(ResourceType::Destination, TABLE);

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DestinationRow {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    pub destination_type: String,
    pub url: String,
    pub authentication: String,
    pub tenant_id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub revision: Uuid,
}

impl From<&Destination> for DestinationRow {
    fn from(destination: &Destination) -> Self {
        Self {
            id: destination.id,
            name: destination.name.clone(),
            destination_type: destination.destination_type.clone(),
            url: destination.url.clone(),
            authentication: destination.authentication.clone(),
            tenant_id: destination.tenant_id.as_uuid(),
            bundle_id: destination.bundle_id,
            revision: destination.revision,
        }
    }
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            destination_type: row.destination_type,
            url: row.url,
            authentication: row.authentication,
            tenant_id: TenantId(row.tenant_id),
            bundle_id: row.bundle_id,
            revision: row.revision,
        }
    }
}

impl Entity for DestinationRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "type" => Some(self.destination_type.as_str().into()),
            "url" => Some(self.url.as_str().into()),
            "authentication" => Some(self.authentication.as_str().into()),
            "tenant_id" => Some(self.tenant_id.into()),
            "bundle_id" => Some(self.bundle_id.into()),
            "revision" => Some(self.revision.into()),
            _ => None,
        }
    }
}

pub struct PgDestinationRepository;

#[async_trait]
impl DestinationRepository<PgConnection> for PgDestinationRepository {
    async fn upsert(
        &self,
        conn: &mut PgConnection,
        input: &DestinationInput,
        id: Uuid,
        tenant: TenantId,
        bundle_id: Uuid,
        revision: Uuid,
    ) -> Result<()> {
        debug!(name = %input.name, %tenant, %bundle_id, %revision, "upserting destination");
        let row = DestinationRow::from(&input.to_destination(id, tenant, bundle_id, revision));
        UPSERTER.upsert(conn, &row).await
    }

    async fn delete_old(&self, conn: &mut PgConnection, revision: Uuid, tenant: TenantId) -> Result<u64> {
        let conds = [
            Condition::equal("tenant_id", tenant),
            Condition::not_equal("revision", revision),
        ];
        DELETER.delete_many_global(conn, &conds).await
    }

    async fn list_by_tenant(&self, conn: &mut PgConnection, tenant: TenantId) -> Result<Vec<Destination>> {
        let rows: Vec<DestinationRow> = LISTER.list(conn, tenant, &[], &[OrderBy::asc("name")]).await?;
        Ok(rows.into_iter().map(Destination::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_keeps_every_field() {
        let input = DestinationInput {
            name: "d1".into(),
            destination_type: "HTTP".into(),
            url: "https://d1.example".into(),
            authentication: "NoAuthentication".into(),
            ..Default::default()
        };
        let destination = input.to_destination(
            Uuid::from_u128(1),
            TenantId(Uuid::from_u128(2)),
            Uuid::from_u128(3),
            Uuid::from_u128(4),
        );
        let row = DestinationRow::from(&destination);
        for column in COLUMNS {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
        assert_eq!(row.value("type"), Some(SqlArg::from("HTTP")));
        assert_eq!(Destination::from(row), destination);
    }

    #[test]
    fn upsert_refreshes_by_natural_key() {
        let row = DestinationRow {
            id: Uuid::from_u128(1),
            name: "d1".into(),
            destination_type: "HTTP".into(),
            url: "u".into(),
            authentication: "a".into(),
            tenant_id: Uuid::from_u128(2),
            bundle_id: Some(Uuid::from_u128(3)),
            revision: Uuid::from_u128(4),
        };
        let (sql, args) = UPSERTER.upsert_statement(&row).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO destinations ( id, name, type, url, authentication, tenant_id, bundle_id, revision ) \
             VALUES ( $1, $2, $3, $4, $5, $6, $7, $8 ) ON CONFLICT ( name, tenant_id, bundle_id ) \
             DO UPDATE SET type = EXCLUDED.type, url = EXCLUDED.url, authentication = EXCLUDED.authentication, \
             revision = EXCLUDED.revision"
        );
        assert_eq!(args.as_slice().len(), 8);
    }

    #[test]
    fn stale_revisions_are_deleted_per_tenant() {
        let conds = [
            Condition::equal("tenant_id", TenantId(Uuid::from_u128(2))),
            Condition::not_equal("revision", Uuid::from_u128(4)),
        ];
        let (sql, _) = DELETER.delete_statement(None, &conds).unwrap();
        assert_eq!(sql, "DELETE FROM destinations WHERE tenant_id = $1 AND revision != $2");
    }
}
