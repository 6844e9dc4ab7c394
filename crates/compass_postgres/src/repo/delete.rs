use sqlx::PgConnection;

use compass_core::error::{CompassError, Result};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{execute, filter_clause, id_hint, Condition, SqlArgs};
use crate::error::SqlOperation;

#[derive(Debug, Clone)]
pub struct Deleter {
    resource_type: ResourceType,
    table: &'static str,
}

impl Deleter {
    pub const fn new(resource_type: ResourceType, table: &'static str) -> Self {
        Self { resource_type, table }
    }

    /// Deletes every matching row `tenant` owns; returns the count.
    pub async fn delete_many(&self, conn: &mut PgConnection, tenant: TenantId, conds: &[Condition]) -> Result<u64> {
        let (sql, args) = self.delete_statement(Some(tenant), conds)?;
        execute(conn, &sql, args, self.resource_type, SqlOperation::Delete).await
    }

    /// Fails unless exactly one owned row matched.
    pub async fn delete_one(&self, conn: &mut PgConnection, tenant: TenantId, conds: &[Condition]) -> Result<()> {
        let (sql, args) = self.delete_statement(Some(tenant), conds)?;
        self.expect_single(conn, &sql, args, conds).await
    }

    pub async fn delete_many_global(&self, conn: &mut PgConnection, conds: &[Condition]) -> Result<u64> {
        let (sql, args) = self.delete_statement(None, conds)?;
        execute(conn, &sql, args, self.resource_type, SqlOperation::Delete).await
    }

    pub async fn delete_one_global(&self, conn: &mut PgConnection, conds: &[Condition]) -> Result<()> {
        let (sql, args) = self.delete_statement(None, conds)?;
        self.expect_single(conn, &sql, args, conds).await
    }

    async fn expect_single(&self, conn: &mut PgConnection, sql: &str, args: SqlArgs, conds: &[Condition]) -> Result<()> {
        match execute(conn, sql, args, self.resource_type, SqlOperation::Delete).await? {
            0 => Err(CompassError::not_found(self.resource_type, id_hint(conds))),
            1 => Ok(()),
            n => Err(CompassError::internal(format!(
                "delete should remove single row, but removed {n} rows"
            ))),
        }
    }

    pub(crate) fn delete_statement(&self, tenant: Option<TenantId>, conds: &[Condition]) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let filter = filter_clause(self.resource_type, conds, tenant, true, &mut args)?;
        Ok((format!("DELETE FROM {}{filter}", self.table), args))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn delete_is_owner_scoped() {
        let deleter = Deleter::new(ResourceType::Bundle, "bundles");
        let tenant = TenantId(Uuid::from_u128(4));
        let (sql, _) = deleter
            .delete_statement(Some(tenant), &[Condition::equal("id", Uuid::nil())])
            .unwrap();
        assert_eq!(
            sql,
            "DELETE FROM bundles WHERE id = $1 AND (id IN (SELECT id FROM bundles_tenants WHERE tenant_id = $2 AND owner = true))"
        );
    }

    #[test]
    fn embedded_tenant_delete() {
        let deleter = Deleter::new(ResourceType::Destination, "destinations");
        let tenant = TenantId(Uuid::from_u128(4));
        let (sql, _) = deleter
            .delete_statement(Some(tenant), &[Condition::equal("name", "d")])
            .unwrap();
        assert_eq!(sql, "DELETE FROM destinations WHERE name = $1 AND tenant_id = $2");
    }

    #[test]
    fn global_delete() {
        let deleter = Deleter::new(ResourceType::BundleReference, "bundle_references");
        let (sql, _) = deleter
            .delete_statement(None, &[Condition::equal("api_def_id", Uuid::nil())])
            .unwrap();
        assert_eq!(sql, "DELETE FROM bundle_references WHERE api_def_id = $1");
    }
}
