use sqlx::PgConnection;

use compass_core::error::Result;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{fetch_any, filter_clause, Condition, SqlArgs};

#[derive(Debug, Clone)]
pub struct ExistQuerier {
    resource_type: ResourceType,
    table: &'static str,
}

impl ExistQuerier {
    pub const fn new(resource_type: ResourceType, table: &'static str) -> Self {
        Self { resource_type, table }
    }

    pub async fn exists(&self, conn: &mut PgConnection, tenant: TenantId, conds: &[Condition]) -> Result<bool> {
        let (sql, args) = self.exists_statement(Some(tenant), conds)?;
        fetch_any(conn, &sql, args, self.resource_type).await
    }

    pub async fn exists_global(&self, conn: &mut PgConnection, conds: &[Condition]) -> Result<bool> {
        let (sql, args) = self.exists_statement(None, conds)?;
        fetch_any(conn, &sql, args, self.resource_type).await
    }

    pub(crate) fn exists_statement(&self, tenant: Option<TenantId>, conds: &[Condition]) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let filter = filter_clause(self.resource_type, conds, tenant, false, &mut args)?;
        Ok((format!("SELECT 1 FROM {}{filter}", self.table), args))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn exists_applies_read_isolation() {
        let querier = ExistQuerier::new(ResourceType::Application, "applications");
        let tenant = TenantId(Uuid::from_u128(5));
        let (sql, _) = querier
            .exists_statement(Some(tenant), &[Condition::equal("id", Uuid::nil())])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT 1 FROM applications WHERE id = $1 AND (id IN (SELECT id FROM tenant_applications WHERE tenant_id = $2))"
        );
    }
}
