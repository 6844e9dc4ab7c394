use sqlx::PgConnection;

use compass_core::error::{CompassError, Result};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{fetch_all, filter_clause, id_hint, order_by_clause, Condition, OrderBy, Row, SqlArgs};
use crate::error::SqlOperation;

/// Fetches exactly one row.
#[derive(Debug, Clone)]
pub struct SingleGetter {
    resource_type: ResourceType,
    table: &'static str,
    columns: &'static [&'static str],
}

impl SingleGetter {
    pub const fn new(resource_type: ResourceType, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            resource_type,
            table,
            columns,
        }
    }

    pub async fn get<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<R> {
        let (sql, args) = self.select_statement(Some(tenant), conds, order)?;
        self.fetch_single(conn, &sql, args, conds).await
    }

    pub async fn get_global<R: Row>(
        &self,
        conn: &mut PgConnection,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<R> {
        let (sql, args) = self.select_statement(None, conds, order)?;
        self.fetch_single(conn, &sql, args, conds).await
    }

    async fn fetch_single<R: Row>(
        &self,
        conn: &mut PgConnection,
        sql: &str,
        args: SqlArgs,
        conds: &[Condition],
    ) -> Result<R> {
        let mut rows = fetch_all::<R>(conn, sql, args, self.resource_type, SqlOperation::Fetch).await?;
        match rows.len() {
            0 => Err(CompassError::not_found(self.resource_type, id_hint(conds))),
            1 => Ok(rows.remove(0)),
            n => Err(CompassError::internal(format!(
                "unexpected number of {} rows returned: {n}",
                self.resource_type
            ))),
        }
    }

    pub(crate) fn select_statement(
        &self,
        tenant: Option<TenantId>,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        sql.push_str(&filter_clause(self.resource_type, conds, tenant, false, &mut args)?);
        sql.push_str(&order_by_clause(order));
        Ok((sql, args))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    const GETTER: SingleGetter = SingleGetter::new(ResourceType::Api, "api_definitions", &["id", "name"]);

    #[test]
    fn tenant_get_appends_isolation_after_conditions() {
        let id = Uuid::from_u128(1);
        let tenant = TenantId(Uuid::from_u128(2));
        let (sql, args) = GETTER
            .select_statement(Some(tenant), &[Condition::equal("id", id)], &[])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id, name FROM api_definitions WHERE id = $1 AND (id IN (SELECT id FROM api_definitions_tenants WHERE tenant_id = $2))"
        );
        assert_eq!(args.as_slice().len(), 2);
    }

    #[test]
    fn global_get_has_no_isolation() {
        let (sql, _) = GETTER
            .select_statement(None, &[Condition::equal("name", "foo")], &[OrderBy::asc("name")])
            .unwrap();
        assert_eq!(sql, "SELECT id, name FROM api_definitions WHERE name = $1 ORDER BY name ASC");
    }

    #[test]
    fn isolation_alone_starts_where() {
        let tenant = TenantId(Uuid::from_u128(2));
        let getter = SingleGetter::new(ResourceType::Label, "labels", &["id"]);
        let (sql, _) = getter.select_statement(Some(tenant), &[], &[]).unwrap();
        assert_eq!(sql, "SELECT id FROM labels WHERE tenant_id = $1");
    }

    #[test]
    fn ignorable_resource_cannot_be_read_per_tenant() {
        let tenant = TenantId(Uuid::from_u128(2));
        let getter = SingleGetter::new(ResourceType::BundleReference, "bundle_references", &["id"]);
        assert!(getter.select_statement(Some(tenant), &[], &[]).is_err());
    }
}
