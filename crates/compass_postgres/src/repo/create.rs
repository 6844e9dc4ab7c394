use sqlx::PgConnection;
use tracing::debug;

use compass_core::error::{CompassError, Result};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{column_values, execute, fetch_any, Entity, SqlArgs};
use crate::error::SqlOperation;

const TENANT_APPLICATIONS_INSERT: &str = "WITH RECURSIVE parents AS \
(SELECT t1.id, t1.parent FROM business_tenant_mappings t1 WHERE id = $1 \
UNION ALL SELECT t2.id, t2.parent FROM business_tenant_mappings t2 INNER JOIN parents t on t2.id = t.parent) \
INSERT INTO tenant_applications ( tenant_id, id, owner ) \
(SELECT parents.id AS tenant_id, $2 as id, $3 AS owner FROM parents)";

/// Inserts rows, granting or checking tenant access on the way.
#[derive(Debug, Clone)]
pub struct Creator {
    resource_type: ResourceType,
    table: &'static str,
    columns: &'static [&'static str],
}

impl Creator {
    pub const fn new(resource_type: ResourceType, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            resource_type,
            table,
            columns,
        }
    }

    /// Top-level rows are inserted and then granted to `tenant` and its
    /// ancestors; child rows require `tenant` to own the parent; embedded
    /// tenant rows are inserted as they are.
    pub async fn create(&self, conn: &mut PgConnection, tenant: TenantId, entity: &dyn Entity) -> Result<()> {
        let rt = self.resource_type;

        if rt.is_top_level() {
            self.insert(conn, entity).await?;
            debug!(resource_type = %rt, id = %entity.id(), %tenant, "granting tenant access");
            let mut args = SqlArgs::default();
            args.push(tenant);
            args.push(entity.id());
            args.push(true);
            execute(conn, TENANT_APPLICATIONS_INSERT, args, rt, SqlOperation::Create).await?;
            return Ok(());
        }

        if rt.tenant_access_table().is_some() {
            let (parent_type, parent_id) = entity.parent(rt).ok_or_else(|| {
                CompassError::internal(format!("unknown parent for entity type {rt}"))
            })?;
            let (sql, args) = parent_access_query(parent_type, parent_id, tenant)?;
            if !fetch_any(conn, &sql, args, rt).await? {
                return Err(CompassError::Unauthorized(format!(
                    "tenant {tenant} does not have access to the parent resource {parent_type} with ID {parent_id}"
                )));
            }
            return self.insert(conn, entity).await;
        }

        if rt.embedded_tenant_column().is_some() {
            return self.insert(conn, entity).await;
        }

        Err(CompassError::internal(format!(
            "entity {rt} is tenant ignorable and must be created globally"
        )))
    }

    /// Plain insert without any tenant handling.
    pub async fn create_global(&self, conn: &mut PgConnection, entity: &dyn Entity) -> Result<()> {
        self.insert(conn, entity).await
    }

    async fn insert(&self, conn: &mut PgConnection, entity: &dyn Entity) -> Result<()> {
        let (sql, args) = self.insert_statement(entity)?;
        execute(conn, &sql, args, self.resource_type, SqlOperation::Create).await?;
        Ok(())
    }

    pub(crate) fn insert_statement(&self, entity: &dyn Entity) -> Result<(String, SqlArgs)> {
        let values = column_values(entity, self.resource_type, self.columns)?;
        let mut args = SqlArgs::default();
        let placeholders = values.into_iter().map(|v| args.push(v)).collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {} ( {} ) VALUES ( {} )",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );
        Ok((sql, args))
    }
}

fn parent_access_query(
    parent_type: ResourceType,
    parent_id: uuid::Uuid,
    tenant: TenantId,
) -> Result<(String, SqlArgs)> {
    let table = parent_type.tenant_access_table().ok_or_else(|| {
        CompassError::internal(format!("parent entity {parent_type} does not have access table"))
    })?;
    let mut args = SqlArgs::default();
    let sql = format!(
        "SELECT 1 FROM {table} WHERE tenant_id = {} AND id = {} AND owner = {}",
        args.push(tenant),
        args.push(parent_id),
        args.push(true)
    );
    Ok((sql, args))
}
