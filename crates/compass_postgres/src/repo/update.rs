use sqlx::PgConnection;

use compass_core::error::{CompassError, Result};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{column_values, execute, tenant_isolation, Entity, SqlArgs};
use crate::error::SqlOperation;

// ── Updater ───────────────────────────────────────────────────

/// Full-row replace of a single row matched by its id columns.
#[derive(Debug, Clone)]
pub struct Updater {
    resource_type: ResourceType,
    table: &'static str,
    update_columns: &'static [&'static str],
    id_columns: &'static [&'static str],
}

impl Updater {
    pub const fn new(
        resource_type: ResourceType,
        table: &'static str,
        update_columns: &'static [&'static str],
        id_columns: &'static [&'static str],
    ) -> Self {
        Self {
            resource_type,
            table,
            update_columns,
            id_columns,
        }
    }

    /// Only rows owned by `tenant` are touched.
    pub async fn update_single(&self, conn: &mut PgConnection, tenant: TenantId, entity: &dyn Entity) -> Result<()> {
        let (sql, args) = self.update_statement(Some(tenant), entity)?;
        self.execute_single(conn, &sql, args, entity).await
    }

    pub async fn update_single_global(&self, conn: &mut PgConnection, entity: &dyn Entity) -> Result<()> {
        let (sql, args) = self.update_statement(None, entity)?;
        self.execute_single(conn, &sql, args, entity).await
    }

    async fn execute_single(&self, conn: &mut PgConnection, sql: &str, args: SqlArgs, entity: &dyn Entity) -> Result<()> {
        let affected = execute(conn, sql, args, self.resource_type, SqlOperation::Update).await?;
        match affected {
            0 => Err(CompassError::not_found(self.resource_type, entity.id())),
            1 => Ok(()),
            n => Err(CompassError::Conflict(format!(
                "should update single row, but updated {n} rows of {}",
                self.resource_type
            ))),
        }
    }

    pub(crate) fn update_statement(&self, tenant: Option<TenantId>, entity: &dyn Entity) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();

        let values = column_values(entity, self.resource_type, self.update_columns)?;
        let sets = self
            .update_columns
            .iter()
            .zip(values)
            .map(|(col, v)| format!("{col} = {}", args.push(v)))
            .collect::<Vec<_>>();

        let id_values = column_values(entity, self.resource_type, self.id_columns)?;
        let mut filters = self
            .id_columns
            .iter()
            .zip(id_values)
            .map(|(col, v)| format!("{col} = {}", args.push(v)))
            .collect::<Vec<_>>();
        if let Some(tenant) = tenant {
            filters.push(tenant_isolation(self.resource_type, tenant, true, &mut args)?);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            sets.join(", "),
            filters.join(" AND ")
        );
        Ok((sql, args))
    }
}

// ── Upserter ──────────────────────────────────────────────────

/// `INSERT .. ON CONFLICT (keys) DO UPDATE` for rows identified by a natural key.
#[derive(Debug, Clone)]
pub struct Upserter {
    resource_type: ResourceType,
    table: &'static str,
    insert_columns: &'static [&'static str],
    conflict_columns: &'static [&'static str],
    update_columns: &'static [&'static str],
}

impl Upserter {
    pub const fn new(
        resource_type: ResourceType,
        table: &'static str,
        insert_columns: &'static [&'static str],
        conflict_columns: &'static [&'static str],
        update_columns: &'static [&'static str],
    ) -> Self {
        Self {
            resource_type,
            table,
            insert_columns,
            conflict_columns,
            update_columns,
        }
    }

    pub async fn upsert(&self, conn: &mut PgConnection, entity: &dyn Entity) -> Result<()> {
        let (sql, args) = self.upsert_statement(entity)?;
        execute(conn, &sql, args, self.resource_type, SqlOperation::Upsert).await?;
        Ok(())
    }

    pub(crate) fn upsert_statement(&self, entity: &dyn Entity) -> Result<(String, SqlArgs)> {
        let values = column_values(entity, self.resource_type, self.insert_columns)?;
        let mut args = SqlArgs::default();
        let placeholders = values.into_iter().map(|v| args.push(v)).collect::<Vec<_>>();
        let updates = self
            .update_columns
            .iter()
            .map(|col| format!("{col} = EXCLUDED.{col}"))
            .collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {} ( {} ) VALUES ( {} ) ON CONFLICT ( {} ) DO UPDATE SET {}",
            self.table,
            self.insert_columns.join(", "),
            placeholders.join(", "),
            self.conflict_columns.join(", "),
            updates.join(", ")
        );
        Ok((sql, args))
    }
}
