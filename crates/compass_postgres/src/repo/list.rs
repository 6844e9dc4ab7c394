use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use compass_core::error::Result;
use compass_core::pagination::{decode_offset_cursor, Page};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::{fetch_all, fetch_count, filter_clause, order_by_clause, Condition, OrderBy, Row, SqlArgs};
use crate::error::SqlOperation;

// ── Lister ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Lister {
    resource_type: ResourceType,
    table: &'static str,
    columns: &'static [&'static str],
}

impl Lister {
    pub const fn new(resource_type: ResourceType, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            resource_type,
            table,
            columns,
        }
    }

    pub async fn list<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<Vec<R>> {
        let (sql, args) = self.select_statement(Some(tenant), conds, order, false)?;
        fetch_all(conn, &sql, args, self.resource_type, SqlOperation::List).await
    }

    /// Same as [`Lister::list`] but locks the rows until the transaction ends.
    pub async fn list_for_update<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<Vec<R>> {
        let (sql, args) = self.select_statement(Some(tenant), conds, order, true)?;
        fetch_all(conn, &sql, args, self.resource_type, SqlOperation::List).await
    }

    pub async fn list_global<R: Row>(
        &self,
        conn: &mut PgConnection,
        conds: &[Condition],
        order: &[OrderBy],
    ) -> Result<Vec<R>> {
        let (sql, args) = self.select_statement(None, conds, order, false)?;
        fetch_all(conn, &sql, args, self.resource_type, SqlOperation::List).await
    }

    pub(crate) fn select_statement(
        &self,
        tenant: Option<TenantId>,
        conds: &[Condition],
        order: &[OrderBy],
        for_update: bool,
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        sql.push_str(&filter_clause(self.resource_type, conds, tenant, false, &mut args)?);
        sql.push_str(&order_by_clause(order));
        if for_update {
            sql.push_str(" FOR UPDATE");
        }
        Ok((sql, args))
    }
}

// ── PageableQuerier ───────────────────────────────────────────

/// Offset-cursor paging over one result set.
#[derive(Debug, Clone)]
pub struct PageableQuerier {
    resource_type: ResourceType,
    table: &'static str,
    columns: &'static [&'static str],
}

impl PageableQuerier {
    pub const fn new(resource_type: ResourceType, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            resource_type,
            table,
            columns,
        }
    }

    pub async fn list<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        page_size: i64,
        cursor: &str,
        order_by_column: &str,
        conds: &[Condition],
    ) -> Result<(Vec<R>, Page, i64)> {
        self.list_page(conn, Some(tenant), page_size, cursor, order_by_column, conds).await
    }

    pub async fn list_global<R: Row>(
        &self,
        conn: &mut PgConnection,
        page_size: i64,
        cursor: &str,
        order_by_column: &str,
        conds: &[Condition],
    ) -> Result<(Vec<R>, Page, i64)> {
        self.list_page(conn, None, page_size, cursor, order_by_column, conds).await
    }

    async fn list_page<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: Option<TenantId>,
        page_size: i64,
        cursor: &str,
        order_by_column: &str,
        conds: &[Condition],
    ) -> Result<(Vec<R>, Page, i64)> {
        let offset = decode_offset_cursor(cursor)?;

        let (sql, args) = self.page_statement(tenant, page_size, offset, order_by_column, conds)?;
        let rows = fetch_all::<R>(conn, &sql, args, self.resource_type, SqlOperation::List).await?;

        let (count_sql, count_args) = self.count_statement(tenant, conds)?;
        let total = fetch_count(conn, &count_sql, count_args, self.resource_type).await?;

        let page = Page::at_offset(cursor, offset, page_size, rows.len(), total);
        Ok((rows, page, total))
    }

    pub(crate) fn page_statement(
        &self,
        tenant: Option<TenantId>,
        page_size: i64,
        offset: i64,
        order_by_column: &str,
        conds: &[Condition],
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let filter = filter_clause(self.resource_type, conds, tenant, false, &mut args)?;
        let sql = format!(
            "SELECT {} FROM {}{filter} ORDER BY {order_by_column} LIMIT {page_size} OFFSET {offset}",
            self.columns.join(", "),
            self.table,
        );
        Ok((sql, args))
    }

    pub(crate) fn count_statement(
        &self,
        tenant: Option<TenantId>,
        conds: &[Condition],
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let filter = filter_clause(self.resource_type, conds, tenant, false, &mut args)?;
        Ok((format!("SELECT COUNT(*) FROM {}{filter}", self.table), args))
    }
}

// ── UnionLister ───────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct KeyCount {
    id: Uuid,
    total_count: i64,
}

/// One page per key value in a single round trip, plus totals per key.
#[derive(Debug, Clone)]
pub struct UnionLister {
    resource_type: ResourceType,
    table: &'static str,
    columns: &'static [&'static str],
}

impl UnionLister {
    pub const fn new(resource_type: ResourceType, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            resource_type,
            table,
            columns,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn list<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        key_column: &str,
        ids: &[Uuid],
        page_size: i64,
        cursor: &str,
        order: &[OrderBy],
        conds: &[Condition],
    ) -> Result<(Vec<R>, HashMap<Uuid, i64>)> {
        self.list_union(conn, Some(tenant), key_column, ids, page_size, cursor, order, conds)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn list_global<R: Row>(
        &self,
        conn: &mut PgConnection,
        key_column: &str,
        ids: &[Uuid],
        page_size: i64,
        cursor: &str,
        order: &[OrderBy],
        conds: &[Condition],
    ) -> Result<(Vec<R>, HashMap<Uuid, i64>)> {
        self.list_union(conn, None, key_column, ids, page_size, cursor, order, conds)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn list_union<R: Row>(
        &self,
        conn: &mut PgConnection,
        tenant: Option<TenantId>,
        key_column: &str,
        ids: &[Uuid],
        page_size: i64,
        cursor: &str,
        order: &[OrderBy],
        conds: &[Condition],
    ) -> Result<(Vec<R>, HashMap<Uuid, i64>)> {
        if ids.is_empty() {
            return Ok((Vec::new(), HashMap::new()));
        }
        let offset = decode_offset_cursor(cursor)?;

        let (sql, args) = self.union_statement(tenant, key_column, ids, page_size, offset, order, conds)?;
        let rows = fetch_all::<R>(conn, &sql, args, self.resource_type, SqlOperation::List).await?;

        let (count_sql, count_args) = self.count_statement(tenant, key_column, ids, conds)?;
        let counts =
            fetch_all::<KeyCount>(conn, &count_sql, count_args, self.resource_type, SqlOperation::List).await?;

        Ok((rows, counts.into_iter().map(|c| (c.id, c.total_count)).collect()))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn union_statement(
        &self,
        tenant: Option<TenantId>,
        key_column: &str,
        ids: &[Uuid],
        page_size: i64,
        offset: i64,
        order: &[OrderBy],
        conds: &[Condition],
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let mut selects = Vec::with_capacity(ids.len());
        for id in ids {
            let mut all = vec![Condition::equal(key_column, *id)];
            all.extend_from_slice(conds);
            let filter = filter_clause(self.resource_type, &all, tenant, false, &mut args)?;
            let limit = args.push(page_size);
            let skip = args.push(offset);
            selects.push(format!(
                "(SELECT {} FROM {}{filter}{} LIMIT {limit} OFFSET {skip})",
                self.columns.join(", "),
                self.table,
                order_by_clause(order),
            ));
        }
        Ok((selects.join(" UNION "), args))
    }

    pub(crate) fn count_statement(
        &self,
        tenant: Option<TenantId>,
        key_column: &str,
        ids: &[Uuid],
        conds: &[Condition],
    ) -> Result<(String, SqlArgs)> {
        let mut args = SqlArgs::default();
        let mut all = vec![Condition::in_values(key_column, ids.iter().copied())];
        all.extend_from_slice(conds);
        let filter = filter_clause(self.resource_type, &all, tenant, false, &mut args)?;
        let sql = format!(
            "SELECT {key_column} AS id, COUNT(*) AS total_count FROM {}{filter} GROUP BY {key_column} ORDER BY {key_column} ASC",
            self.table
        );
        Ok((sql, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::SqlArg;

    fn tenant() -> TenantId {
        TenantId(Uuid::from_u128(9))
    }

    #[test]
    fn list_for_update_locks_rows() {
        let lister = Lister::new(ResourceType::EntityTypeMapping, "entity_type_mappings", &["id"]);
        let (sql, _) = lister
            .select_statement(Some(tenant()), &[Condition::equal("api_definition_id", Uuid::nil())], &[], true)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id FROM entity_type_mappings WHERE api_definition_id = $1 AND (id IN (SELECT id FROM entity_type_mappings_tenants WHERE tenant_id = $2)) FOR UPDATE"
        );
    }

    #[test]
    fn pageable_uses_literal_limit_and_offset() {
        let querier = PageableQuerier::new(ResourceType::EntityTypeMapping, "entity_type_mappings", &["id", "api_definition_id"]);
        let conds = [Condition::equal("api_definition_id", Uuid::nil())];
        let (sql, args) = querier.page_statement(Some(tenant()), 10, 20, "id", &conds).unwrap();
        assert_eq!(
            sql,
            "SELECT id, api_definition_id FROM entity_type_mappings WHERE api_definition_id = $1 AND (id IN (SELECT id FROM entity_type_mappings_tenants WHERE tenant_id = $2)) ORDER BY id LIMIT 10 OFFSET 20"
        );
        assert_eq!(args.as_slice().len(), 2);

        let (count, _) = querier.count_statement(Some(tenant()), &conds).unwrap();
        assert_eq!(
            count,
            "SELECT COUNT(*) FROM entity_type_mappings WHERE api_definition_id = $1 AND (id IN (SELECT id FROM entity_type_mappings_tenants WHERE tenant_id = $2))"
        );
    }

    #[test]
    fn union_selects_one_page_per_key() {
        let lister = UnionLister::new(ResourceType::BundleReference, "bundle_references", &["id", "bundle_id"]);
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let (sql, args) = lister
            .union_statement(None, "bundle_id", &[a, b], 5, 10, &[OrderBy::asc("api_def_id")], &[Condition::not_null("api_def_id")])
            .unwrap();
        assert_eq!(
            sql,
            "(SELECT id, bundle_id FROM bundle_references WHERE bundle_id = $1 AND api_def_id IS NOT NULL ORDER BY api_def_id ASC LIMIT $2 OFFSET $3) \
             UNION (SELECT id, bundle_id FROM bundle_references WHERE bundle_id = $4 AND api_def_id IS NOT NULL ORDER BY api_def_id ASC LIMIT $5 OFFSET $6)"
        );
        assert_eq!(
            args.as_slice(),
            &[
                SqlArg::from(a),
                SqlArg::from(5_i64),
                SqlArg::from(10_i64),
                SqlArg::from(b),
                SqlArg::from(5_i64),
                SqlArg::from(10_i64),
            ]
        );
    }

    #[test]
    fn union_counts_group_by_key() {
        let lister = UnionLister::new(ResourceType::BundleReference, "bundle_references", &["id"]);
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let (sql, _) = lister
            .count_statement(None, "bundle_id", &[a, b], &[Condition::not_null("api_def_id")])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT bundle_id AS id, COUNT(*) AS total_count FROM bundle_references WHERE bundle_id IN ($1, $2) AND api_def_id IS NOT NULL GROUP BY bundle_id ORDER BY bundle_id ASC"
        );
    }
}
