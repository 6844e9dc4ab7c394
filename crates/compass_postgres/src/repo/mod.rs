//! Generic tenant-aware repository primitives.
//!
//! Each builder is configured once per entity with its table, resource type
//! and column list, then renders SQL at call time from the tenant and the
//! caller's conditions. Placeholders are numbered `$1..$n` left to right in
//! the order the fragments are rendered. All SQL is runtime-checked
//! (`sqlx::query_with`), never `sqlx::query!`.

mod create;
mod delete;
mod exists;
mod get;
mod list;
mod update;

#[cfg(test)]
mod testing;

pub use create::Creator;
pub use delete::Deleter;
pub use exists::ExistQuerier;
pub use get::SingleGetter;
pub use list::{Lister, PageableQuerier, UnionLister};
pub use update::{Updater, Upserter};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, FromRow, PgConnection};
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use crate::error::{map_sql_error, SqlOperation};

/// Rows the builders can decode.
pub trait Row: for<'r> FromRow<'r, PgRow> + Send + Unpin {}

impl<T> Row for T where T: for<'r> FromRow<'r, PgRow> + Send + Unpin {}

// ── Arguments ─────────────────────────────────────────────────

/// A bound value. Every variant is nullable so optional model fields bind
/// as SQL `NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Uuid(Option<Uuid>),
    Text(Option<String>),
    Bool(Option<bool>),
    Int(Option<i64>),
    Json(Option<JsonValue>),
    Timestamp(Option<DateTime<Utc>>),
}

impl From<Uuid> for SqlArg {
    fn from(v: Uuid) -> Self {
        Self::Uuid(Some(v))
    }
}

impl From<Option<Uuid>> for SqlArg {
    fn from(v: Option<Uuid>) -> Self {
        Self::Uuid(v)
    }
}

impl From<TenantId> for SqlArg {
    fn from(v: TenantId) -> Self {
        Self::Uuid(Some(v.as_uuid()))
    }
}

impl From<&str> for SqlArg {
    fn from(v: &str) -> Self {
        Self::Text(Some(v.to_string()))
    }
}

impl From<String> for SqlArg {
    fn from(v: String) -> Self {
        Self::Text(Some(v))
    }
}

impl From<Option<String>> for SqlArg {
    fn from(v: Option<String>) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for SqlArg {
    fn from(v: bool) -> Self {
        Self::Bool(Some(v))
    }
}

impl From<Option<bool>> for SqlArg {
    fn from(v: Option<bool>) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for SqlArg {
    fn from(v: i64) -> Self {
        Self::Int(Some(v))
    }
}

impl From<Option<JsonValue>> for SqlArg {
    fn from(v: Option<JsonValue>) -> Self {
        Self::Json(v)
    }
}

impl From<Option<DateTime<Utc>>> for SqlArg {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        Self::Timestamp(v)
    }
}

/// Ordered argument list; `push` hands back the placeholder for the value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlArgs(Vec<SqlArg>);

impl SqlArgs {
    pub fn push(&mut self, arg: impl Into<SqlArg>) -> String {
        self.0.push(arg.into());
        format!("${}", self.0.len())
    }

    pub fn as_slice(&self) -> &[SqlArg] {
        &self.0
    }

    pub(crate) fn into_pg(self) -> Result<PgArguments> {
        let mut args = PgArguments::default();
        for arg in self.0 {
            let added = match arg {
                SqlArg::Uuid(v) => args.add(v),
                SqlArg::Text(v) => args.add(v),
                SqlArg::Bool(v) => args.add(v),
                SqlArg::Int(v) => args.add(v),
                SqlArg::Json(v) => args.add(v),
                SqlArg::Timestamp(v) => args.add(v),
            };
            added.map_err(|e| CompassError::internal(format!("while binding query argument: {e}")))?;
        }
        Ok(args)
    }
}

// ── Conditions ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equal(String, SqlArg),
    NotEqual(String, SqlArg),
    /// Expands to one placeholder per value.
    In(String, Vec<SqlArg>),
    /// `col IN (<sql>)`; each `?` in the fragment takes the next argument.
    InSubquery(String, String, Vec<SqlArg>),
    IsNull(String),
    NotNull(String),
    Or(Vec<Condition>),
    And(Vec<Condition>),
}

impl Condition {
    pub fn equal(column: &str, value: impl Into<SqlArg>) -> Self {
        Self::Equal(column.to_string(), value.into())
    }

    pub fn not_equal(column: &str, value: impl Into<SqlArg>) -> Self {
        Self::NotEqual(column.to_string(), value.into())
    }

    pub fn in_values<V: Into<SqlArg>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn in_subquery(column: &str, sql: &str, args: Vec<SqlArg>) -> Self {
        Self::InSubquery(column.to_string(), sql.to_string(), args)
    }

    pub fn is_null(column: &str) -> Self {
        Self::IsNull(column.to_string())
    }

    pub fn not_null(column: &str) -> Self {
        Self::NotNull(column.to_string())
    }

    pub fn render(&self, args: &mut SqlArgs) -> String {
        match self {
            Self::Equal(col, v) => format!("{col} = {}", args.push(v.clone())),
            Self::NotEqual(col, v) => format!("{col} != {}", args.push(v.clone())),
            Self::In(col, values) if values.is_empty() => format!("{col} IN (NULL)"),
            Self::In(col, values) => {
                let placeholders = values
                    .iter()
                    .map(|v| args.push(v.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{col} IN ({placeholders})")
            }
            Self::InSubquery(col, sql, sub_args) => {
                let mut rendered = String::with_capacity(sql.len());
                let mut values = sub_args.iter();
                for ch in sql.chars() {
                    if ch == '?' {
                        if let Some(v) = values.next() {
                            rendered.push_str(&args.push(v.clone()));
                            continue;
                        }
                    }
                    rendered.push(ch);
                }
                format!("{col} IN ({rendered})")
            }
            Self::IsNull(col) => format!("{col} IS NULL"),
            Self::NotNull(col) => format!("{col} IS NOT NULL"),
            Self::Or(conds) => format!("({})", render_joined(conds, " OR ", args)),
            Self::And(conds) => format!("({})", render_joined(conds, " AND ", args)),
        }
    }
}

fn render_joined(conds: &[Condition], sep: &str, args: &mut SqlArgs) -> String {
    conds
        .iter()
        .map(|c| c.render(args))
        .collect::<Vec<_>>()
        .join(sep)
}

// ── Ordering ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

pub(crate) fn order_by_clause(order: &[OrderBy]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let parts = order
        .iter()
        .map(|o| format!("{} {}", o.column, if o.descending { "DESC" } else { "ASC" }))
        .collect::<Vec<_>>();
    format!(" ORDER BY {}", parts.join(", "))
}

// ── Entity contract ───────────────────────────────────────────

/// Row-side view of an entity the builders can read column values from.
pub trait Entity: Send + Sync {
    fn id(&self) -> Uuid;

    /// Bound value for `column`; `None` when the entity has no such column.
    fn value(&self, column: &str) -> Option<SqlArg>;

    /// Parent the row hangs under when stored as `resource_type`.
    fn parent(&self, _resource_type: ResourceType) -> Option<(ResourceType, Uuid)> {
        None
    }
}

pub(crate) fn column_values(
    entity: &dyn Entity,
    resource_type: ResourceType,
    columns: &[&str],
) -> Result<Vec<SqlArg>> {
    columns
        .iter()
        .map(|col| {
            entity.value(col).ok_or_else(|| {
                CompassError::internal(format!("{resource_type} entity has no value for column {col}"))
            })
        })
        .collect()
}

// ── Tenant isolation ──────────────────────────────────────────

/// Fragment restricting rows to `tenant`. `owner` narrows to rows the
/// tenant owns, used for mutations.
pub(crate) fn tenant_isolation(
    resource_type: ResourceType,
    tenant: TenantId,
    owner: bool,
    args: &mut SqlArgs,
) -> Result<String> {
    if let Some(table) = resource_type.tenant_access_table() {
        let placeholder = args.push(tenant);
        let owner_clause = if owner { " AND owner = true" } else { "" };
        return Ok(format!(
            "(id IN (SELECT id FROM {table} WHERE tenant_id = {placeholder}{owner_clause}))"
        ));
    }
    if let Some(column) = resource_type.embedded_tenant_column() {
        return Ok(format!("{column} = {}", args.push(tenant)));
    }
    Err(CompassError::internal(format!(
        "entity {resource_type} does not have access table or embedded tenant column"
    )))
}

/// ` WHERE <conds> AND <isolation>`, or an empty string when there is
/// nothing to filter on. Conditions take placeholders before isolation.
pub(crate) fn filter_clause(
    resource_type: ResourceType,
    conds: &[Condition],
    tenant: Option<TenantId>,
    owner: bool,
    args: &mut SqlArgs,
) -> Result<String> {
    let mut parts = conds.iter().map(|c| c.render(args)).collect::<Vec<_>>();
    if let Some(tenant) = tenant {
        parts.push(tenant_isolation(resource_type, tenant, owner, args)?);
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

// ── Execution ─────────────────────────────────────────────────

pub(crate) async fn execute(
    conn: &mut PgConnection,
    sql: &str,
    args: SqlArgs,
    resource_type: ResourceType,
    op: SqlOperation,
) -> Result<u64> {
    debug!(%resource_type, %op, sql, "executing statement");
    let done = sqlx::query_with(sql, args.into_pg()?)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sql_error(e, resource_type, op))?;
    Ok(done.rows_affected())
}

pub(crate) async fn fetch_all<R: Row>(
    conn: &mut PgConnection,
    sql: &str,
    args: SqlArgs,
    resource_type: ResourceType,
    op: SqlOperation,
) -> Result<Vec<R>> {
    debug!(%resource_type, %op, sql, "executing query");
    sqlx::query_as_with::<_, R, _>(sql, args.into_pg()?)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sql_error(e, resource_type, op))
}

pub(crate) async fn fetch_any(
    conn: &mut PgConnection,
    sql: &str,
    args: SqlArgs,
    resource_type: ResourceType,
) -> Result<bool> {
    debug!(%resource_type, sql, "executing exists query");
    let row = sqlx::query_with(sql, args.into_pg()?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sql_error(e, resource_type, SqlOperation::Exists))?;
    Ok(row.is_some())
}

pub(crate) async fn fetch_count(
    conn: &mut PgConnection,
    sql: &str,
    args: SqlArgs,
    resource_type: ResourceType,
) -> Result<i64> {
    debug!(%resource_type, sql, "executing count query");
    sqlx::query_scalar_with::<_, i64, _>(sql, args.into_pg()?)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sql_error(e, resource_type, SqlOperation::List))
}

/// Value of the `id` equality condition, for not-found messages.
pub(crate) fn id_hint(conds: &[Condition]) -> String {
    conds
        .iter()
        .find_map(|c| match c {
            Condition::Equal(col, SqlArg::Uuid(Some(id))) if col == "id" => Some(id.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId(Uuid::nil())
    }

    #[test]
    fn placeholders_follow_render_order() {
        let mut args = SqlArgs::default();
        let conds = [
            Condition::equal("name", "foo"),
            Condition::in_values("id", [Uuid::nil(), Uuid::from_u128(1)]),
            Condition::is_null("app_template_version_id"),
        ];
        let sql = filter_clause(ResourceType::Api, &conds, None, false, &mut args).unwrap();
        assert_eq!(sql, " WHERE name = $1 AND id IN ($2, $3) AND app_template_version_id IS NULL");
        assert_eq!(args.as_slice().len(), 3);
    }

    #[test]
    fn subquery_arguments_are_renumbered() {
        let mut args = SqlArgs::default();
        args.push("first");
        let cond = Condition::in_subquery(
            "bundle_id",
            "SELECT id FROM bundles WHERE app_id = ? AND name = ?",
            vec![SqlArg::from(Uuid::nil()), SqlArg::from("b")],
        );
        assert_eq!(
            cond.render(&mut args),
            "bundle_id IN (SELECT id FROM bundles WHERE app_id = $2 AND name = $3)"
        );
    }

    #[test]
    fn nested_or_is_parenthesised() {
        let mut args = SqlArgs::default();
        let cond = Condition::Or(vec![
            Condition::equal("a", 1_i64),
            Condition::And(vec![Condition::not_null("b"), Condition::not_equal("c", "x")]),
        ]);
        assert_eq!(cond.render(&mut args), "(a = $1 OR (b IS NOT NULL AND c != $2))");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let mut args = SqlArgs::default();
        let cond = Condition::in_values::<Uuid>("id", []);
        assert_eq!(cond.render(&mut args), "id IN (NULL)");
        assert!(args.as_slice().is_empty());
    }

    #[test]
    fn order_by_renders_directions() {
        assert_eq!(order_by_clause(&[]), "");
        assert_eq!(
            order_by_clause(&[OrderBy::asc("name"), OrderBy::desc("created_at")]),
            " ORDER BY name ASC, created_at DESC"
        );
    }

    #[test]
    fn access_table_isolation() {
        let mut args = SqlArgs::default();
        assert_eq!(
            tenant_isolation(ResourceType::Api, tenant(), false, &mut args).unwrap(),
            "(id IN (SELECT id FROM api_definitions_tenants WHERE tenant_id = $1))"
        );
        assert_eq!(
            tenant_isolation(ResourceType::Bundle, tenant(), true, &mut args).unwrap(),
            "(id IN (SELECT id FROM bundles_tenants WHERE tenant_id = $2 AND owner = true))"
        );
    }

    #[test]
    fn embedded_tenant_isolation() {
        let mut args = SqlArgs::default();
        assert_eq!(
            tenant_isolation(ResourceType::Destination, tenant(), true, &mut args).unwrap(),
            "tenant_id = $1"
        );
    }

    #[test]
    fn global_resources_have_no_isolation() {
        let mut args = SqlArgs::default();
        let err = tenant_isolation(ResourceType::BundleReference, tenant(), false, &mut args).unwrap_err();
        assert_eq!(err.http_status(), 500);
    }
}
