use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::{Label, LabelableObject};
use compass_core::ports::LabelRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use crate::repo::{Condition, Creator, Entity, SingleGetter, SqlArg};

pub(crate) const TABLE: &str = "labels";

const COLUMNS: &[&str] = &["id", "tenant_id", "key", "value", "app_id", "runtime_id"];

const CREATOR: Creator = Creator::new(ResourceType::Label, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Label, TABLE, COLUMNS);

/// The labelled object is encoded by which reference column is set; a
/// label with neither is a tenant label on `tenant_id` itself.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LabelRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub key: String,
    pub value: JsonValue,
    pub app_id: Option<Uuid>,
    pub runtime_id: Option<Uuid>,
}

impl TryFrom<&Label> for LabelRow {
    type Error = CompassError;

    fn try_from(label: &Label) -> Result<Self> {
        let (app_id, runtime_id) = match label.object_type {
            LabelableObject::Application => (Some(label.object_id), None),
            LabelableObject::Runtime => (None, Some(label.object_id)),
            LabelableObject::Tenant if label.object_id == label.tenant_id.as_uuid() => (None, None),
            LabelableObject::Tenant => {
                return Err(CompassError::InvalidData(format!(
                    "tenant label {} must be stored under the labelled tenant",
                    label.key
                )))
            }
        };
        Ok(Self {
            id: label.id,
            tenant_id: label.tenant_id.as_uuid(),
            key: label.key.clone(),
            value: label.value.clone(),
            app_id,
            runtime_id,
        })
    }
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        let (object_type, object_id) = match (row.app_id, row.runtime_id) {
            (Some(app), _) => (LabelableObject::Application, app),
            (None, Some(runtime)) => (LabelableObject::Runtime, runtime),
            (None, None) => (LabelableObject::Tenant, row.tenant_id),
        };
        Self {
            id: row.id,
            tenant_id: TenantId(row.tenant_id),
            key: row.key,
            value: row.value,
            object_type,
            object_id,
        }
    }
}

impl Entity for LabelRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "tenant_id" => Some(self.tenant_id.into()),
            "key" => Some(self.key.as_str().into()),
            "value" => Some(Some(self.value.clone()).into()),
            "app_id" => Some(self.app_id.into()),
            "runtime_id" => Some(self.runtime_id.into()),
            _ => None,
        }
    }
}

/// Conditions selecting labels of one object.
fn object_conditions(object_type: LabelableObject, object_id: Uuid) -> Vec<Condition> {
    match object_type {
        LabelableObject::Application => vec![Condition::equal("app_id", object_id)],
        LabelableObject::Runtime => vec![Condition::equal("runtime_id", object_id)],
        LabelableObject::Tenant => vec![
            Condition::equal("tenant_id", object_id),
            Condition::is_null("app_id"),
            Condition::is_null("runtime_id"),
        ],
    }
}

pub struct PgLabelRepository;

#[async_trait]
impl LabelRepository<PgConnection> for PgLabelRepository {
    async fn create(&self, conn: &mut PgConnection, item: &Label) -> Result<()> {
        let row = LabelRow::try_from(item)?;
        CREATOR.create(conn, item.tenant_id, &row).await
    }

    async fn get_by_key(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        object_type: LabelableObject,
        object_id: Uuid,
        key: &str,
    ) -> Result<Label> {
        let mut conds = vec![Condition::equal("key", key)];
        conds.extend(object_conditions(object_type, object_id));
        let row: LabelRow = GETTER
            .get(conn, tenant, &conds, &[])
            .await
            .map_err(|e| match e {
                CompassError::NotFound { .. } => CompassError::not_found(ResourceType::Label, key),
                other => other,
            })?;
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::repo::SqlArgs;

    fn label(object_type: LabelableObject, object_id: Uuid) -> Label {
        Label {
            id: Uuid::from_u128(1),
            tenant_id: TenantId(Uuid::from_u128(2)),
            key: "subdomain".into(),
            value: json!("consumer"),
            object_type,
            object_id,
        }
    }

    #[test]
    fn tenant_label_round_trips() {
        let label = label(LabelableObject::Tenant, Uuid::from_u128(2));
        let row = LabelRow::try_from(&label).unwrap();
        assert_eq!((row.app_id, row.runtime_id), (None, None));
        assert_eq!(Label::from(row), label);
    }

    #[test]
    fn application_label_round_trips() {
        let label = label(LabelableObject::Application, Uuid::from_u128(7));
        let row = LabelRow::try_from(&label).unwrap();
        assert_eq!(row.value("app_id"), Some(SqlArg::from(Uuid::from_u128(7))));
        assert_eq!(row.value("value"), Some(SqlArg::Json(Some(json!("consumer")))));
        assert_eq!(Label::from(row), label);
    }

    #[test]
    fn tenant_label_for_other_tenant_is_rejected() {
        let label = label(LabelableObject::Tenant, Uuid::from_u128(9));
        assert_eq!(LabelRow::try_from(&label).unwrap_err().http_status(), 400);
    }

    #[test]
    fn tenant_label_lookup_excludes_object_labels() {
        let mut args = SqlArgs::default();
        let sql = object_conditions(LabelableObject::Tenant, Uuid::nil())
            .iter()
            .map(|c| c.render(&mut args))
            .collect::<Vec<_>>()
            .join(" AND ");
        assert_eq!(sql, "tenant_id = $1 AND app_id IS NULL AND runtime_id IS NULL");
    }
}
