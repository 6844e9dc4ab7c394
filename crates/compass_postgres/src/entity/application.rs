use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::Result;
use compass_core::model::Application;
use compass_core::ports::ApplicationRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::BaseRow;
use crate::repo::{Condition, Creator, Deleter, Entity, ExistQuerier, Lister, OrderBy, SingleGetter, SqlArg};

pub(crate) const TABLE: &str = "applications";

const COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "base_url",
    "system_number",
    "local_tenant_id",
    "ready",
    "created_at",
    "updated_at",
    "deleted_at",
    "error",
];

const CREATOR: Creator = Creator::new(ResourceType::Application, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Application, TABLE, COLUMNS);
const EXISTS: ExistQuerier = ExistQuerier::new(ResourceType::Application, TABLE);
const LISTER: Lister = Lister::new(ResourceType::Application, TABLE, COLUMNS);
const DELETER: Deleter = Deleter::new(ResourceType::Application, TABLE);

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub system_number: Option<String>,
    pub local_tenant_id: Option<String>,
    #[sqlx(flatten)]
    pub base: BaseRow,
}

impl From<&Application> for ApplicationRow {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id,
            name: app.name.clone(),
            description: app.description.clone(),
            base_url: app.base_url.clone(),
            system_number: app.system_number.clone(),
            local_tenant_id: app.local_tenant_id.clone(),
            base: BaseRow::from(&app.base),
        }
    }
}

impl From<ApplicationRow> for Application {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            base_url: row.base_url,
            system_number: row.system_number,
            local_tenant_id: row.local_tenant_id,
            base: row.base.into(),
        }
    }
}

impl Entity for ApplicationRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "description" => Some(self.description.clone().into()),
            "base_url" => Some(self.base_url.clone().into()),
            "system_number" => Some(self.system_number.clone().into()),
            "local_tenant_id" => Some(self.local_tenant_id.clone().into()),
            other => self.base.value(other),
        }
    }
}

/// Applications are the only top-level resource: creating one grants
/// owner access to the tenant and all of its ancestors.
pub struct PgApplicationRepository;

#[async_trait]
impl ApplicationRepository<PgConnection> for PgApplicationRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &Application) -> Result<()> {
        debug!(id = %item.id, %tenant, "creating application");
        CREATOR.create(conn, tenant, &ApplicationRow::from(item)).await
    }

    async fn get_by_id(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<Application> {
        let row: ApplicationRow = GETTER.get(conn, tenant, &[Condition::equal("id", id)], &[]).await?;
        Ok(row.into())
    }

    async fn exists(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<bool> {
        EXISTS.exists(conn, tenant, &[Condition::equal("id", id)]).await
    }

    async fn list(&self, conn: &mut PgConnection, tenant: TenantId) -> Result<Vec<Application>> {
        let rows: Vec<ApplicationRow> = LISTER.list(conn, tenant, &[], &[OrderBy::asc("name")]).await?;
        Ok(rows.into_iter().map(Application::from).collect())
    }

    async fn delete(&self, conn: &mut PgConnection, tenant: TenantId, id: Uuid) -> Result<()> {
        DELETER.delete_one(conn, tenant, &[Condition::equal("id", id)]).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use compass_core::model::ApplicationInput;

    fn app() -> Application {
        ApplicationInput {
            name: "foo".into(),
            base_url: Some("https://foo.example".into()),
            local_tenant_id: Some("sys-1".into()),
            ..Default::default()
        }
        .to_application(Uuid::from_u128(1), Utc::now())
    }

    #[test]
    fn row_conversion_keeps_every_field() {
        let app = app();
        let row = ApplicationRow::from(&app);
        assert_eq!(Application::from(row), app);
    }

    #[test]
    fn every_column_has_a_value() {
        let row = ApplicationRow::from(&app());
        for column in COLUMNS {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
        assert_eq!(row.value("local_tenant_id"), Some(SqlArg::from("sys-1")));
        assert_eq!(row.value("bogus"), None);
    }
}
