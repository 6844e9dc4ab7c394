use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::{ApiSpecType, EventSpecType, Spec, SpecFormat, SpecReferenceObjectType};
use compass_core::ports::SpecRepository;
use compass_core::resource::ResourceType;
use compass_core::tenant::TenantId;

use super::parse_column;
use crate::repo::{Condition, Creator, Deleter, Entity, Lister, OrderBy, SingleGetter, SqlArg, Updater};

pub(crate) const TABLE: &str = "specifications";

const COLUMNS: &[&str] = &[
    "id",
    "api_def_id",
    "event_def_id",
    "spec_data",
    "api_spec_format",
    "api_spec_type",
    "event_spec_format",
    "event_spec_type",
    "custom_type",
];

const UPDATABLE_COLUMNS: &[&str] = &[
    "spec_data",
    "api_spec_format",
    "api_spec_type",
    "event_spec_format",
    "event_spec_type",
    "custom_type",
];

const CREATOR: Creator = Creator::new(ResourceType::Specification, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::Specification, TABLE, COLUMNS);
const LISTER: Lister = Lister::new(ResourceType::Specification, TABLE, COLUMNS);
const UPDATER: Updater = Updater::new(ResourceType::Specification, TABLE, UPDATABLE_COLUMNS, &["id"]);
const DELETER: Deleter = Deleter::new(ResourceType::Specification, TABLE);

fn reference_column(object_type: SpecReferenceObjectType) -> &'static str {
    match object_type {
        SpecReferenceObjectType::ApiSpec => "api_def_id",
        SpecReferenceObjectType::EventSpec => "event_def_id",
    }
}

/// API and event specs keep format and type in separate column pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct SpecRow {
    pub id: Uuid,
    pub api_def_id: Option<Uuid>,
    pub event_def_id: Option<Uuid>,
    pub spec_data: Option<String>,
    pub api_spec_format: Option<String>,
    pub api_spec_type: Option<String>,
    pub event_spec_format: Option<String>,
    pub event_spec_type: Option<String>,
    pub custom_type: Option<String>,
}

impl From<&Spec> for SpecRow {
    fn from(spec: &Spec) -> Self {
        let mut row = Self {
            id: spec.id,
            spec_data: spec.data.clone(),
            custom_type: spec.custom_type.clone(),
            ..Default::default()
        };
        match spec.object_type {
            SpecReferenceObjectType::ApiSpec => {
                row.api_def_id = Some(spec.object_id);
                row.api_spec_format = Some(spec.format.to_string());
                row.api_spec_type = spec.api_type.map(|t| t.to_string());
            }
            SpecReferenceObjectType::EventSpec => {
                row.event_def_id = Some(spec.object_id);
                row.event_spec_format = Some(spec.format.to_string());
                row.event_spec_type = spec.event_type.map(|t| t.to_string());
            }
        }
        row
    }
}

impl TryFrom<SpecRow> for Spec {
    type Error = CompassError;

    fn try_from(row: SpecRow) -> Result<Self> {
        let (object_type, object_id, raw_format) = match (row.api_def_id, row.event_def_id) {
            (Some(api), None) => (SpecReferenceObjectType::ApiSpec, api, row.api_spec_format.as_deref()),
            (None, Some(event)) => (SpecReferenceObjectType::EventSpec, event, row.event_spec_format.as_deref()),
            _ => {
                return Err(CompassError::internal(format!(
                    "specification {} must reference exactly one API or event definition",
                    row.id
                )))
            }
        };
        let format: SpecFormat = match raw_format {
            Some(raw) => parse_column("spec_format", raw)?,
            None => return Err(CompassError::internal(format!("specification {} has no format", row.id))),
        };
        let api_type = row
            .api_spec_type
            .as_deref()
            .map(|raw| parse_column::<ApiSpecType>("api_spec_type", raw))
            .transpose()?;
        let event_type = row
            .event_spec_type
            .as_deref()
            .map(|raw| parse_column::<EventSpecType>("event_spec_type", raw))
            .transpose()?;

        Ok(Self {
            id: row.id,
            object_type,
            object_id,
            data: row.spec_data,
            format,
            api_type,
            event_type,
            custom_type: row.custom_type,
        })
    }
}

impl Entity for SpecRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "api_def_id" => Some(self.api_def_id.into()),
            "event_def_id" => Some(self.event_def_id.into()),
            "spec_data" => Some(self.spec_data.clone().into()),
            "api_spec_format" => Some(self.api_spec_format.clone().into()),
            "api_spec_type" => Some(self.api_spec_type.clone().into()),
            "event_spec_format" => Some(self.event_spec_format.clone().into()),
            "event_spec_type" => Some(self.event_spec_type.clone().into()),
            "custom_type" => Some(self.custom_type.clone().into()),
            _ => None,
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        match (self.api_def_id, self.event_def_id) {
            (Some(api), _) => Some((ResourceType::Api, api)),
            (None, Some(event)) => Some((ResourceType::EventDefinition, event)),
            (None, None) => None,
        }
    }
}

fn into_models(rows: Vec<SpecRow>) -> Result<Vec<Spec>> {
    rows.into_iter().map(Spec::try_from).collect()
}

pub struct PgSpecRepository;

#[async_trait]
impl SpecRepository<PgConnection> for PgSpecRepository {
    async fn create(&self, conn: &mut PgConnection, tenant: TenantId, item: &Spec) -> Result<()> {
        debug!(id = %item.id, object_type = %item.object_type, object_id = %item.object_id, "creating specification");
        CREATOR.create(conn, tenant, &SpecRow::from(item)).await
    }

    async fn create_global(&self, conn: &mut PgConnection, item: &Spec) -> Result<()> {
        CREATOR.create_global(conn, &SpecRow::from(item)).await
    }

    async fn get_by_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        id: Uuid,
        object_type: SpecReferenceObjectType,
    ) -> Result<Spec> {
        let conds = [
            Condition::equal("id", id),
            Condition::not_null(reference_column(object_type)),
        ];
        let row: SpecRow = GETTER.get(conn, tenant, &conds, &[]).await?;
        row.try_into()
    }

    async fn list_by_reference_object_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>> {
        let conds = [Condition::equal(reference_column(object_type), object_id)];
        let rows: Vec<SpecRow> = LISTER.list(conn, tenant, &conds, &[OrderBy::asc("id")]).await?;
        into_models(rows)
    }

    async fn list_by_reference_object_id_global(
        &self,
        conn: &mut PgConnection,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>> {
        let conds = [Condition::equal(reference_column(object_type), object_id)];
        let rows: Vec<SpecRow> = LISTER.list_global(conn, &conds, &[OrderBy::asc("id")]).await?;
        into_models(rows)
    }

    async fn list_by_reference_object_ids(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_ids: &[Uuid],
    ) -> Result<Vec<Spec>> {
        if object_ids.is_empty() {
            return Ok(Vec::new());
        }
        let column = reference_column(object_type);
        let conds = [Condition::in_values(column, object_ids.iter().copied())];
        let rows: Vec<SpecRow> = LISTER
            .list(conn, tenant, &conds, &[OrderBy::asc(column), OrderBy::asc("id")])
            .await?;
        into_models(rows)
    }

    async fn update(&self, conn: &mut PgConnection, tenant: TenantId, item: &Spec) -> Result<()> {
        UPDATER.update_single(conn, tenant, &SpecRow::from(item)).await
    }

    async fn update_global(&self, conn: &mut PgConnection, item: &Spec) -> Result<()> {
        UPDATER.update_single_global(conn, &SpecRow::from(item)).await
    }

    async fn delete_by_reference_object_id(
        &self,
        conn: &mut PgConnection,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let conds = [Condition::equal(reference_column(object_type), object_id)];
        DELETER.delete_many(conn, tenant, &conds).await?;
        Ok(())
    }

    async fn delete_by_reference_object_id_global(
        &self,
        conn: &mut PgConnection,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let conds = [Condition::equal(reference_column(object_type), object_id)];
        DELETER.delete_many_global(conn, &conds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(object_type: SpecReferenceObjectType) -> Spec {
        Spec {
            id: Uuid::from_u128(9),
            object_type,
            object_id: Uuid::from_u128(3),
            data: Some("openapi: 3.0.0".into()),
            format: SpecFormat::Yaml,
            api_type: (object_type == SpecReferenceObjectType::ApiSpec).then_some(ApiSpecType::OpenApiV3),
            event_type: (object_type == SpecReferenceObjectType::EventSpec).then_some(EventSpecType::AsyncApiV2),
            custom_type: None,
        }
    }

    #[test]
    fn api_spec_uses_api_columns() {
        let spec = spec(SpecReferenceObjectType::ApiSpec);
        let row = SpecRow::from(&spec);
        assert_eq!(row.api_spec_format.as_deref(), Some("YAML"));
        assert_eq!(row.api_spec_type.as_deref(), Some("OPEN_API_V3"));
        assert_eq!(row.event_spec_format, None);
        assert_eq!(row.parent(ResourceType::Specification), Some((ResourceType::Api, Uuid::from_u128(3))));
        assert_eq!(Spec::try_from(row).unwrap(), spec);
    }

    #[test]
    fn event_spec_uses_event_columns() {
        let spec = spec(SpecReferenceObjectType::EventSpec);
        let row = SpecRow::from(&spec);
        assert_eq!(row.event_spec_type.as_deref(), Some("ASYNC_API_V2"));
        assert_eq!(row.api_def_id, None);
        for column in COLUMNS {
            assert!(row.value(column).is_some(), "missing value for {column}");
        }
        assert_eq!(Spec::try_from(row).unwrap(), spec);
    }

    #[test]
    fn unknown_format_is_internal() {
        let mut row = SpecRow::from(&spec(SpecReferenceObjectType::ApiSpec));
        row.api_spec_format = Some("TOML".into());
        assert_eq!(Spec::try_from(row).unwrap_err().http_status(), 500);
    }
}
