use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::{CompassError, Result};
use compass_core::model::{BundleReference, BundleReferenceObjectType};
use compass_core::ports::BundleReferenceRepository;
use compass_core::resource::ResourceType;

use crate::repo::{Condition, Creator, Deleter, Entity, Lister, OrderBy, SingleGetter, SqlArg, UnionLister, Updater};

pub(crate) const TABLE: &str = "bundle_references";

const COLUMNS: &[&str] = &[
    "id",
    "bundle_id",
    "api_def_id",
    "event_def_id",
    "api_def_url",
    "is_default_bundle",
];

const UPDATABLE_COLUMNS: &[&str] = &["bundle_id", "api_def_id", "event_def_id", "api_def_url", "is_default_bundle"];

const CREATOR: Creator = Creator::new(ResourceType::BundleReference, TABLE, COLUMNS);
const GETTER: SingleGetter = SingleGetter::new(ResourceType::BundleReference, TABLE, COLUMNS);
const LISTER: Lister = Lister::new(ResourceType::BundleReference, TABLE, COLUMNS);
const UNION_LISTER: UnionLister = UnionLister::new(ResourceType::BundleReference, TABLE, COLUMNS);
const UPDATER: Updater = Updater::new(ResourceType::BundleReference, TABLE, UPDATABLE_COLUMNS, &["id"]);
const DELETER: Deleter = Deleter::new(ResourceType::BundleReference, TABLE);

/// Column holding the referenced object's ID.
fn object_column(object_type: BundleReferenceObjectType) -> &'static str {
    match object_type {
        BundleReferenceObjectType::Api => "api_def_id",
        BundleReferenceObjectType::Event => "event_def_id",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BundleReferenceRow {
    pub id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub api_def_id: Option<Uuid>,
    pub event_def_id: Option<Uuid>,
    pub api_def_url: Option<String>,
    pub is_default_bundle: Option<bool>,
}

impl From<&BundleReference> for BundleReferenceRow {
    fn from(reference: &BundleReference) -> Self {
        let (api_def_id, event_def_id) = match reference.object_type {
            BundleReferenceObjectType::Api => (reference.object_id, None),
            BundleReferenceObjectType::Event => (None, reference.object_id),
        };
        Self {
            id: reference.id,
            bundle_id: reference.bundle_id,
            api_def_id,
            event_def_id,
            api_def_url: reference.api_default_target_url.clone(),
            is_default_bundle: reference.is_default_bundle,
        }
    }
}

impl TryFrom<BundleReferenceRow> for BundleReference {
    type Error = CompassError;

    fn try_from(row: BundleReferenceRow) -> Result<Self> {
        let (object_type, object_id) = match (row.api_def_id, row.event_def_id) {
            (Some(api), None) => (BundleReferenceObjectType::Api, api),
            (None, Some(event)) => (BundleReferenceObjectType::Event, event),
            _ => {
                return Err(CompassError::internal(format!(
                    "bundle reference {} must reference exactly one API or event definition",
                    row.id
                )))
            }
        };
        Ok(Self {
            id: row.id,
            bundle_id: row.bundle_id,
            object_type,
            object_id: Some(object_id),
            api_default_target_url: row.api_def_url,
            is_default_bundle: row.is_default_bundle,
        })
    }
}

impl Entity for BundleReferenceRow {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(self.id.into()),
            "bundle_id" => Some(self.bundle_id.into()),
            "api_def_id" => Some(self.api_def_id.into()),
            "event_def_id" => Some(self.event_def_id.into()),
            "api_def_url" => Some(self.api_def_url.clone().into()),
            "is_default_bundle" => Some(self.is_default_bundle.into()),
            _ => None,
        }
    }
}

fn into_models(rows: Vec<BundleReferenceRow>) -> Result<Vec<BundleReference>> {
    rows.into_iter().map(BundleReference::try_from).collect()
}

/// References are shared rows; every call here is global and callers
/// establish visibility through the referenced bundle or definition.
pub struct PgBundleReferenceRepository;

#[async_trait]
impl BundleReferenceRepository<PgConnection> for PgBundleReferenceRepository {
    async fn create(&self, conn: &mut PgConnection, item: &BundleReference) -> Result<()> {
        debug!(id = %item.id, bundle_id = ?item.bundle_id, object_type = %item.object_type, "creating bundle reference");
        CREATOR.create_global(conn, &BundleReferenceRow::from(item)).await
    }

    async fn update(&self, conn: &mut PgConnection, item: &BundleReference) -> Result<()> {
        UPDATER.update_single_global(conn, &BundleReferenceRow::from(item)).await
    }

    async fn get_by_id(
        &self,
        conn: &mut PgConnection,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<BundleReference> {
        let mut conds = vec![Condition::equal(object_column(object_type), object_id)];
        if let Some(bundle_id) = bundle_id {
            conds.push(Condition::equal("bundle_id", bundle_id));
        }
        let row: BundleReferenceRow = GETTER.get_global(conn, &conds, &[]).await?;
        row.try_into()
    }

    async fn get_bundle_ids_for_object(
        &self,
        conn: &mut PgConnection,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let conds = [Condition::equal(object_column(object_type), object_id)];
        let rows: Vec<BundleReferenceRow> = LISTER.list_global(conn, &conds, &[OrderBy::asc("bundle_id")]).await?;
        Ok(rows.into_iter().filter_map(|r| r.bundle_id).collect())
    }

    async fn list_by_bundle_id(&self, conn: &mut PgConnection, bundle_id: Uuid) -> Result<Vec<BundleReference>> {
        let conds = [Condition::equal("bundle_id", bundle_id)];
        let rows: Vec<BundleReferenceRow> = LISTER.list_global(conn, &conds, &[OrderBy::asc("id")]).await?;
        into_models(rows)
    }

    async fn list_by_bundle_ids(
        &self,
        conn: &mut PgConnection,
        object_type: BundleReferenceObjectType,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<BundleReference>, HashMap<Uuid, i64>)> {
        let column = object_column(object_type);
        let (rows, totals): (Vec<BundleReferenceRow>, _) = UNION_LISTER
            .list_global(
                conn,
                "bundle_id",
                bundle_ids,
                page_size,
                cursor,
                &[OrderBy::asc(column)],
                &[Condition::not_null(column)],
            )
            .await?;
        Ok((into_models(rows)?, totals))
    }

    async fn delete_by_reference_object_id(
        &self,
        conn: &mut PgConnection,
        bundle_id: Uuid,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let conds = [
            Condition::equal(object_column(object_type), object_id),
            Condition::equal("bundle_id", bundle_id),
        ];
        DELETER.delete_one_global(conn, &conds).await
    }

    async fn delete_all_for_object(
        &self,
        conn: &mut PgConnection,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let conds = [Condition::equal(object_column(object_type), object_id)];
        let deleted = DELETER.delete_many_global(conn, &conds).await?;
        debug!(%object_id, %object_type, deleted, "deleted bundle references of object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::model::BundleReferenceInput;

    #[test]
    fn api_reference_fills_api_column() {
        let reference = BundleReferenceInput {
            api_default_target_url: Some("https://a.example".into()),
            is_default_bundle: Some(true),
        }
        .to_bundle_reference(
            Uuid::from_u128(1),
            Some(Uuid::from_u128(2)),
            BundleReferenceObjectType::Api,
            Some(Uuid::from_u128(3)),
        );
        let row = BundleReferenceRow::from(&reference);
        assert_eq!(row.api_def_id, Some(Uuid::from_u128(3)));
        assert_eq!(row.event_def_id, None);
        assert_eq!(BundleReference::try_from(row).unwrap(), reference);
    }

    #[test]
    fn event_reference_drops_target_url() {
        let reference = BundleReferenceInput {
            api_default_target_url: Some("https://a.example".into()),
            is_default_bundle: None,
        }
        .to_bundle_reference(
            Uuid::from_u128(1),
            Some(Uuid::from_u128(2)),
            BundleReferenceObjectType::Event,
            Some(Uuid::from_u128(4)),
        );
        let row = BundleReferenceRow::from(&reference);
        assert_eq!(row.value("event_def_id"), Some(SqlArg::from(Uuid::from_u128(4))));
        assert_eq!(row.value("api_def_url"), Some(SqlArg::Text(None)));
        assert_eq!(BundleReference::try_from(row).unwrap(), reference);
    }

    #[test]
    fn row_without_object_is_rejected() {
        let row = BundleReferenceRow {
            id: Uuid::from_u128(1),
            bundle_id: None,
            api_def_id: None,
            event_def_id: None,
            api_def_url: None,
            is_default_bundle: None,
        };
        assert!(BundleReference::try_from(row).is_err());
    }
}
