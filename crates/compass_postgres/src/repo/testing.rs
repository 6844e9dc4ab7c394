use uuid::Uuid;

use compass_core::resource::ResourceType;

use super::{Entity, SqlArg};

pub(crate) const APP_ID: Uuid = Uuid::from_u128(0xa);
pub(crate) const ENTITY_ID: Uuid = Uuid::from_u128(0xe);

/// Minimal API-shaped row: `id`, `app_id`, `name`.
pub(crate) struct TestEntity {
    pub name: &'static str,
}

impl Entity for TestEntity {
    fn id(&self) -> Uuid {
        ENTITY_ID
    }

    fn value(&self, column: &str) -> Option<SqlArg> {
        match column {
            "id" => Some(ENTITY_ID.into()),
            "app_id" => Some(APP_ID.into()),
            "name" => Some(self.name.into()),
            _ => None,
        }
    }

    fn parent(&self, _: ResourceType) -> Option<(ResourceType, Uuid)> {
        Some((ResourceType::Application, APP_ID))
    }
}
