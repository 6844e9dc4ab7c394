use std::sync::Arc;

use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::graphql::{EntityTypeMapping, EntityTypeMappingInput, EntityTypeMappingPage};
use crate::model;
use crate::resource::ResourceType;
use crate::service::Services;
use crate::tenant::RequestScope;
use crate::transaction::{Transaction, Transactioner};

pub struct EntityTypeMappingResolver<T: Transactioner> {
    transactioner: Arc<T>,
    services: Arc<Services<T::Conn>>,
}

impl<T: Transactioner> EntityTypeMappingResolver<T> {
    pub fn new(transactioner: Arc<T>, services: Arc<Services<T::Conn>>) -> Self {
        Self {
            transactioner,
            services,
        }
    }

    /// Attaches a mapping to an API (`ResourceType::Api`) or event definition
    /// (`ResourceType::EventDefinition`) the caller can see.
    pub async fn add_entity_type_mapping(
        &self,
        scope: &RequestScope,
        resource_type: ResourceType,
        resource_id: Uuid,
        input: &EntityTypeMappingInput,
    ) -> Result<EntityTypeMapping> {
        let mut tx = self.transactioner.begin().await?;

        match resource_type {
            ResourceType::Api => {
                self.services.apis.get(scope, tx.conn(), resource_id).await?;
            }
            ResourceType::EventDefinition => {
                self.services.events.get(scope, tx.conn(), resource_id).await?;
            }
            other => {
                return Err(CompassError::InvalidData(format!(
                    "entity type mappings cannot be attached to {other}"
                )))
            }
        }

        let input = model::EntityTypeMappingInput::from(input);
        let id = self
            .services
            .entity_type_mappings
            .create(scope, tx.conn(), ResourceType::Application, resource_type, resource_id, &input)
            .await?;
        let mapping = self.services.entity_type_mappings.get(scope, tx.conn(), id).await?;

        tx.commit().await?;
        Ok(EntityTypeMapping::from(&mapping))
    }

    pub async fn entity_type_mappings_for_api(
        &self,
        scope: &RequestScope,
        api_id: Uuid,
        first: i64,
        after: &str,
    ) -> Result<EntityTypeMappingPage> {
        let mut tx = self.transactioner.begin().await?;
        let (mappings, page_info, total_count) = self
            .services
            .entity_type_mappings
            .list_by_api_definition_id(scope, tx.conn(), api_id, first, after)
            .await?;
        tx.commit().await?;

        Ok(EntityTypeMappingPage {
            data: mappings.iter().map(EntityTypeMapping::from).collect(),
            page_info,
            total_count,
        })
    }

    pub async fn delete_entity_type_mapping(&self, scope: &RequestScope, id: Uuid) -> Result<EntityTypeMapping> {
        let mut tx = self.transactioner.begin().await?;

        let mapping = self.services.entity_type_mappings.get(scope, tx.conn(), id).await?;
        self.services
            .entity_type_mappings
            .delete(scope, tx.conn(), ResourceType::Application, id)
            .await?;

        tx.commit().await?;
        Ok(EntityTypeMapping::from(&mapping))
    }
}
