use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::BaseEntity;
use crate::error::{CompassError, Result};
use crate::resource::ResourceType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeMapping {
    pub id: Uuid,
    pub api_definition_id: Option<Uuid>,
    pub event_definition_id: Option<Uuid>,
    pub api_model_selectors: Option<JsonValue>,
    pub entity_type_targets: Option<JsonValue>,
    pub base: BaseEntity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityTypeMappingInput {
    pub api_model_selectors: Option<JsonValue>,
    pub entity_type_targets: Option<JsonValue>,
}

impl EntityTypeMappingInput {
    /// Attaches the mapping to exactly one API or event definition.
    pub fn to_entity_type_mapping(
        &self,
        id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EntityTypeMapping> {
        let (api_definition_id, event_definition_id) = match resource_type {
            ResourceType::Api => (Some(resource_id), None),
            ResourceType::EventDefinition => (None, Some(resource_id)),
            other => {
                return Err(CompassError::InvalidData(format!(
                    "entity type mapping cannot be attached to resource type {other}"
                )))
            }
        };
        let mapping = EntityTypeMapping {
            id,
            api_definition_id,
            event_definition_id,
            api_model_selectors: self.api_model_selectors.clone(),
            entity_type_targets: self.entity_type_targets.clone(),
            base: BaseEntity::new_ready(now),
        };
        mapping.validate_parent()?;
        Ok(mapping)
    }
}

impl EntityTypeMapping {
    /// Exactly one of the two parent references must be set.
    pub fn validate_parent(&self) -> Result<()> {
        match (self.api_definition_id, self.event_definition_id) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(CompassError::InvalidData(
                "entity type mapping must reference an API or an event definition".into(),
            )),
            (Some(_), Some(_)) => Err(CompassError::InvalidData(
                "entity type mapping cannot reference both an API and an event definition".into(),
            )),
        }
    }

    pub fn parent(&self) -> Option<(ResourceType, Uuid)> {
        match (self.api_definition_id, self.event_definition_id) {
            (Some(api), _) => Some((ResourceType::Api, api)),
            (None, Some(event)) => Some((ResourceType::EventDefinition, event)),
            (None, None) => None,
        }
    }
}
