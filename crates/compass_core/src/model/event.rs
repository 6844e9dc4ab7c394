use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::api::hash_to_string;
use super::{BaseEntity, Version};
use crate::pagination::Page;
use crate::resource::ResourceType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub application_template_version_id: Option<Uuid>,
    pub package_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub ord_id: Option<String>,
    pub short_description: Option<String>,
    pub tags: Option<JsonValue>,
    pub visibility: Option<String>,
    pub version: Option<Version>,
    pub resource_hash: Option<String>,
    pub base: BaseEntity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventDefinitionInput {
    pub ord_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub short_description: Option<String>,
    pub tags: Option<JsonValue>,
    pub visibility: Option<String>,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinitionPage {
    pub data: Vec<EventDefinition>,
    pub page_info: Page,
    pub total_count: i64,
}

impl EventDefinitionInput {
    pub fn to_event_definition(
        &self,
        id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        package_id: Option<String>,
        hash: u64,
        now: DateTime<Utc>,
    ) -> EventDefinition {
        let (application_id, application_template_version_id) = if resource_type.is_tenant_ignorable() {
            (None, Some(resource_id))
        } else {
            (Some(resource_id), None)
        };
        EventDefinition {
            id,
            application_id,
            application_template_version_id,
            package_id,
            name: self.name.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
            ord_id: self.ord_id.clone(),
            short_description: self.short_description.clone(),
            tags: self.tags.clone(),
            visibility: self.visibility.clone(),
            version: self.version.clone(),
            resource_hash: hash_to_string(hash),
            base: BaseEntity::new_ready(now),
        }
    }
}
