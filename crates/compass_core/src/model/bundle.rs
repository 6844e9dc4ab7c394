use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::BaseEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_input_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
    pub ord_id: Option<String>,
    pub local_tenant_id: Option<String>,
    pub short_description: Option<String>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    pub tags: Option<JsonValue>,
    /// JSON array of correlation IDs matched against destinations.
    pub correlation_ids: Option<JsonValue>,
    pub resource_hash: Option<String>,
    pub base: BaseEntity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BundleInput {
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_input_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
    pub ord_id: Option<String>,
    pub local_tenant_id: Option<String>,
    pub short_description: Option<String>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    pub tags: Option<JsonValue>,
    pub correlation_ids: Option<JsonValue>,
}

impl BundleInput {
    pub fn to_bundle(
        &self,
        id: Uuid,
        application_id: Uuid,
        resource_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> Bundle {
        Bundle {
            id,
            application_id: Some(application_id),
            name: self.name.clone(),
            description: self.description.clone(),
            instance_auth_request_input_schema: self.instance_auth_request_input_schema.clone(),
            default_instance_auth: self.default_instance_auth.clone(),
            ord_id: self.ord_id.clone(),
            local_tenant_id: self.local_tenant_id.clone(),
            short_description: self.short_description.clone(),
            links: self.links.clone(),
            labels: self.labels.clone(),
            tags: self.tags.clone(),
            correlation_ids: self.correlation_ids.clone(),
            resource_hash,
            base: BaseEntity::new_ready(now),
        }
    }
}

impl Bundle {
    /// Full-row replace from `input`, keeping identity, parent and audit fields.
    pub fn set_from_update_input(&mut self, input: &BundleInput, now: DateTime<Utc>) {
        self.name = input.name.clone();
        self.description = input.description.clone();
        self.instance_auth_request_input_schema = input.instance_auth_request_input_schema.clone();
        self.default_instance_auth = input.default_instance_auth.clone();
        self.ord_id = input.ord_id.clone();
        self.local_tenant_id = input.local_tenant_id.clone();
        self.short_description = input.short_description.clone();
        self.links = input.links.clone();
        self.labels = input.labels.clone();
        self.tags = input.tags.clone();
        self.correlation_ids = input.correlation_ids.clone();
        self.base.updated_at = Some(now);
    }

    pub fn has_correlation_id(&self, correlation_id: &str) -> bool {
        match &self.correlation_ids {
            Some(JsonValue::Array(ids)) => ids.iter().any(|id| id.as_str() == Some(correlation_id)),
            _ => false,
        }
    }
}
