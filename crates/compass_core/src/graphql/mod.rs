//! Wire shapes exchanged with API clients.
//!
//! Field names follow the director's GraphQL schema (`targetURL`,
//! `correlationIDs`, ...). Conversion to and from the domain models lives
//! in [`convert`].

pub mod convert;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::model::{ApiSpecType, EventSpecType, SpecFormat};
use crate::pagination::Page;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub value: String,
    pub deprecated: Option<bool>,
    pub deprecated_since: Option<String>,
    pub for_removal: Option<bool>,
}

// ── applications ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRegisterInput {
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub system_number: Option<String>,
    #[serde(rename = "localTenantID")]
    pub local_tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub system_number: Option<String>,
    #[serde(rename = "localTenantID")]
    pub local_tenant_id: Option<String>,
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
}

// ── bundles ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleCreateInput {
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_input_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
    #[serde(rename = "correlationIDs", default)]
    pub correlation_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleUpdateInput {
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_input_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub id: Uuid,
    #[serde(rename = "applicationID")]
    pub application_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub instance_auth_request_input_schema: Option<String>,
    pub default_instance_auth: Option<JsonValue>,
    #[serde(rename = "correlationIDs")]
    pub correlation_ids: Vec<String>,
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ── api definitions ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpecInput {
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: ApiSpecType,
    pub format: SpecFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    pub id: Uuid,
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: Option<ApiSpecType>,
    pub format: SpecFormat,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinitionInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "targetURL")]
    pub target_url: String,
    pub group: Option<String>,
    pub spec: Option<ApiSpecInput>,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    pub id: Uuid,
    #[serde(rename = "bundleID")]
    pub bundle_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub spec: Option<ApiSpec>,
    #[serde(rename = "targetURL")]
    pub target_url: String,
    pub group: Option<String>,
    pub version: Option<Version>,
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinitionPage {
    pub data: Vec<ApiDefinition>,
    pub page_info: Page,
    pub total_count: i64,
}

// ── event definitions ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSpecInput {
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: EventSpecType,
    pub format: SpecFormat,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinitionInput {
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub spec: Option<EventSpecInput>,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub id: Uuid,
    #[serde(rename = "bundleID")]
    pub bundle_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub version: Option<Version>,
    pub ready: bool,
}

// ── entity type mappings ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeMappingInput {
    pub api_model_selectors: Option<JsonValue>,
    pub entity_type_targets: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeMapping {
    pub id: Uuid,
    #[serde(rename = "apiDefinitionID")]
    pub api_definition_id: Option<Uuid>,
    #[serde(rename = "eventDefinitionID")]
    pub event_definition_id: Option<Uuid>,
    pub api_model_selectors: Option<JsonValue>,
    pub entity_type_targets: Option<JsonValue>,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeMappingPage {
    pub data: Vec<EntityTypeMapping>,
    pub page_info: Page,
    pub total_count: i64,
}
