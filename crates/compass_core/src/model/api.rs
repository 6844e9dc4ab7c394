use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{BaseEntity, Version};
use crate::pagination::Page;
use crate::resource::ResourceType;

pub const API_PROTOCOL_ODATA_V2: &str = "odata-v2";
pub const API_PROTOCOL_REST: &str = "rest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDefinition {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub application_template_version_id: Option<Uuid>,
    pub package_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub ord_id: Option<String>,
    pub short_description: Option<String>,
    pub api_protocol: Option<String>,
    pub tags: Option<JsonValue>,
    pub countries: Option<JsonValue>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    pub target_urls: Vec<String>,
    pub visibility: Option<String>,
    pub disabled: Option<bool>,
    pub release_status: Option<String>,
    pub version: Option<Version>,
    pub resource_hash: Option<String>,
    pub base: BaseEntity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiDefinitionInput {
    pub ord_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub short_description: Option<String>,
    pub api_protocol: Option<String>,
    pub tags: Option<JsonValue>,
    pub countries: Option<JsonValue>,
    pub links: Option<JsonValue>,
    pub labels: Option<JsonValue>,
    pub target_urls: Vec<String>,
    pub visibility: Option<String>,
    pub disabled: Option<bool>,
    pub release_status: Option<String>,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDefinitionPage {
    pub data: Vec<ApiDefinition>,
    pub page_info: Page,
    pub total_count: i64,
}

impl ApiDefinitionInput {
    /// Builds a ready definition owned by `resource_id`.
    ///
    /// Tenant-ignorable owners are application template versions; everything
    /// else is attached to an application. A zero `hash` means no hash.
    pub fn to_api_definition(
        &self,
        id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        package_id: Option<String>,
        hash: u64,
        now: DateTime<Utc>,
    ) -> ApiDefinition {
        let (application_id, application_template_version_id) = if resource_type.is_tenant_ignorable() {
            (None, Some(resource_id))
        } else {
            (Some(resource_id), None)
        };
        ApiDefinition {
            id,
            application_id,
            application_template_version_id,
            package_id,
            name: self.name.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
            ord_id: self.ord_id.clone(),
            short_description: self.short_description.clone(),
            api_protocol: self.api_protocol.clone(),
            tags: self.tags.clone(),
            countries: self.countries.clone(),
            links: self.links.clone(),
            labels: self.labels.clone(),
            target_urls: self.target_urls.clone(),
            visibility: self.visibility.clone(),
            disabled: self.disabled,
            release_status: self.release_status.clone(),
            version: self.version.clone(),
            resource_hash: hash_to_string(hash),
            base: BaseEntity::new_ready(now),
        }
    }
}

impl ApiDefinition {
    /// Owner of the definition as `(resource type, id)`.
    pub fn owner(&self) -> Option<(ResourceType, Uuid)> {
        match (self.application_id, self.application_template_version_id) {
            (Some(app), _) => Some((ResourceType::Application, app)),
            (None, Some(atv)) => Some((ResourceType::ApplicationTemplateVersion, atv)),
            (None, None) => None,
        }
    }
}

/// First entry of a target URL list, used as a bundle reference's default URL.
pub fn extract_target_url(target_urls: &[String]) -> Option<String> {
    target_urls.first().cloned()
}

pub(crate) fn hash_to_string(hash: u64) -> Option<String> {
    (hash != 0).then(|| hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ApiDefinitionInput {
        ApiDefinitionInput {
            name: "Foo".into(),
            target_urls: vec!["https://test-url.com".into()],
            ..Default::default()
        }
    }

    #[test]
    fn application_owned_definition() {
        let app = Uuid::new_v4();
        let api = input().to_api_definition(Uuid::new_v4(), ResourceType::Application, app, None, 0, Utc::now());
        assert_eq!(api.application_id, Some(app));
        assert_eq!(api.application_template_version_id, None);
        assert!(api.base.ready);
        assert_eq!(api.resource_hash, None);
        assert_eq!(api.owner(), Some((ResourceType::Application, app)));
    }

    #[test]
    fn template_version_owned_definition() {
        let atv = Uuid::new_v4();
        let api = input().to_api_definition(
            Uuid::new_v4(),
            ResourceType::ApplicationTemplateVersion,
            atv,
            Some("pkg".into()),
            42,
            Utc::now(),
        );
        assert_eq!(api.application_id, None);
        assert_eq!(api.application_template_version_id, Some(atv));
        assert_eq!(api.package_id.as_deref(), Some("pkg"));
        assert_eq!(api.resource_hash.as_deref(), Some("42"));
    }

    #[test]
    fn extract_target_url_takes_first() {
        assert_eq!(extract_target_url(&[]), None);
        assert_eq!(
            extract_target_url(&["a".to_string(), "b".to_string()]).as_deref(),
            Some("a")
        );
    }
}
