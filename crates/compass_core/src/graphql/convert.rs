//! Domain ⇄ wire conversions.

use serde_json::Value as JsonValue;

use super::{
    ApiDefinition, ApiDefinitionInput, ApiSpec, Application, ApplicationRegisterInput, Bundle,
    BundleCreateInput, BundleUpdateInput, EntityTypeMapping, EntityTypeMappingInput,
    EventDefinition, EventDefinitionInput, Version,
};
use crate::model;

impl From<&Version> for model::Version {
    fn from(v: &Version) -> Self {
        Self {
            value: v.value.clone(),
            deprecated: v.deprecated,
            deprecated_since: v.deprecated_since.clone(),
            for_removal: v.for_removal,
        }
    }
}

impl From<&model::Version> for Version {
    fn from(v: &model::Version) -> Self {
        Self {
            value: v.value.clone(),
            deprecated: v.deprecated,
            deprecated_since: v.deprecated_since.clone(),
            for_removal: v.for_removal,
        }
    }
}

// ── applications ─────────────────────────────────────────────

impl From<&ApplicationRegisterInput> for model::ApplicationInput {
    fn from(input: &ApplicationRegisterInput) -> Self {
        Self {
            name: input.name.clone(),
            description: input.description.clone(),
            base_url: input.base_url.clone(),
            system_number: input.system_number.clone(),
            local_tenant_id: input.local_tenant_id.clone(),
        }
    }
}

impl From<&model::Application> for Application {
    fn from(app: &model::Application) -> Self {
        Self {
            id: app.id,
            name: app.name.clone(),
            description: app.description.clone(),
            base_url: app.base_url.clone(),
            system_number: app.system_number.clone(),
            local_tenant_id: app.local_tenant_id.clone(),
            ready: app.base.ready,
            created_at: app.base.created_at,
        }
    }
}

// ── bundles ──────────────────────────────────────────────────

fn correlation_ids_to_json(ids: &[String]) -> Option<JsonValue> {
    if ids.is_empty() {
        return None;
    }
    Some(JsonValue::Array(ids.iter().cloned().map(JsonValue::String).collect()))
}

fn correlation_ids_from_json(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(ids)) => ids
            .iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

impl From<&BundleCreateInput> for model::BundleInput {
    fn from(input: &BundleCreateInput) -> Self {
        Self {
            name: input.name.clone(),
            description: input.description.clone(),
            instance_auth_request_input_schema: input.instance_auth_request_input_schema.clone(),
            default_instance_auth: input.default_instance_auth.clone(),
            correlation_ids: correlation_ids_to_json(&input.correlation_ids),
            ..Default::default()
        }
    }
}

impl BundleUpdateInput {
    /// Full-replace input: fields absent from the wire shape keep `existing`'s values.
    pub fn merge_into(&self, existing: &model::Bundle) -> model::BundleInput {
        model::BundleInput {
            name: self.name.clone(),
            description: self.description.clone(),
            instance_auth_request_input_schema: self.instance_auth_request_input_schema.clone(),
            default_instance_auth: self.default_instance_auth.clone(),
            ord_id: existing.ord_id.clone(),
            local_tenant_id: existing.local_tenant_id.clone(),
            short_description: existing.short_description.clone(),
            links: existing.links.clone(),
            labels: existing.labels.clone(),
            tags: existing.tags.clone(),
            correlation_ids: existing.correlation_ids.clone(),
        }
    }
}

impl From<&model::Bundle> for Bundle {
    fn from(bundle: &model::Bundle) -> Self {
        Self {
            id: bundle.id,
            application_id: bundle.application_id,
            name: bundle.name.clone(),
            description: bundle.description.clone(),
            instance_auth_request_input_schema: bundle.instance_auth_request_input_schema.clone(),
            default_instance_auth: bundle.default_instance_auth.clone(),
            correlation_ids: correlation_ids_from_json(bundle.correlation_ids.as_ref()),
            ready: bundle.base.ready,
            created_at: bundle.base.created_at,
            updated_at: bundle.base.updated_at,
        }
    }
}

// ── api definitions ──────────────────────────────────────────

impl ApiDefinitionInput {
    /// Domain input plus the optional spec carried inline.
    pub fn to_input(&self) -> (model::ApiDefinitionInput, Option<model::SpecInput>) {
        let api = model::ApiDefinitionInput {
            name: self.name.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
            target_urls: vec![self.target_url.clone()],
            version: self.version.as_ref().map(model::Version::from),
            ..Default::default()
        };
        let spec = self.spec.as_ref().map(|s| model::SpecInput {
            data: s.data.clone(),
            format: s.format,
            api_type: Some(s.spec_type),
            event_type: None,
            custom_type: None,
        });
        (api, spec)
    }
}

impl From<&model::Spec> for ApiSpec {
    fn from(spec: &model::Spec) -> Self {
        Self {
            id: spec.id,
            data: spec.data.clone(),
            spec_type: spec.api_type,
            format: spec.format,
        }
    }
}

/// Wire form of an API definition as seen through one bundle.
///
/// The bundle reference's default target URL wins over the definition's own
/// first target URL.
pub fn api_definition_to_graphql(
    api: &model::ApiDefinition,
    spec: Option<&model::Spec>,
    bundle_ref: Option<&model::BundleReference>,
) -> ApiDefinition {
    let target_url = bundle_ref
        .and_then(|r| r.api_default_target_url.clone())
        .or_else(|| model::api::extract_target_url(&api.target_urls))
        .unwrap_or_default();
    ApiDefinition {
        id: api.id,
        bundle_id: bundle_ref.and_then(|r| r.bundle_id),
        name: api.name.clone(),
        description: api.description.clone(),
        spec: spec.map(ApiSpec::from),
        target_url,
        group: api.group.clone(),
        version: api.version.as_ref().map(Version::from),
        ready: api.base.ready,
        created_at: api.base.created_at,
    }
}

// ── event definitions ────────────────────────────────────────

impl EventDefinitionInput {
    pub fn to_input(&self) -> (model::EventDefinitionInput, Option<model::SpecInput>) {
        let event = model::EventDefinitionInput {
            name: self.name.clone(),
            description: self.description.clone(),
            group: self.group.clone(),
            version: self.version.as_ref().map(model::Version::from),
            ..Default::default()
        };
        let spec = self.spec.as_ref().map(|s| model::SpecInput {
            data: s.data.clone(),
            format: s.format,
            api_type: None,
            event_type: Some(s.spec_type),
            custom_type: None,
        });
        (event, spec)
    }
}

pub fn event_definition_to_graphql(
    event: &model::EventDefinition,
    bundle_ref: Option<&model::BundleReference>,
) -> EventDefinition {
    EventDefinition {
        id: event.id,
        bundle_id: bundle_ref.and_then(|r| r.bundle_id),
        name: event.name.clone(),
        description: event.description.clone(),
        group: event.group.clone(),
        version: event.version.as_ref().map(Version::from),
        ready: event.base.ready,
    }
}

// ── entity type mappings ─────────────────────────────────────

impl From<&EntityTypeMappingInput> for model::EntityTypeMappingInput {
    fn from(input: &EntityTypeMappingInput) -> Self {
        Self {
            api_model_selectors: input.api_model_selectors.clone(),
            entity_type_targets: input.entity_type_targets.clone(),
        }
    }
}

impl From<&model::EntityTypeMapping> for EntityTypeMapping {
    fn from(m: &model::EntityTypeMapping) -> Self {
        Self {
            id: m.id,
            api_definition_id: m.api_definition_id,
            event_definition_id: m.event_definition_id,
            api_model_selectors: m.api_model_selectors.clone(),
            entity_type_targets: m.entity_type_targets.clone(),
            ready: m.base.ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::model::{ApiSpecType, BundleReferenceObjectType, SpecFormat};
    use crate::resource::ResourceType;

    #[test]
    fn api_input_wire_names() {
        let input: ApiDefinitionInput = serde_json::from_value(json!({
            "name": "Foo",
            "targetURL": "https://test-url.com",
            "spec": { "data": "{}", "type": "OPEN_API", "format": "JSON" }
        }))
        .unwrap();

        let (api, spec) = input.to_input();
        assert_eq!(api.target_urls, vec!["https://test-url.com".to_string()]);
        let spec = spec.unwrap();
        assert_eq!(spec.api_type, Some(ApiSpecType::OpenApi));
        assert_eq!(spec.format, SpecFormat::Json);
    }

    #[test]
    fn bundle_reference_url_wins() {
        let api = model::ApiDefinitionInput {
            name: "Foo".into(),
            target_urls: vec!["https://own.example.com".into()],
            ..Default::default()
        }
        .to_api_definition(Uuid::new_v4(), ResourceType::Application, Uuid::new_v4(), None, 0, Utc::now());
        let bundle_id = Uuid::new_v4();
        let reference = model::BundleReference {
            id: Uuid::new_v4(),
            bundle_id: Some(bundle_id),
            object_type: BundleReferenceObjectType::Api,
            object_id: Some(api.id),
            api_default_target_url: Some("https://test-url.com".into()),
            is_default_bundle: None,
        };

        let out = api_definition_to_graphql(&api, None, Some(&reference));
        assert_eq!(out.target_url, "https://test-url.com");
        assert_eq!(out.bundle_id, Some(bundle_id));

        let out = api_definition_to_graphql(&api, None, None);
        assert_eq!(out.target_url, "https://own.example.com");

        let wire = serde_json::to_value(&out).unwrap();
        assert_eq!(wire["targetURL"], "https://own.example.com");
        assert!(wire.get("bundleID").is_some());
    }

    #[test]
    fn correlation_ids_survive_conversion() {
        let input = BundleCreateInput {
            name: "bndl".into(),
            correlation_ids: vec!["sap.s4:communicationScenario:SAP_COM_0001".into()],
            ..Default::default()
        };
        let bundle = model::BundleInput::from(&input).to_bundle(Uuid::new_v4(), Uuid::new_v4(), None, Utc::now());
        assert!(bundle.has_correlation_id("sap.s4:communicationScenario:SAP_COM_0001"));
        assert_eq!(Bundle::from(&bundle).correlation_ids, input.correlation_ids);
    }

    #[test]
    fn empty_correlation_ids_are_null() {
        let input = BundleCreateInput {
            name: "bndl".into(),
            ..Default::default()
        };
        assert!(model::BundleInput::from(&input).correlation_ids.is_none());
    }

    #[test]
    fn update_keeps_fields_outside_wire_shape() {
        let mut existing = model::BundleInput {
            name: "old".into(),
            ord_id: Some("ns:consumptionBundle:b:v1".into()),
            correlation_ids: Some(json!(["c1"])),
            ..Default::default()
        }
        .to_bundle(Uuid::new_v4(), Uuid::new_v4(), None, Utc::now());
        let update = BundleUpdateInput {
            name: "new".into(),
            ..Default::default()
        };

        let merged = update.merge_into(&existing);
        existing.set_from_update_input(&merged, Utc::now());
        assert_eq!(existing.name, "new");
        assert_eq!(existing.ord_id.as_deref(), Some("ns:consumptionBundle:b:v1"));
        assert!(existing.has_correlation_id("c1"));
    }
}
