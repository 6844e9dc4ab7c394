//! Resource types and the tenant-isolation metadata attached to each.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ResourceType {
    Application,
    ApplicationTemplateVersion,
    Bundle,
    Api,
    EventDefinition,
    Specification,
    BundleReference,
    EntityTypeMapping,
    Destination,
    Label,
    Tenant,
}

impl ResourceType {
    /// The `(id, tenant_id, owner)` relation used for isolation, if any.
    ///
    /// Only `tenant_applications` is a physical table; the child relations
    /// are views joining children to their application's access rows.
    pub fn tenant_access_table(self) -> Option<&'static str> {
        match self {
            Self::Application => Some("tenant_applications"),
            Self::Bundle => Some("bundles_tenants"),
            Self::Api => Some("api_definitions_tenants"),
            Self::EventDefinition => Some("event_api_definitions_tenants"),
            Self::Specification => Some("specifications_tenants"),
            Self::EntityTypeMapping => Some("entity_type_mappings_tenants"),
            _ => None,
        }
    }

    /// Column holding the tenant directly on the resource's own table.
    pub fn embedded_tenant_column(self) -> Option<&'static str> {
        match self {
            Self::Destination | Self::Label => Some("tenant_id"),
            _ => None,
        }
    }

    /// Resources shared across tenants; repositories use the global variants.
    pub fn is_tenant_ignorable(self) -> bool {
        matches!(
            self,
            Self::ApplicationTemplateVersion | Self::BundleReference | Self::Tenant
        )
    }

    /// Top-level resources own their access rows instead of inheriting them.
    pub fn is_top_level(self) -> bool {
        matches!(self, Self::Application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_is_camel_case() {
        assert_eq!(ResourceType::Api.to_string(), "api");
        assert_eq!(
            ResourceType::EntityTypeMapping.to_string(),
            "entityTypeMapping"
        );
    }

    #[test]
    fn parses_from_display_form() {
        assert_eq!(
            ResourceType::from_str("applicationTemplateVersion").unwrap(),
            ResourceType::ApplicationTemplateVersion
        );
        assert!(ResourceType::from_str("nope").is_err());
    }

    #[test]
    fn isolation_kinds_are_exclusive() {
        let all = [
            ResourceType::Application,
            ResourceType::ApplicationTemplateVersion,
            ResourceType::Bundle,
            ResourceType::Api,
            ResourceType::EventDefinition,
            ResourceType::Specification,
            ResourceType::BundleReference,
            ResourceType::EntityTypeMapping,
            ResourceType::Destination,
            ResourceType::Label,
            ResourceType::Tenant,
        ];
        for rt in all {
            let kinds = [
                rt.tenant_access_table().is_some(),
                rt.embedded_tenant_column().is_some(),
                rt.is_tenant_ignorable(),
            ];
            assert_eq!(
                kinds.iter().filter(|k| **k).count(),
                1,
                "{rt} must have exactly one isolation kind"
            );
        }
    }
}
