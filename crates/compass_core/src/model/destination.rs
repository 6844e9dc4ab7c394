use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::tenant::TenantId;

const CORRELATION_ID_PREFIX: &str = "sap.s4:communicationScenario:";
const S4HANA_TYPE: &str = "SAP S/4HANA Cloud";
const S4HANA_BASE_URL_SUFFIX: &str = "-api";

/// Destination stored for a tenant and linked to one bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
    pub destination_type: String,
    pub url: String,
    pub authentication: String,
    pub tenant_id: TenantId,
    pub bundle_id: Option<Uuid>,
    /// Sync run that last wrote the row; older revisions are purged.
    pub revision: Uuid,
}

/// Destination as read from the destination service, after defaulting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestinationInput {
    pub name: String,
    pub destination_type: String,
    pub url: String,
    pub authentication: String,
    pub x_correlation_id: String,
    pub x_system_tenant_id: String,
    pub x_system_tenant_name: String,
    pub x_system_type: String,
    pub x_system_base_url: String,
}

impl DestinationInput {
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("name", &self.name),
            ("type", &self.destination_type),
            ("url", &self.url),
            ("authentication", &self.authentication),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(CompassError::InvalidData(format!(
                "destination is missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Whether the destination names a system that bundles can be matched against.
    pub fn has_valid_identifiers(&self) -> bool {
        let has_system_id = !self.x_system_tenant_id.is_empty();
        let has_system_name = !self.x_system_tenant_name.is_empty() && !self.x_system_base_url.is_empty();
        !self.x_correlation_id.is_empty() && (has_system_id || has_system_name)
    }

    pub fn to_destination(&self, id: Uuid, tenant_id: TenantId, bundle_id: Uuid, revision: Uuid) -> Destination {
        Destination {
            id,
            name: self.name.clone(),
            destination_type: self.destination_type.clone(),
            url: self.url.clone(),
            authentication: self.authentication.clone(),
            tenant_id,
            bundle_id: Some(bundle_id),
            revision,
        }
    }
}

/// Raw destination JSON returned by the destination service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestinationFromService {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default)]
    pub destination_type: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "Authentication", default)]
    pub authentication: String,
    #[serde(rename = "XFSystemName", default)]
    pub xf_system_name: String,
    #[serde(rename = "communicationScenarioId", default)]
    pub communication_scenario_id: String,
    #[serde(rename = "product.name", default)]
    pub product_name: String,
    #[serde(rename = "x-correlation-id", default)]
    pub x_correlation_id: String,
    #[serde(rename = "x-system-id", default)]
    pub x_system_tenant_id: String,
    #[serde(rename = "x-system-name", default)]
    pub x_system_tenant_name: String,
    #[serde(rename = "x-system-type", default)]
    pub x_system_type: String,
    #[serde(rename = "x-system-base-url", default)]
    pub x_system_base_url: String,
}

impl DestinationFromService {
    pub fn to_model(&self) -> Result<DestinationInput> {
        let mut result = DestinationInput {
            name: self.name.clone(),
            destination_type: self.destination_type.clone(),
            url: self.url.clone(),
            authentication: self.authentication.clone(),
            x_correlation_id: self.x_correlation_id.clone(),
            x_system_tenant_id: self.x_system_tenant_id.clone(),
            x_system_tenant_name: self.x_system_tenant_name.clone(),
            x_system_type: self.x_system_type.clone(),
            x_system_base_url: self.x_system_base_url.clone(),
        };
        self.set_defaults(&mut result)?;
        result.validate()?;
        Ok(result)
    }

    /// Fills S/4HANA identifiers from the destination's custom properties.
    fn set_defaults(&self, result: &mut DestinationInput) -> Result<()> {
        if result.x_system_type.is_empty() {
            result.x_system_type = self.product_name.clone();
        }
        if result.x_system_type != S4HANA_TYPE {
            return Ok(());
        }
        if result.x_correlation_id.is_empty() && !self.communication_scenario_id.is_empty() {
            result.x_correlation_id = format!("{CORRELATION_ID_PREFIX}{}", self.communication_scenario_id);
        }
        if result.x_system_tenant_name.is_empty() {
            result.x_system_tenant_name = self.xf_system_name.clone();
        }
        if !result.x_system_base_url.is_empty() || result.url.is_empty() {
            return Ok(());
        }

        let base_url = Url::parse(&result.url).map_err(|e| {
            CompassError::InvalidData(format!(
                "{S4HANA_TYPE} destination has invalid URL '{}': {e}",
                result.url
            ))
        })?;
        let host = base_url.host_str().unwrap_or_default();
        let mut subdomains = host.split('.').collect::<Vec<_>>();
        if subdomains.len() < 2 {
            return Err(CompassError::InvalidData(format!(
                "{S4HANA_TYPE} destination has invalid URL '{}'. Expected at least 2 subdomains",
                result.url
            )));
        }
        subdomains[0] = subdomains[0]
            .strip_suffix(S4HANA_BASE_URL_SUFFIX)
            .unwrap_or(subdomains[0]);
        result.x_system_base_url = format!("{}://{}", base_url.scheme(), subdomains.join("."));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s4_destination() -> DestinationFromService {
        serde_json::from_value(serde_json::json!({
            "Name": "s4",
            "Type": "HTTP",
            "URL": "https://my-s4-api.s4hana.ondemand.com",
            "Authentication": "BasicAuthentication",
            "XFSystemName": "Test S4HANA system",
            "communicationScenarioId": "SAP_COM_0108",
            "product.name": "SAP S/4HANA Cloud"
        }))
        .unwrap()
    }

    #[test]
    fn s4hana_defaults_are_derived() {
        let input = s4_destination().to_model().unwrap();
        assert_eq!(input.x_system_type, "SAP S/4HANA Cloud");
        assert_eq!(input.x_correlation_id, "sap.s4:communicationScenario:SAP_COM_0108");
        assert_eq!(input.x_system_tenant_name, "Test S4HANA system");
        assert_eq!(input.x_system_base_url, "https://my-s4.s4hana.ondemand.com");
        assert!(input.has_valid_identifiers());
    }

    #[test]
    fn explicit_identifiers_win() {
        let mut dest = s4_destination();
        dest.x_correlation_id = "custom".into();
        dest.x_system_base_url = "https://explicit".into();
        let input = dest.to_model().unwrap();
        assert_eq!(input.x_correlation_id, "custom");
        assert_eq!(input.x_system_base_url, "https://explicit");
    }

    #[test]
    fn non_s4_destination_has_no_identifiers() {
        let mut dest = s4_destination();
        dest.product_name = String::new();
        let input = dest.to_model().unwrap();
        assert_eq!(input.x_correlation_id, "");
        assert!(!input.has_valid_identifiers());
    }

    #[test]
    fn s4_url_needs_two_subdomains() {
        let mut dest = s4_destination();
        dest.url = "https://localhost".into();
        assert!(matches!(dest.to_model().unwrap_err(), CompassError::InvalidData(_)));
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let err = DestinationFromService::default().to_model().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid data: destination is missing required fields: name, type, url, authentication"
        );
    }
}
