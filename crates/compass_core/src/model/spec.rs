use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::{CompassError, Result};
use crate::resource::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum SpecReferenceObjectType {
    #[strum(serialize = "API")]
    #[serde(rename = "API")]
    ApiSpec,
    #[strum(serialize = "EVENT")]
    #[serde(rename = "EVENT")]
    EventSpec,
}

impl SpecReferenceObjectType {
    pub fn resource_type(self) -> ResourceType {
        match self {
            Self::ApiSpec => ResourceType::Api,
            Self::EventSpec => ResourceType::EventDefinition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecFormat {
    Yaml,
    Json,
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiSpecType {
    Odata,
    OpenApi,
    OpenApiV2,
    OpenApiV3,
    RamlV1,
    Edmx,
    WsdlV1,
    WsdlV2,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSpecType {
    AsyncApi,
    AsyncApiV2,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub id: Uuid,
    pub object_type: SpecReferenceObjectType,
    pub object_id: Uuid,
    pub data: Option<String>,
    pub format: SpecFormat,
    pub api_type: Option<ApiSpecType>,
    pub event_type: Option<EventSpecType>,
    pub custom_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecInput {
    pub data: Option<String>,
    pub format: SpecFormat,
    pub api_type: Option<ApiSpecType>,
    pub event_type: Option<EventSpecType>,
    pub custom_type: Option<String>,
}

impl SpecInput {
    pub fn to_spec(&self, id: Uuid, object_type: SpecReferenceObjectType, object_id: Uuid) -> Result<Spec> {
        match object_type {
            SpecReferenceObjectType::ApiSpec if self.api_type.is_none() => {
                return Err(CompassError::InvalidData("API spec type cannot be empty".into()))
            }
            SpecReferenceObjectType::EventSpec if self.event_type.is_none() => {
                return Err(CompassError::InvalidData("event spec type cannot be empty".into()))
            }
            _ => {}
        }
        Ok(Spec {
            id,
            object_type,
            object_id,
            data: self.data.clone(),
            format: self.format,
            api_type: self.api_type.filter(|_| object_type == SpecReferenceObjectType::ApiSpec),
            event_type: self
                .event_type
                .filter(|_| object_type == SpecReferenceObjectType::EventSpec),
            custom_type: self.custom_type.clone(),
        })
    }

    /// Protocol implied by the spec type, used to fill `api_protocol`.
    pub fn api_protocol(&self) -> Option<&'static str> {
        match self.api_type? {
            ApiSpecType::Odata => Some(super::api::API_PROTOCOL_ODATA_V2),
            ApiSpecType::OpenApi => Some(super::api::API_PROTOCOL_REST),
            _ => None,
        }
    }
}

impl Spec {
    /// Full replace of the mutable fields.
    pub fn apply_input(&mut self, input: &SpecInput) {
        self.data = input.data.clone();
        self.format = input.format;
        self.custom_type = input.custom_type.clone();
        match self.object_type {
            SpecReferenceObjectType::ApiSpec => self.api_type = input.api_type,
            SpecReferenceObjectType::EventSpec => self.event_type = input.event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_input(kind: ApiSpecType) -> SpecInput {
        SpecInput {
            data: Some("openapi: 3.0.0".into()),
            format: SpecFormat::Yaml,
            api_type: Some(kind),
            event_type: None,
            custom_type: None,
        }
    }

    #[test]
    fn api_spec_requires_api_type() {
        let mut input = api_input(ApiSpecType::OpenApi);
        input.api_type = None;
        let err = input
            .to_spec(Uuid::new_v4(), SpecReferenceObjectType::ApiSpec, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, CompassError::InvalidData(_)));
    }

    #[test]
    fn event_spec_drops_api_type() {
        let mut input = api_input(ApiSpecType::OpenApi);
        input.event_type = Some(EventSpecType::AsyncApiV2);
        let spec = input
            .to_spec(Uuid::new_v4(), SpecReferenceObjectType::EventSpec, Uuid::new_v4())
            .unwrap();
        assert_eq!(spec.api_type, None);
        assert_eq!(spec.event_type, Some(EventSpecType::AsyncApiV2));
    }

    #[test]
    fn protocol_from_spec_type() {
        assert_eq!(api_input(ApiSpecType::Odata).api_protocol(), Some("odata-v2"));
        assert_eq!(api_input(ApiSpecType::OpenApi).api_protocol(), Some("rest"));
        assert_eq!(api_input(ApiSpecType::Edmx).api_protocol(), None);
    }

    #[test]
    fn spec_type_wire_names() {
        assert_eq!(ApiSpecType::OpenApiV3.to_string(), "OPEN_API_V3");
        assert_eq!(EventSpecType::AsyncApiV2.to_string(), "ASYNC_API_V2");
        assert_eq!(SpecFormat::Yaml.to_string(), "YAML");
    }
}
