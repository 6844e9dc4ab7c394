//! Domain models. Plain data; conversion to rows lives in `compass_postgres`,
//! conversion to the wire shape in `crate::graphql`.

pub mod api;
pub mod application;
pub mod bundle;
pub mod bundle_reference;
pub mod destination;
pub mod entity_type_mapping;
pub mod event;
pub mod label;
pub mod spec;
pub mod tenant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use api::{ApiDefinition, ApiDefinitionInput, ApiDefinitionPage};
pub use application::{Application, ApplicationInput};
pub use bundle::{Bundle, BundleInput};
pub use bundle_reference::{BundleReference, BundleReferenceInput, BundleReferenceObjectType};
pub use destination::{Destination, DestinationFromService, DestinationInput};
pub use entity_type_mapping::{EntityTypeMapping, EntityTypeMappingInput};
pub use event::{EventDefinition, EventDefinitionInput, EventDefinitionPage};
pub use label::{Label, LabelableObject};
pub use spec::{ApiSpecType, EventSpecType, Spec, SpecFormat, SpecInput, SpecReferenceObjectType};
pub use tenant::{BusinessTenantMapping, TenantStatus, TenantType};

/// Audit fields shared by provisioned resources.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseEntity {
    /// `false` while the resource is still being provisioned.
    pub ready: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl BaseEntity {
    pub fn new_ready(now: DateTime<Utc>) -> Self {
        Self {
            ready: true,
            created_at: Some(now),
            updated_at: None,
            deleted_at: None,
            error: None,
        }
    }
}

/// Semantic version block carried by API and event definitions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    pub value: String,
    pub deprecated: Option<bool>,
    pub deprecated_since: Option<String>,
    pub for_removal: Option<bool>,
}
