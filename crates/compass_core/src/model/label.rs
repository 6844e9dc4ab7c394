use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum LabelableObject {
    Tenant,
    Application,
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub key: String,
    pub value: JsonValue,
    pub object_type: LabelableObject,
    pub object_id: Uuid,
}

impl Label {
    /// Label value when it is a plain string.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}
