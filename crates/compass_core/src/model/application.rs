use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BaseEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub system_number: Option<String>,
    pub local_tenant_id: Option<String>,
    pub base: BaseEntity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationInput {
    pub name: String,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub system_number: Option<String>,
    pub local_tenant_id: Option<String>,
}

impl ApplicationInput {
    pub fn to_application(&self, id: Uuid, now: DateTime<Utc>) -> Application {
        Application {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            base_url: self.base_url.clone(),
            system_number: self.system_number.clone(),
            local_tenant_id: self.local_tenant_id.clone(),
            base: BaseEntity::new_ready(now),
        }
    }
}
