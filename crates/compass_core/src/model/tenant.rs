use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TenantType {
    Account,
    Subaccount,
    Customer,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessTenantMapping {
    pub id: TenantId,
    pub external_tenant: String,
    pub name: String,
    pub subdomain: Option<String>,
    pub parent: Option<TenantId>,
    pub tenant_type: TenantType,
    pub provider: String,
    pub status: TenantStatus,
}
