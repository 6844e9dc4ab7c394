use async_trait::async_trait;
use uuid::Uuid;

use super::MemoryState;
use crate::error::{CompassError, Result};
use crate::model::{
    BusinessTenantMapping, Destination, DestinationInput, Label, LabelableObject, TenantType,
};
use crate::ports::{DestinationRepository, LabelRepository, TenantRepository};
use crate::resource::ResourceType;
use crate::tenant::TenantId;

// ── destinations ─────────────────────────────────────────────

pub struct MemoryDestinationRepository;

#[async_trait]
impl DestinationRepository<MemoryState> for MemoryDestinationRepository {
    async fn upsert(
        &self,
        conn: &mut MemoryState,
        input: &DestinationInput,
        id: Uuid,
        tenant: TenantId,
        bundle_id: Uuid,
        revision: Uuid,
    ) -> Result<()> {
        if !conn.bundles.iter().any(|b| b.id == bundle_id) {
            return Err(CompassError::InvalidData("Object not found".into()));
        }
        let existing = conn
            .destinations
            .iter_mut()
            .find(|d| d.name == input.name && d.tenant_id == tenant && d.bundle_id == Some(bundle_id));
        match existing {
            Some(row) => {
                let id = row.id;
                *row = input.to_destination(id, tenant, bundle_id, revision);
            }
            None => conn
                .destinations
                .push(input.to_destination(id, tenant, bundle_id, revision)),
        }
        Ok(())
    }

    async fn delete_old(&self, conn: &mut MemoryState, revision: Uuid, tenant: TenantId) -> Result<u64> {
        let before = conn.destinations.len();
        conn.destinations
            .retain(|d| !(d.tenant_id == tenant && d.revision != revision));
        Ok((before - conn.destinations.len()) as u64)
    }

    async fn list_by_tenant(&self, conn: &mut MemoryState, tenant: TenantId) -> Result<Vec<Destination>> {
        let mut rows = conn
            .destinations
            .iter()
            .filter(|d| d.tenant_id == tenant)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}

// ── labels ───────────────────────────────────────────────────

pub struct MemoryLabelRepository;

#[async_trait]
impl LabelRepository<MemoryState> for MemoryLabelRepository {
    async fn create(&self, conn: &mut MemoryState, item: &Label) -> Result<()> {
        let duplicate = conn.labels.iter().any(|l| {
            l.id == item.id
                || (l.tenant_id == item.tenant_id
                    && l.key == item.key
                    && l.object_type == item.object_type
                    && l.object_id == item.object_id)
        });
        if duplicate {
            return Err(CompassError::NotUnique {
                resource: ResourceType::Label,
            });
        }
        conn.labels.push(item.clone());
        Ok(())
    }

    async fn get_by_key(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        object_type: LabelableObject,
        object_id: Uuid,
        key: &str,
    ) -> Result<Label> {
        conn.labels
            .iter()
            .find(|l| {
                l.tenant_id == tenant && l.object_type == object_type && l.object_id == object_id && l.key == key
            })
            .cloned()
            .ok_or_else(|| CompassError::not_found(ResourceType::Label, key))
    }
}

// ── tenants ──────────────────────────────────────────────────

pub struct MemoryTenantRepository;

fn is_subscribed(conn: &MemoryState, tenant: &BusinessTenantMapping, subdomain_label_key: &str) -> bool {
    tenant.tenant_type == TenantType::Subaccount
        && conn.labels.iter().any(|l| {
            l.tenant_id == tenant.id
                && l.object_type == LabelableObject::Tenant
                && l.object_id == tenant.id.as_uuid()
                && l.key == subdomain_label_key
        })
}

#[async_trait]
impl TenantRepository<MemoryState> for MemoryTenantRepository {
    async fn create(&self, conn: &mut MemoryState, item: &BusinessTenantMapping) -> Result<()> {
        let duplicate = conn
            .tenants
            .iter()
            .any(|t| t.id == item.id || t.external_tenant == item.external_tenant);
        if duplicate {
            return Err(CompassError::NotUnique {
                resource: ResourceType::Tenant,
            });
        }
        if let Some(parent) = item.parent {
            if !conn.tenants.iter().any(|t| t.id == parent) {
                return Err(CompassError::InvalidData("Object not found".into()));
            }
        }
        conn.tenants.push(item.clone());
        Ok(())
    }

    async fn get(&self, conn: &mut MemoryState, id: TenantId) -> Result<BusinessTenantMapping> {
        conn.tenants
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CompassError::not_found(ResourceType::Tenant, id))
    }

    async fn get_by_external_tenant(
        &self,
        conn: &mut MemoryState,
        external_tenant: &str,
    ) -> Result<BusinessTenantMapping> {
        conn.tenants
            .iter()
            .find(|t| t.external_tenant == external_tenant)
            .cloned()
            .ok_or_else(|| CompassError::not_found(ResourceType::Tenant, external_tenant))
    }

    async fn list_subscribed(
        &self,
        conn: &mut MemoryState,
        subdomain_label_key: &str,
    ) -> Result<Vec<BusinessTenantMapping>> {
        Ok(conn
            .tenants
            .iter()
            .filter(|t| is_subscribed(conn, t, subdomain_label_key))
            .cloned()
            .collect())
    }

    async fn exists_subscribed(
        &self,
        conn: &mut MemoryState,
        id: TenantId,
        subdomain_label_key: &str,
    ) -> Result<bool> {
        Ok(conn
            .tenants
            .iter()
            .any(|t| t.id == id && is_subscribed(conn, t, subdomain_label_key)))
    }
}
