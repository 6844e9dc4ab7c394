use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::MemoryState;
use crate::error::{CompassError, Result};
use crate::model::bundle_reference::pages_per_bundle;
use crate::model::{
    ApiDefinition, ApiDefinitionPage, Application, Bundle, BundleReference,
    BundleReferenceObjectType, DestinationInput, EntityTypeMapping, EventDefinition,
    EventDefinitionPage, Spec, SpecReferenceObjectType,
};
use crate::pagination::{decode_offset_cursor, Page};
use crate::ports::{
    ApiRepository, ApplicationRepository, BundleReferenceRepository, BundleRepository,
    EntityTypeMappingRepository, EventRepository, SpecRepository,
};
use crate::resource::ResourceType;
use crate::tenant::TenantId;

fn insert<T>(rows: &mut Vec<T>, item: &T, id_of: impl Fn(&T) -> Uuid, resource: ResourceType) -> Result<()>
where
    T: Clone,
{
    let id = id_of(item);
    if rows.iter().any(|r| id_of(r) == id) {
        return Err(CompassError::NotUnique { resource });
    }
    rows.push(item.clone());
    Ok(())
}

/// Replaces the single row with `item`'s ID, if `allowed`.
fn replace<T>(
    rows: &mut [T],
    item: &T,
    id_of: impl Fn(&T) -> Uuid,
    allowed: impl Fn(&T) -> bool,
    resource: ResourceType,
) -> Result<()>
where
    T: Clone,
{
    let id = id_of(item);
    let row = rows
        .iter_mut()
        .find(|r| id_of(r) == id && allowed(r))
        .ok_or_else(|| CompassError::not_found(resource, id))?;
    *row = item.clone();
    Ok(())
}

fn remove<T>(
    rows: &mut Vec<T>,
    id: Uuid,
    id_of: impl Fn(&T) -> Uuid,
    allowed: impl Fn(&T) -> bool,
    resource: ResourceType,
) -> Result<()> {
    let before = rows.len();
    rows.retain(|r| !(id_of(r) == id && allowed(r)));
    if rows.len() == before {
        return Err(CompassError::not_found(resource, id));
    }
    Ok(())
}

fn found<T: Clone>(row: Option<&T>, resource: ResourceType, id: impl ToString) -> Result<T> {
    row.cloned().ok_or_else(|| CompassError::not_found(resource, id))
}

/// Offset window over rows already in listing order.
fn window<T: Clone>(rows: Vec<T>, page_size: i64, cursor: &str) -> Result<(Vec<T>, Page, i64)> {
    let offset = decode_offset_cursor(cursor)?;
    let total = rows.len() as i64;
    let data = rows
        .into_iter()
        .skip(offset as usize)
        .take(page_size as usize)
        .collect::<Vec<_>>();
    let page = Page::at_offset(cursor, offset, page_size, data.len(), total);
    Ok((data, page, total))
}

// ── applications ─────────────────────────────────────────────

pub struct MemoryApplicationRepository;

#[async_trait]
impl ApplicationRepository<MemoryState> for MemoryApplicationRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &Application) -> Result<()> {
        insert(&mut conn.applications, item, |a| a.id, ResourceType::Application)?;
        conn.grant_app_access(tenant, item.id);
        Ok(())
    }

    async fn get_by_id(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<Application> {
        let row = conn
            .applications
            .iter()
            .find(|a| a.id == id && conn.sees_app(tenant, id, false));
        found(row, ResourceType::Application, id)
    }

    async fn exists(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<bool> {
        Ok(conn.applications.iter().any(|a| a.id == id) && conn.sees_app(tenant, id, false))
    }

    async fn list(&self, conn: &mut MemoryState, tenant: TenantId) -> Result<Vec<Application>> {
        let mut apps = conn
            .applications
            .iter()
            .filter(|a| conn.sees_app(tenant, a.id, false))
            .cloned()
            .collect::<Vec<_>>();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    async fn delete(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<()> {
        if !conn.sees_app(tenant, id, true) {
            return Err(CompassError::not_found(ResourceType::Application, id));
        }
        let referenced = conn.bundles.iter().any(|b| b.application_id == Some(id))
            || conn.apis.iter().any(|a| a.application_id == Some(id))
            || conn.events.iter().any(|e| e.application_id == Some(id));
        if referenced {
            return Err(MemoryState::delete_restricted());
        }
        conn.applications.retain(|a| a.id != id);
        conn.tenant_applications.retain(|a| a.id != id);
        Ok(())
    }
}

// ── bundles ──────────────────────────────────────────────────

pub struct MemoryBundleRepository;

#[async_trait]
impl BundleRepository<MemoryState> for MemoryBundleRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &Bundle) -> Result<()> {
        let app_id = item
            .application_id
            .ok_or_else(|| CompassError::InvalidData("bundle must belong to an application".into()))?;
        conn.require_parent_owner(tenant, ResourceType::Application, app_id)?;
        insert(&mut conn.bundles, item, |b| b.id, ResourceType::Bundle)
    }

    async fn get_by_id(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<Bundle> {
        let visible = conn.visible(tenant, ResourceType::Bundle, id, false);
        found(
            conn.bundles.iter().find(|b| b.id == id && visible),
            ResourceType::Bundle,
            id,
        )
    }

    async fn exists(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<bool> {
        Ok(conn.visible(tenant, ResourceType::Bundle, id, false))
    }

    async fn list_by_application_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<Bundle>> {
        if !conn.sees_app(tenant, app_id, false) {
            return Ok(Vec::new());
        }
        let mut bundles = conn
            .bundles
            .iter()
            .filter(|b| b.application_id == Some(app_id))
            .cloned()
            .collect::<Vec<_>>();
        bundles.sort_by_key(|b| b.id);
        Ok(bundles)
    }

    async fn list_by_destination(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        destination: &DestinationInput,
    ) -> Result<Vec<Bundle>> {
        let matching_apps = conn
            .applications
            .iter()
            .filter(|a| conn.sees_app(tenant, a.id, false))
            .filter(|a| {
                if destination.x_system_tenant_id.is_empty() {
                    a.base_url.as_deref() == Some(destination.x_system_base_url.as_str())
                        && a.name == destination.x_system_tenant_name
                } else {
                    a.local_tenant_id.as_deref() == Some(destination.x_system_tenant_id.as_str())
                }
            })
            .map(|a| a.id)
            .collect::<Vec<_>>();

        Ok(conn
            .bundles
            .iter()
            .filter(|b| b.application_id.is_some_and(|app| matching_apps.contains(&app)))
            .filter(|b| b.has_correlation_id(&destination.x_correlation_id))
            .cloned()
            .collect())
    }

    async fn update(&self, conn: &mut MemoryState, tenant: TenantId, item: &Bundle) -> Result<()> {
        let allowed = conn.visible(tenant, ResourceType::Bundle, item.id, true);
        replace(&mut conn.bundles, item, |b| b.id, |_| allowed, ResourceType::Bundle)
    }

    async fn delete(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<()> {
        if !conn.visible(tenant, ResourceType::Bundle, id, true) {
            return Err(CompassError::not_found(ResourceType::Bundle, id));
        }
        if conn.bundle_references.iter().any(|r| r.bundle_id == Some(id)) {
            return Err(MemoryState::delete_restricted());
        }
        remove(&mut conn.bundles, id, |b| b.id, |_| true, ResourceType::Bundle)?;
        conn.destinations.retain(|d| d.bundle_id != Some(id));
        Ok(())
    }
}

// ── api definitions ──────────────────────────────────────────

pub struct MemoryApiRepository;

impl MemoryApiRepository {
    fn ensure_no_dependents(conn: &MemoryState, id: Uuid) -> Result<()> {
        let referenced = conn
            .specs
            .iter()
            .any(|s| s.object_type == SpecReferenceObjectType::ApiSpec && s.object_id == id)
            || conn.entity_type_mappings.iter().any(|m| m.api_definition_id == Some(id));
        if referenced {
            return Err(MemoryState::delete_restricted());
        }
        Ok(())
    }
}

#[async_trait]
impl ApiRepository<MemoryState> for MemoryApiRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &ApiDefinition) -> Result<()> {
        let app_id = item.application_id.ok_or_else(|| {
            CompassError::InvalidData("api definition must belong to an application".into())
        })?;
        conn.require_parent_owner(tenant, ResourceType::Application, app_id)?;
        insert(&mut conn.apis, item, |a| a.id, ResourceType::Api)
    }

    async fn create_global(&self, conn: &mut MemoryState, item: &ApiDefinition) -> Result<()> {
        insert(&mut conn.apis, item, |a| a.id, ResourceType::Api)
    }

    async fn get_by_id(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<ApiDefinition> {
        let visible = conn.visible(tenant, ResourceType::Api, id, false);
        found(conn.apis.iter().find(|a| a.id == id && visible), ResourceType::Api, id)
    }

    async fn get_by_id_global(&self, conn: &mut MemoryState, id: Uuid) -> Result<ApiDefinition> {
        found(conn.apis.iter().find(|a| a.id == id), ResourceType::Api, id)
    }

    async fn get_for_bundle(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        id: Uuid,
        bundle_id: Uuid,
    ) -> Result<ApiDefinition> {
        let referenced = conn.bundle_references.iter().any(|r| {
            r.object_type == BundleReferenceObjectType::Api
                && r.object_id == Some(id)
                && r.bundle_id == Some(bundle_id)
        });
        let visible = referenced && conn.visible(tenant, ResourceType::Api, id, false);
        found(conn.apis.iter().find(|a| a.id == id && visible), ResourceType::Api, id)
    }

    async fn exists(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<bool> {
        Ok(conn.visible(tenant, ResourceType::Api, id, false))
    }

    async fn list_by_bundle_ids(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        bundle_ids: &[Uuid],
        bundle_refs: &[BundleReference],
        total_counts: &HashMap<Uuid, i64>,
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<ApiDefinitionPage>> {
        let visible = conn
            .apis
            .iter()
            .filter(|a| conn.visible(tenant, ResourceType::Api, a.id, false))
            .cloned()
            .collect::<Vec<_>>();
        let pages = pages_per_bundle(bundle_ids, bundle_refs, total_counts, &visible, |a| a.id, page_size, cursor)?;
        Ok(pages
            .into_iter()
            .map(|(data, page_info, total_count)| ApiDefinitionPage {
                data,
                page_info,
                total_count,
            })
            .collect())
    }

    async fn list_by_application_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        app_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        if !conn.sees_app(tenant, app_id, false) {
            return Ok(Vec::new());
        }
        Ok(conn
            .apis
            .iter()
            .filter(|a| a.application_id == Some(app_id))
            .cloned()
            .collect())
    }

    async fn list_by_application_template_version_id(
        &self,
        conn: &mut MemoryState,
        app_template_version_id: Uuid,
    ) -> Result<Vec<ApiDefinition>> {
        Ok(conn
            .apis
            .iter()
            .filter(|a| a.application_template_version_id == Some(app_template_version_id))
            .cloned()
            .collect())
    }

    async fn update(&self, conn: &mut MemoryState, tenant: TenantId, item: &ApiDefinition) -> Result<()> {
        let allowed = conn.visible(tenant, ResourceType::Api, item.id, true);
        replace(&mut conn.apis, item, |a| a.id, |_| allowed, ResourceType::Api)
    }

    async fn update_global(&self, conn: &mut MemoryState, item: &ApiDefinition) -> Result<()> {
        replace(&mut conn.apis, item, |a| a.id, |_| true, ResourceType::Api)
    }

    async fn delete(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<()> {
        if !conn.visible(tenant, ResourceType::Api, id, true) {
            return Err(CompassError::not_found(ResourceType::Api, id));
        }
        Self::ensure_no_dependents(conn, id)?;
        remove(&mut conn.apis, id, |a| a.id, |_| true, ResourceType::Api)
    }

    async fn delete_global(&self, conn: &mut MemoryState, id: Uuid) -> Result<()> {
        Self::ensure_no_dependents(conn, id)?;
        remove(&mut conn.apis, id, |a| a.id, |_| true, ResourceType::Api)
    }

    async fn delete_all_by_bundle_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        bundle_id: Uuid,
    ) -> Result<()> {
        let ids = conn
            .bundle_references
            .iter()
            .filter(|r| r.object_type == BundleReferenceObjectType::Api && r.bundle_id == Some(bundle_id))
            .filter_map(|r| r.object_id)
            .filter(|id| conn.visible(tenant, ResourceType::Api, *id, true))
            .collect::<Vec<_>>();
        for id in &ids {
            Self::ensure_no_dependents(conn, *id)?;
        }
        conn.apis.retain(|a| !ids.contains(&a.id));
        Ok(())
    }
}

// ── event definitions ────────────────────────────────────────

pub struct MemoryEventRepository;

impl MemoryEventRepository {
    fn ensure_no_dependents(conn: &MemoryState, id: Uuid) -> Result<()> {
        let referenced = conn
            .specs
            .iter()
            .any(|s| s.object_type == SpecReferenceObjectType::EventSpec && s.object_id == id)
            || conn.entity_type_mappings.iter().any(|m| m.event_definition_id == Some(id));
        if referenced {
            return Err(MemoryState::delete_restricted());
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository<MemoryState> for MemoryEventRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &EventDefinition) -> Result<()> {
        let app_id = item.application_id.ok_or_else(|| {
            CompassError::InvalidData("event definition must belong to an application".into())
        })?;
        conn.require_parent_owner(tenant, ResourceType::Application, app_id)?;
        insert(&mut conn.events, item, |e| e.id, ResourceType::EventDefinition)
    }

    async fn create_global(&self, conn: &mut MemoryState, item: &EventDefinition) -> Result<()> {
        insert(&mut conn.events, item, |e| e.id, ResourceType::EventDefinition)
    }

    async fn get_by_id(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<EventDefinition> {
        let visible = conn.visible(tenant, ResourceType::EventDefinition, id, false);
        found(
            conn.events.iter().find(|e| e.id == id && visible),
            ResourceType::EventDefinition,
            id,
        )
    }

    async fn list_by_bundle_ids(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        bundle_ids: &[Uuid],
        bundle_refs: &[BundleReference],
        total_counts: &HashMap<Uuid, i64>,
        page_size: i64,
        cursor: &str,
    ) -> Result<Vec<EventDefinitionPage>> {
        let visible = conn
            .events
            .iter()
            .filter(|e| conn.visible(tenant, ResourceType::EventDefinition, e.id, false))
            .cloned()
            .collect::<Vec<_>>();
        let pages = pages_per_bundle(bundle_ids, bundle_refs, total_counts, &visible, |e| e.id, page_size, cursor)?;
        Ok(pages
            .into_iter()
            .map(|(data, page_info, total_count)| EventDefinitionPage {
                data,
                page_info,
                total_count,
            })
            .collect())
    }

    async fn delete(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<()> {
        if !conn.visible(tenant, ResourceType::EventDefinition, id, true) {
            return Err(CompassError::not_found(ResourceType::EventDefinition, id));
        }
        Self::ensure_no_dependents(conn, id)?;
        remove(&mut conn.events, id, |e| e.id, |_| true, ResourceType::EventDefinition)
    }

    async fn delete_global(&self, conn: &mut MemoryState, id: Uuid) -> Result<()> {
        Self::ensure_no_dependents(conn, id)?;
        remove(&mut conn.events, id, |e| e.id, |_| true, ResourceType::EventDefinition)
    }
}

// ── bundle references ────────────────────────────────────────

pub struct MemoryBundleReferenceRepository;

fn references_object(r: &BundleReference, object_type: BundleReferenceObjectType, object_id: Uuid) -> bool {
    r.object_type == object_type && r.object_id == Some(object_id)
}

#[async_trait]
impl BundleReferenceRepository<MemoryState> for MemoryBundleReferenceRepository {
    async fn create(&self, conn: &mut MemoryState, item: &BundleReference) -> Result<()> {
        if let Some(bundle_id) = item.bundle_id {
            if !conn.bundles.iter().any(|b| b.id == bundle_id) {
                return Err(CompassError::InvalidData("Object not found".into()));
            }
        }
        insert(&mut conn.bundle_references, item, |r| r.id, ResourceType::BundleReference)
    }

    async fn update(&self, conn: &mut MemoryState, item: &BundleReference) -> Result<()> {
        replace(
            &mut conn.bundle_references,
            item,
            |r| r.id,
            |_| true,
            ResourceType::BundleReference,
        )
    }

    async fn get_by_id(
        &self,
        conn: &mut MemoryState,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
        bundle_id: Option<Uuid>,
    ) -> Result<BundleReference> {
        let mut matching = conn
            .bundle_references
            .iter()
            .filter(|r| references_object(r, object_type, object_id))
            .filter(|r| bundle_id.is_none() || r.bundle_id == bundle_id);
        match (matching.next(), matching.next()) {
            (Some(r), None) => Ok(r.clone()),
            (None, _) => Err(CompassError::not_found(ResourceType::BundleReference, object_id)),
            (Some(_), Some(_)) => Err(CompassError::internal(format!(
                "unexpected number of bundle references for {object_type} {object_id}"
            ))),
        }
    }

    async fn get_bundle_ids_for_object(
        &self,
        conn: &mut MemoryState,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        Ok(conn
            .bundle_references
            .iter()
            .filter(|r| references_object(r, object_type, object_id))
            .filter_map(|r| r.bundle_id)
            .collect())
    }

    async fn list_by_bundle_id(&self, conn: &mut MemoryState, bundle_id: Uuid) -> Result<Vec<BundleReference>> {
        Ok(conn
            .bundle_references
            .iter()
            .filter(|r| r.bundle_id == Some(bundle_id))
            .cloned()
            .collect())
    }

    async fn list_by_bundle_ids(
        &self,
        conn: &mut MemoryState,
        object_type: BundleReferenceObjectType,
        bundle_ids: &[Uuid],
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<BundleReference>, HashMap<Uuid, i64>)> {
        let offset = decode_offset_cursor(cursor)?;
        let mut page = Vec::new();
        let mut totals = HashMap::new();
        for bundle_id in bundle_ids {
            let mut refs = conn
                .bundle_references
                .iter()
                .filter(|r| r.object_type == object_type && r.bundle_id == Some(*bundle_id))
                .cloned()
                .collect::<Vec<_>>();
            if refs.is_empty() {
                continue;
            }
            refs.sort_by_key(|r| r.object_id);
            totals.insert(*bundle_id, refs.len() as i64);
            page.extend(refs.into_iter().skip(offset as usize).take(page_size as usize));
        }
        Ok((page, totals))
    }

    async fn delete_by_reference_object_id(
        &self,
        conn: &mut MemoryState,
        bundle_id: Uuid,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        let before = conn.bundle_references.len();
        conn.bundle_references
            .retain(|r| !(references_object(r, object_type, object_id) && r.bundle_id == Some(bundle_id)));
        match before - conn.bundle_references.len() {
            0 => Err(CompassError::not_found(ResourceType::BundleReference, object_id)),
            1 => Ok(()),
            n => Err(CompassError::internal(format!(
                "delete should remove single row, but removed {n} rows"
            ))),
        }
    }

    async fn delete_all_for_object(
        &self,
        conn: &mut MemoryState,
        object_type: BundleReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        conn.bundle_references
            .retain(|r| !references_object(r, object_type, object_id));
        Ok(())
    }
}

// ── specifications ───────────────────────────────────────────

pub struct MemorySpecRepository;

fn spec_of(s: &Spec, object_type: SpecReferenceObjectType, object_id: Uuid) -> bool {
    s.object_type == object_type && s.object_id == object_id
}

#[async_trait]
impl SpecRepository<MemoryState> for MemorySpecRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &Spec) -> Result<()> {
        conn.require_parent_owner(tenant, item.object_type.resource_type(), item.object_id)?;
        insert(&mut conn.specs, item, |s| s.id, ResourceType::Specification)
    }

    async fn create_global(&self, conn: &mut MemoryState, item: &Spec) -> Result<()> {
        insert(&mut conn.specs, item, |s| s.id, ResourceType::Specification)
    }

    async fn get_by_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        id: Uuid,
        object_type: SpecReferenceObjectType,
    ) -> Result<Spec> {
        let visible = conn.visible(tenant, ResourceType::Specification, id, false);
        found(
            conn.specs
                .iter()
                .find(|s| s.id == id && s.object_type == object_type && visible),
            ResourceType::Specification,
            id,
        )
    }

    async fn list_by_reference_object_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>> {
        if !conn.visible(tenant, object_type.resource_type(), object_id, false) {
            return Ok(Vec::new());
        }
        Ok(conn
            .specs
            .iter()
            .filter(|s| spec_of(s, object_type, object_id))
            .cloned()
            .collect())
    }

    async fn list_by_reference_object_id_global(
        &self,
        conn: &mut MemoryState,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<Vec<Spec>> {
        Ok(conn
            .specs
            .iter()
            .filter(|s| spec_of(s, object_type, object_id))
            .cloned()
            .collect())
    }

    async fn list_by_reference_object_ids(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_ids: &[Uuid],
    ) -> Result<Vec<Spec>> {
        Ok(conn
            .specs
            .iter()
            .filter(|s| s.object_type == object_type && object_ids.contains(&s.object_id))
            .filter(|s| conn.visible(tenant, ResourceType::Specification, s.id, false))
            .cloned()
            .collect())
    }

    async fn update(&self, conn: &mut MemoryState, tenant: TenantId, item: &Spec) -> Result<()> {
        let allowed = conn.visible(tenant, ResourceType::Specification, item.id, true);
        replace(&mut conn.specs, item, |s| s.id, |_| allowed, ResourceType::Specification)
    }

    async fn update_global(&self, conn: &mut MemoryState, item: &Spec) -> Result<()> {
        replace(&mut conn.specs, item, |s| s.id, |_| true, ResourceType::Specification)
    }

    async fn delete_by_reference_object_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        if !conn.visible(tenant, object_type.resource_type(), object_id, true) {
            return Ok(());
        }
        conn.specs.retain(|s| !spec_of(s, object_type, object_id));
        Ok(())
    }

    async fn delete_by_reference_object_id_global(
        &self,
        conn: &mut MemoryState,
        object_type: SpecReferenceObjectType,
        object_id: Uuid,
    ) -> Result<()> {
        conn.specs.retain(|s| !spec_of(s, object_type, object_id));
        Ok(())
    }
}

// ── entity type mappings ─────────────────────────────────────

pub struct MemoryEntityTypeMappingRepository;

impl MemoryEntityTypeMappingRepository {
    fn by_parent(conn: &MemoryState, resource_type: ResourceType, resource_id: Uuid) -> Result<Vec<EntityTypeMapping>> {
        let mut rows = conn
            .entity_type_mappings
            .iter()
            .filter(|m| m.parent() == Some((resource_type, resource_id)))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|m| m.id);
        Ok(rows)
    }

    fn first_visible(
        conn: &MemoryState,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        Self::by_parent(conn, resource_type, resource_id)?
            .into_iter()
            .find(|m| conn.visible(tenant, ResourceType::EntityTypeMapping, m.id, false))
            .ok_or_else(|| CompassError::not_found(ResourceType::EntityTypeMapping, resource_id))
    }

    fn page(
        conn: &MemoryState,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        let rows = Self::by_parent(conn, resource_type, resource_id)?
            .into_iter()
            .filter(|m| conn.visible(tenant, ResourceType::EntityTypeMapping, m.id, false))
            .collect::<Vec<_>>();
        window(rows, page_size, cursor)
    }
}

#[async_trait]
impl EntityTypeMappingRepository<MemoryState> for MemoryEntityTypeMappingRepository {
    async fn create(&self, conn: &mut MemoryState, tenant: TenantId, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        if let Some((parent, parent_id)) = item.parent() {
            conn.require_parent_owner(tenant, parent, parent_id)?;
        }
        insert(&mut conn.entity_type_mappings, item, |m| m.id, ResourceType::EntityTypeMapping)
    }

    async fn create_global(&self, conn: &mut MemoryState, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        insert(&mut conn.entity_type_mappings, item, |m| m.id, ResourceType::EntityTypeMapping)
    }

    async fn get_by_id(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<EntityTypeMapping> {
        let visible = conn.visible(tenant, ResourceType::EntityTypeMapping, id, false);
        found(
            conn.entity_type_mappings.iter().find(|m| m.id == id && visible),
            ResourceType::EntityTypeMapping,
            id,
        )
    }

    async fn get_by_id_global(&self, conn: &mut MemoryState, id: Uuid) -> Result<EntityTypeMapping> {
        found(
            conn.entity_type_mappings.iter().find(|m| m.id == id),
            ResourceType::EntityTypeMapping,
            id,
        )
    }

    async fn get_by_api_definition_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        api_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        Self::first_visible(conn, tenant, ResourceType::Api, api_id)
    }

    async fn get_by_event_definition_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        event_id: Uuid,
    ) -> Result<EntityTypeMapping> {
        Self::first_visible(conn, tenant, ResourceType::EventDefinition, event_id)
    }

    async fn list_by_api_definition_id_page(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        api_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        Self::page(conn, tenant, ResourceType::Api, api_id, page_size, cursor)
    }

    async fn list_by_event_definition_id_page(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        event_id: Uuid,
        page_size: i64,
        cursor: &str,
    ) -> Result<(Vec<EntityTypeMapping>, Page, i64)> {
        Self::page(conn, tenant, ResourceType::EventDefinition, event_id, page_size, cursor)
    }

    async fn list_by_resource_id(
        &self,
        conn: &mut MemoryState,
        tenant: TenantId,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>> {
        Ok(Self::by_parent(conn, resource_type, resource_id)?
            .into_iter()
            .filter(|m| conn.visible(tenant, ResourceType::EntityTypeMapping, m.id, false))
            .collect())
    }

    async fn list_by_resource_id_global(
        &self,
        conn: &mut MemoryState,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<EntityTypeMapping>> {
        Self::by_parent(conn, resource_type, resource_id)
    }

    async fn update(&self, conn: &mut MemoryState, tenant: TenantId, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        let allowed = conn.visible(tenant, ResourceType::EntityTypeMapping, item.id, true);
        replace(
            &mut conn.entity_type_mappings,
            item,
            |m| m.id,
            |_| allowed,
            ResourceType::EntityTypeMapping,
        )
    }

    async fn update_global(&self, conn: &mut MemoryState, item: &EntityTypeMapping) -> Result<()> {
        item.validate_parent()?;
        replace(
            &mut conn.entity_type_mappings,
            item,
            |m| m.id,
            |_| true,
            ResourceType::EntityTypeMapping,
        )
    }

    async fn exists(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<bool> {
        Ok(conn.visible(tenant, ResourceType::EntityTypeMapping, id, false))
    }

    async fn delete(&self, conn: &mut MemoryState, tenant: TenantId, id: Uuid) -> Result<()> {
        let allowed = conn.visible(tenant, ResourceType::EntityTypeMapping, id, true);
        remove(
            &mut conn.entity_type_mappings,
            id,
            |m| m.id,
            |_| allowed,
            ResourceType::EntityTypeMapping,
        )
    }

    async fn delete_global(&self, conn: &mut MemoryState, id: Uuid) -> Result<()> {
        remove(
            &mut conn.entity_type_mappings,
            id,
            |m| m.id,
            |_| true,
            ResourceType::EntityTypeMapping,
        )
    }
}
