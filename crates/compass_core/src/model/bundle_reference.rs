use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::Result;
use crate::pagination::{decode_offset_cursor, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum BundleReferenceObjectType {
    #[strum(serialize = "API")]
    #[serde(rename = "API")]
    Api,
    #[strum(serialize = "Event")]
    #[serde(rename = "Event")]
    Event,
}

/// Stateful link between a bundle and an API or event definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleReference {
    pub id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub object_type: BundleReferenceObjectType,
    pub object_id: Option<Uuid>,
    pub api_default_target_url: Option<String>,
    pub is_default_bundle: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BundleReferenceInput {
    pub api_default_target_url: Option<String>,
    pub is_default_bundle: Option<bool>,
}

impl BundleReferenceInput {
    pub fn to_bundle_reference(
        &self,
        id: Uuid,
        bundle_id: Option<Uuid>,
        object_type: BundleReferenceObjectType,
        object_id: Option<Uuid>,
    ) -> BundleReference {
        // Only API references carry a target URL.
        let api_default_target_url = match object_type {
            BundleReferenceObjectType::Api => self.api_default_target_url.clone(),
            BundleReferenceObjectType::Event => None,
        };
        BundleReference {
            id,
            bundle_id,
            object_type,
            object_id,
            api_default_target_url,
            is_default_bundle: self.is_default_bundle,
        }
    }
}

/// Splits definitions fetched for a page of references back into one page
/// per bundle, in `bundle_ids` order.
///
/// `items` may contain rows the caller's tenant cannot see filtered out;
/// missing IDs are skipped. `total_counts` holds the unpaged reference count
/// per bundle.
pub fn pages_per_bundle<T: Clone>(
    bundle_ids: &[Uuid],
    references: &[BundleReference],
    total_counts: &HashMap<Uuid, i64>,
    items: &[T],
    id_of: impl Fn(&T) -> Uuid,
    page_size: i64,
    cursor: &str,
) -> Result<Vec<(Vec<T>, Page, i64)>> {
    let offset = decode_offset_cursor(cursor)?;
    let by_id = items.iter().map(|item| (id_of(item), item)).collect::<HashMap<_, _>>();

    Ok(bundle_ids
        .iter()
        .map(|bundle_id| {
            let data = references
                .iter()
                .filter(|r| r.bundle_id == Some(*bundle_id))
                .filter_map(|r| r.object_id)
                .filter_map(|id| by_id.get(&id).map(|item| (*item).clone()))
                .collect::<Vec<_>>();
            let total = total_counts.get(bundle_id).copied().unwrap_or(0);
            let page = Page::at_offset(cursor, offset, page_size, data.len(), total);
            (data, page, total)
        })
        .collect())
}
