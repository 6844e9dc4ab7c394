pub mod apis;
pub mod applications;
pub mod bundles;
pub mod destinations;
pub mod entity_type_mappings;
pub mod health;

use serde::Deserialize;

/// Cursor paging shared by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page_size")]
    pub first: i64,
    #[serde(default)]
    pub after: String,
}

fn default_page_size() -> i64 {
    100
}
