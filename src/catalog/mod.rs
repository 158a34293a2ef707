//! Purpose: Define the upstream content catalog seam.
//! Exports: `Catalog`, `ResultMeta`, `RemoteCatalog`.
//! Role: The only place search results and metadata come from.
//! Invariants: Every failure surfaces as `ErrorKind::Upstream` (opaque to callers).
//! Invariants: Implementations never retry; callers decide whether to ask again.

mod remote;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::Error;

pub use remote::RemoteCatalog;

/// Display metadata for one search result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gicon: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResultMeta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_item_ids_for_search(&self, query: &str) -> Result<Vec<String>, Error>;

    async fn get_metadata_for_item_ids(&self, item_ids: &[String])
    -> Result<Vec<ResultMeta>, Error>;
}

#[cfg(test)]
mod tests {
    use super::ResultMeta;
    use serde_json::json;

    #[test]
    fn result_meta_keeps_unknown_fields() {
        let value = json!({
            "id": "c/1?sci",
            "name": "Gravity",
            "clipboardText": "gravity",
        });
        let meta: ResultMeta = serde_json::from_value(value.clone()).expect("meta");
        assert_eq!(meta.name.as_deref(), Some("Gravity"));
        assert_eq!(meta.description, None);
        assert_eq!(meta.extra.get("clipboardText"), Some(&json!("gravity")));
        assert_eq!(serde_json::to_value(&meta).expect("encode"), value);
    }
}
