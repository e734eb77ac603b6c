use serde::{Deserialize, Serialize};

use crate::library::ItemId;

/// Body of `POST /api/library/batch/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRefreshRequest {
    pub ids: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRefreshError {
    pub id: ItemId,
    pub error: String,
}

/// Server partition of a batch: every requested id should appear exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchRefreshResponse {
    #[serde(default)]
    pub success: Vec<ItemId>,
    #[serde(default)]
    pub failed: Vec<BatchRefreshError>,
}
