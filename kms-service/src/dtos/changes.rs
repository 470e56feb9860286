use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::ingestion::FeedStats;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyChangesResponse {
    /// Records committed; 0 for an empty batch.
    #[schema(example = 3)]
    pub applied: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub service: String,
    pub version: String,
    #[schema(value_type = Object)]
    pub change_feed: FeedStats,
}
