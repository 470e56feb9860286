//! API product: a bundle of resource paths and scopes granted to credentials.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_text_array;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ApiProduct {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub api_resources: String,
    pub approval_type: String,
    pub scopes: String,
    pub proxies: String,
    pub environments: String,
    pub quota: String,
    pub quota_time_unit: String,
    pub quota_interval: i64,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

impl ApiProduct {
    /// Resource path patterns, in declaration order.
    pub fn resources(&self) -> Vec<String> {
        parse_text_array(&self.api_resources)
    }

    pub fn scope_list(&self) -> Vec<String> {
        parse_text_array(&self.scopes)
    }

    pub fn proxy_list(&self) -> Vec<String> {
        parse_text_array(&self.proxies)
    }

    pub fn environment_list(&self) -> Vec<String> {
        parse_text_array(&self.environments)
    }

    /// Numeric quota; `Ok(0)` when unset.
    pub fn quota_limit(&self) -> Result<i64, std::num::ParseIntError> {
        let quota = self.quota.trim();
        if quota.is_empty() {
            return Ok(0);
        }
        quota.parse()
    }
}
