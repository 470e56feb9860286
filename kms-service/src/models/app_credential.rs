//! App credential: the consumer key presented for verification.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_text_array;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AppCredential {
    /// The consumer key itself.
    pub id: String,
    pub tenant_id: String,
    pub consumer_secret: String,
    pub app_id: String,
    pub method_type: String,
    pub status: String,
    pub issued_at: String,
    pub expires_at: String,
    pub scopes: String,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

impl AppCredential {
    pub fn scope_list(&self) -> Vec<String> {
        parse_text_array(&self.scopes)
    }
}
