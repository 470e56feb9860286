//! Membership of a developer in a company.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_text_array;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CompanyDeveloper {
    pub tenant_id: String,
    pub company_id: String,
    pub developer_id: String,
    pub roles: String,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

impl CompanyDeveloper {
    pub fn role_list(&self) -> Vec<String> {
        parse_text_array(&self.roles)
    }
}
