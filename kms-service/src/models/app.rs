//! App model and its owning parent.

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use std::fmt;

pub const APP_TYPE_DEVELOPER: &str = "DEVELOPER";
pub const APP_TYPE_COMPANY: &str = "COMPANY";

/// Owner of an app. Exactly one of developer or company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "UPPERCASE")]
pub enum AppParent {
    Developer(String),
    Company(String),
}

impl AppParent {
    /// Build from the stored kind tag and id.
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Option<Self> {
        match kind.trim().to_ascii_uppercase().as_str() {
            APP_TYPE_DEVELOPER => Some(AppParent::Developer(id.into())),
            APP_TYPE_COMPANY => Some(AppParent::Company(id.into())),
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AppParent::Developer(id) | AppParent::Company(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppParent::Developer(_) => APP_TYPE_DEVELOPER,
            AppParent::Company(_) => APP_TYPE_COMPANY,
        }
    }

    pub fn developer_id(&self) -> Option<&str> {
        match self {
            AppParent::Developer(id) => Some(id),
            AppParent::Company(_) => None,
        }
    }

    pub fn company_id(&self) -> Option<&str> {
        match self {
            AppParent::Company(id) => Some(id),
            AppParent::Developer(_) => None,
        }
    }
}

impl fmt::Display for AppParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub display_name: String,
    pub access_type: String,
    pub callback_url: String,
    pub status: String,
    pub app_family: String,
    pub parent: AppParent,
    pub created_at: String,
    pub created_by: String,
    pub updated_at: String,
    pub updated_by: String,
}

impl<'r> FromRow<'r, SqliteRow> for App {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let parent_type: String = row.try_get("parent_type")?;
        let parent_id: String = row.try_get("parent_id")?;
        let parent = AppParent::from_parts(&parent_type, parent_id).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "parent_type".to_string(),
                source: format!("unknown app parent type: {}", parent_type).into(),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            access_type: row.try_get("access_type")?,
            callback_url: row.try_get("callback_url")?,
            status: row.try_get("status")?,
            app_family: row.try_get("app_family")?,
            parent,
            created_at: row.try_get("created_at")?,
            created_by: row.try_get("created_by")?,
            updated_at: row.try_get("updated_at")?,
            updated_by: row.try_get("updated_by")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_kind_tag_is_case_insensitive() {
        assert_eq!(
            AppParent::from_parts("developer", "d1"),
            Some(AppParent::Developer("d1".to_string()))
        );
        assert_eq!(
            AppParent::from_parts("COMPANY", "c1"),
            Some(AppParent::Company("c1".to_string()))
        );
        assert_eq!(AppParent::from_parts("team", "t1"), None);
    }

    #[test]
    fn parent_exposes_exactly_one_owner() {
        let parent = AppParent::Company("c1".to_string());
        assert_eq!(parent.company_id(), Some("c1"));
        assert_eq!(parent.developer_id(), None);
        assert_eq!(parent.kind(), APP_TYPE_COMPANY);
    }
}
