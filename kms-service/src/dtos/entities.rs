use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Attribute;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDetails {
    pub api_product_references: Vec<String>,
    pub app_id: String,
    pub app_status: String,
    pub attributes: Vec<Attribute>,
    #[schema(example = "k1")]
    pub consumer_key: String,
    pub consumer_secret: String,
    pub expires_at: String,
    pub issued_at: String,
    pub method_type: String,
    pub scopes: Vec<String>,
    #[schema(example = "Approved")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppDetails {
    pub access_type: String,
    pub api_products: Vec<String>,
    pub app_credentials: Vec<CredentialDetails>,
    pub app_family: String,
    pub app_parent_id: String,
    /// `None` when the owner row is not replicated.
    pub app_parent_status: Option<String>,
    #[schema(example = "DEVELOPER")]
    pub app_type: String,
    pub attributes: Vec<Attribute>,
    pub callback_url: String,
    pub created_at: String,
    pub created_by: String,
    pub display_name: String,
    pub id: String,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub name: String,
    #[schema(example = "Approved")]
    pub status: String,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
    pub secondary_identifier_type: String,
    pub secondary_identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiProductDetails {
    pub api_proxies: Vec<String>,
    pub api_resources: Vec<String>,
    pub approval_type: String,
    pub attributes: Vec<Attribute>,
    pub created_at: String,
    pub created_by: String,
    pub description: String,
    pub display_name: String,
    pub environments: Vec<String>,
    pub id: String,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub name: String,
    pub quota_interval: i64,
    pub quota_limit: i64,
    pub quota_time_unit: String,
    pub scopes: Vec<String>,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
    pub secondary_identifier_type: String,
    pub secondary_identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub apps: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub created_at: String,
    pub created_by: String,
    pub display_name: String,
    pub id: String,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub name: String,
    pub status: String,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDeveloperDetails {
    /// `None` when the company row is not replicated.
    pub company_name: Option<String>,
    pub created_at: String,
    pub created_by: String,
    pub developer_email: Option<String>,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub roles: Vec<String>,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperDetails {
    pub apps: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub companies: Vec<String>,
    pub created_at: String,
    pub created_by: String,
    pub email: String,
    pub first_name: String,
    pub id: String,
    pub last_modified_at: String,
    pub last_modified_by: String,
    pub last_name: String,
    pub status: String,
    pub user_name: String,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerKeyStatusDetails {
    pub app_credential: CredentialDetails,
    pub app_id: String,
    pub app_name: String,
    pub app_status: String,
    pub app_type: String,
    pub app_parent_id: String,
    pub app_parent_status: Option<String>,
    /// Not evaluated; always empty.
    pub is_valid_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppCredentialDetails {
    pub app_id: String,
    pub app_name: String,
    pub attributes: Vec<Attribute>,
    pub consumer_key: String,
    pub consumer_key_status: ConsumerKeyStatusDetails,
    pub consumer_secret: String,
    pub developer_id: Option<String>,
    pub company_id: Option<String>,
    /// Not replicated; always empty.
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub status: String,
    pub primary_identifier_type: String,
    pub primary_identifier_value: String,
}

// ==================== Envelopes ====================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppSuccessResponse {
    pub app: Option<AppDetails>,
    #[schema(example = "acme")]
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiProductSuccessResponse {
    pub api_product: Option<ApiProductDetails>,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanySuccessResponse {
    pub company: Option<CompanyDetails>,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDevelopersSuccessResponse {
    pub company_developers: Option<Vec<CompanyDeveloperDetails>>,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeveloperSuccessResponse {
    pub developer: Option<DeveloperDetails>,
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppCredentialSuccessResponse {
    pub app_credential: Option<AppCredentialDetails>,
    pub organization: String,
}
