use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::verification::{DenialReason, VerificationOutcome};

pub const ACTION_VERIFY: &str = "verify";

/// Body of `POST /verifiers/apikey`, or its query string on `GET`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct VerifyApiKeyRequest {
    #[serde(default)]
    #[schema(example = "k1")]
    #[param(example = "k1")]
    pub key: String,

    #[serde(default, alias = "uripath")]
    #[schema(example = "/orders/42")]
    pub uri_path: String,

    #[serde(default, alias = "scopeuuid")]
    #[schema(example = "XYZ")]
    pub scope_uuid: String,

    #[serde(default)]
    #[schema(example = "verify")]
    pub action: String,

    /// Deployment environment of the calling gateway.
    #[serde(default)]
    pub environment: Option<String>,

    /// Proxy the request came through.
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Authorization context of a verified key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyContext {
    pub key: String,
    pub status: String,
    pub issued_at: String,
    pub expires_at: String,
    pub app_id: String,
    pub app_name: String,
    pub app_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub parent_status: String,
    pub tenant_id: String,
    pub api_products: Vec<String>,
    pub scopes: Vec<String>,
    #[serde(rename = "redirectionURIs")]
    pub redirection_uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    #[schema(example = "oauth.v2.InvalidApiKey")]
    pub error_code: String,
    pub reason: String,
}

impl From<DenialReason> for ErrorResult {
    fn from(reason: DenialReason) -> Self {
        Self {
            error_code: reason.code().to_string(),
            reason: reason.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum VerifyApiKeyResponse {
    #[serde(rename = "APIKeyContext")]
    Granted {
        #[serde(rename = "rspInfo")]
        rsp_info: ApiKeyContext,
    },
    #[serde(rename = "ErrorResult")]
    Denied { result: ErrorResult },
}

impl From<VerificationOutcome> for VerifyApiKeyResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        match outcome {
            VerificationOutcome::Granted(context) => VerifyApiKeyResponse::Granted {
                rsp_info: context,
            },
            VerificationOutcome::Denied(reason) => VerifyApiKeyResponse::Denied {
                result: reason.into(),
            },
        }
    }
}
