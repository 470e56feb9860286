//! API key verification.
//!
//! Walks credential → app → owner → granted products and returns either the
//! key's authorization context or the first check that failed. Denials are
//! values; only storage faults and malformed requests are errors.

use std::fmt;

use tracing::{debug, info};

use crate::dtos::verify::{ApiKeyContext, VerifyApiKeyRequest, ACTION_VERIFY};
use crate::models::{ApiProduct, AppParent};
use crate::services::database::KmsDatabase;
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::path_matcher;

const STATUS_APPROVED: &str = "approved";
const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    UnknownKey,
    KeyNotApproved,
    AppNotApproved,
    DeveloperNotActive,
    CompanyNotActive,
    ResourceNotPermitted,
    ScopeNotPermitted,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::UnknownKey => "oauth.v2.InvalidApiKey",
            DenialReason::KeyNotApproved => "oauth.v2.ApiKeyNotApproved",
            DenialReason::AppNotApproved => {
                "keymanagement.service.invalid_client-app_not_approved"
            }
            DenialReason::DeveloperNotActive => "keymanagement.service.DeveloperStatusNotActive",
            DenialReason::CompanyNotActive => "keymanagement.service.CompanyStatusNotActive",
            DenialReason::ResourceNotPermitted => "oauth.v2.InvalidApiKeyForGivenResource",
            DenialReason::ScopeNotPermitted => "oauth.v2.InvalidScope",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::UnknownKey => "API key not found",
            DenialReason::KeyNotApproved => "API key is not approved",
            DenialReason::AppNotApproved => "App is not approved",
            DenialReason::DeveloperNotActive => "Developer is not active",
            DenialReason::CompanyNotActive => "Company is not active",
            DenialReason::ResourceNotPermitted => "API key is not valid for the requested resource",
            DenialReason::ScopeNotPermitted => "API key is not valid for the requested scope",
        }
    }

    fn inactive_parent(parent: &AppParent) -> Self {
        match parent {
            AppParent::Developer(_) => DenialReason::DeveloperNotActive,
            AppParent::Company(_) => DenialReason::CompanyNotActive,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Granted(ApiKeyContext),
    Denied(DenialReason),
}

fn has_status(status: &str, expected: &str) -> bool {
    status.trim().eq_ignore_ascii_case(expected)
}

/// A product list that is empty places no restriction.
fn allows(declared: &[String], requested: Option<&str>) -> bool {
    match requested.map(str::trim).filter(|r| !r.is_empty()) {
        Some(requested) => declared.is_empty() || declared.iter().any(|d| d == requested),
        None => true,
    }
}

#[derive(Clone)]
pub struct VerificationService {
    db: KmsDatabase,
}

impl VerificationService {
    pub fn new(db: KmsDatabase) -> Self {
        Self { db }
    }

    pub async fn verify(
        &self,
        request: &VerifyApiKeyRequest,
    ) -> Result<VerificationOutcome, ServiceError> {
        if !request.action.eq_ignore_ascii_case(ACTION_VERIFY) {
            return Err(ServiceError::InvalidRequest(format!(
                "unsupported action: {:?}",
                request.action
            )));
        }
        if request.key.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("key is required".to_string()));
        }

        let outcome = self.evaluate(request).await?;
        match &outcome {
            VerificationOutcome::Granted(context) => {
                metrics::record_verification("granted");
                info!(
                    app_id = %context.app_id,
                    products = context.api_products.len(),
                    "API key verified"
                );
            }
            VerificationOutcome::Denied(reason) => {
                metrics::record_verification(reason.code());
                info!(reason = %reason, uri_path = %request.uri_path, "API key denied");
            }
        }
        Ok(outcome)
    }

    async fn evaluate(
        &self,
        request: &VerifyApiKeyRequest,
    ) -> Result<VerificationOutcome, ServiceError> {
        use VerificationOutcome::Denied;

        let Some(credential) = self.db.find_app_credential_by_key(&request.key).await? else {
            return Ok(Denied(DenialReason::UnknownKey));
        };
        if !has_status(&credential.status, STATUS_APPROVED) {
            return Ok(Denied(DenialReason::KeyNotApproved));
        }

        let tenant_id = credential.tenant_id.as_str();
        let app = match self.db.find_app_by_id(tenant_id, &credential.app_id).await? {
            Some(app) if has_status(&app.status, STATUS_APPROVED) => app,
            _ => return Ok(Denied(DenialReason::AppNotApproved)),
        };

        let parent_status = self
            .db
            .find_parent_status(tenant_id, &app.parent)
            .await?
            .filter(|s| has_status(s, STATUS_ACTIVE) || has_status(s, STATUS_APPROVED));
        let Some(parent_status) = parent_status else {
            return Ok(Denied(DenialReason::inactive_parent(&app.parent)));
        };

        let products = self
            .db
            .find_granted_api_products(tenant_id, &credential.id)
            .await?;
        let candidates: Vec<ApiProduct> = products
            .into_iter()
            .filter(|p| allows(&p.environment_list(), request.environment.as_deref()))
            .filter(|p| allows(&p.proxy_list(), request.proxy.as_deref()))
            .filter(|p| path_matcher::matches(&p.resources(), &request.uri_path))
            .collect();
        if candidates.is_empty() {
            debug!(consumer_key = %credential.id, "No granted product matches the request");
            return Ok(Denied(DenialReason::ResourceNotPermitted));
        }

        let scope = request.scope_uuid.trim();
        let credential_scopes = credential.scope_list();
        let granted: Vec<ApiProduct> = if scope.is_empty() {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|p| {
                    credential_scopes.iter().any(|s| s == scope)
                        || p.scope_list().iter().any(|s| s == scope)
                })
                .collect()
        };
        if granted.is_empty() {
            return Ok(Denied(DenialReason::ScopeNotPermitted));
        }

        Ok(VerificationOutcome::Granted(ApiKeyContext {
            key: credential.id.clone(),
            status: credential.status.clone(),
            issued_at: credential.issued_at.clone(),
            expires_at: credential.expires_at.clone(),
            app_id: app.id.clone(),
            app_name: app.name.clone(),
            app_status: app.status.clone(),
            developer_id: app.parent.developer_id().map(str::to_string),
            company_id: app.parent.company_id().map(str::to_string),
            parent_status,
            tenant_id: credential.tenant_id.clone(),
            api_products: granted.into_iter().map(|p| p.name).collect(),
            scopes: credential_scopes,
            redirection_uris: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_compare_case_insensitively() {
        assert!(has_status("Approved", STATUS_APPROVED));
        assert!(has_status(" ACTIVE ", STATUS_ACTIVE));
        assert!(!has_status("Revoked", STATUS_APPROVED));
    }

    #[test]
    fn empty_declared_list_allows_anything() {
        assert!(allows(&[], Some("prod")));
        assert!(allows(&["prod".to_string()], Some("prod")));
        assert!(!allows(&["prod".to_string()], Some("test")));
        assert!(allows(&["prod".to_string()], None));
        assert!(allows(&["prod".to_string()], Some("")));
    }

    #[test]
    fn parent_denial_names_the_parent_kind() {
        assert_eq!(
            DenialReason::inactive_parent(&AppParent::Company("c1".into())),
            DenialReason::CompanyNotActive
        );
        assert_eq!(
            DenialReason::DeveloperNotActive.code(),
            "keymanagement.service.DeveloperStatusNotActive"
        );
    }
}
