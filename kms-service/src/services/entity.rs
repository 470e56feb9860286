//! Entity lookups by partial identifiers.
//!
//! Each lookup resolves the supplied identifiers against the identifier
//! tree, takes the first matching row and enriches it with attributes and
//! cross-references. No match is a success with an empty payload.

use tracing::{debug, error};

use crate::dtos::{
    ApiProductDetails, ApiProductSuccessResponse, AppCredentialDetails,
    AppCredentialSuccessResponse, AppDetails, AppSuccessResponse, CompanyDetails,
    CompanyDeveloperDetails, CompanyDevelopersSuccessResponse, CompanySuccessResponse,
    ConsumerKeyStatusDetails, CredentialDetails, DeveloperDetails, DeveloperSuccessResponse,
};
use crate::models::{ApiProduct, App, AppCredential, AppParent};
use crate::services::database::KmsDatabase;
use crate::services::error::ServiceError;
use crate::services::identifiers::{EntityKind, IdentifierTree, Identifiers, ResolvedIdentifiers};

#[derive(Clone)]
pub struct EntityService {
    db: KmsDatabase,
    tree: IdentifierTree,
}

impl EntityService {
    pub fn new(db: KmsDatabase) -> Self {
        Self {
            db,
            tree: IdentifierTree::new(),
        }
    }

    fn resolve(
        &self,
        kind: EntityKind,
        ids: &Identifiers,
    ) -> Result<ResolvedIdentifiers, ServiceError> {
        self.tree.resolve(kind, ids).map_err(|e| {
            debug!(kind = %kind, error = %e, "Rejected identifiers");
            ServiceError::from(e)
        })
    }

    pub async fn get_app(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<AppSuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::App, ids)?;
        let apps = self.db.find_apps(&resolved).await.map_err(log_failure("get_app"))?;

        let app = match apps.into_iter().next() {
            Some(app) => Some(self.app_details(app, &resolved).await?),
            None => None,
        };
        Ok(AppSuccessResponse {
            app,
            organization: org.to_string(),
        })
    }

    pub async fn get_api_product(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<ApiProductSuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::ApiProduct, ids)?;
        let products = self
            .db
            .find_api_products(&resolved)
            .await
            .map_err(log_failure("get_api_product"))?;

        let api_product = match products.into_iter().next() {
            Some(product) => Some(self.api_product_details(product, &resolved).await?),
            None => None,
        };
        Ok(ApiProductSuccessResponse {
            api_product,
            organization: org.to_string(),
        })
    }

    pub async fn get_company(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<CompanySuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::Company, ids)?;
        let companies = self
            .db
            .find_companies(&resolved)
            .await
            .map_err(log_failure("get_company"))?;

        let Some(company) = companies.into_iter().next() else {
            return Ok(CompanySuccessResponse {
                company: None,
                organization: org.to_string(),
            });
        };

        let attributes = self.db.find_attributes(&company.tenant_id, &company.id).await?;
        let apps = self
            .db
            .find_app_names_for_parent(&company.tenant_id, &AppParent::Company(company.id.clone()))
            .await?;

        Ok(CompanySuccessResponse {
            company: Some(CompanyDetails {
                apps,
                attributes,
                created_at: company.created_at,
                created_by: company.created_by,
                display_name: company.display_name,
                id: company.id,
                last_modified_at: company.updated_at,
                last_modified_by: company.updated_by,
                name: company.name,
                status: company.status,
                primary_identifier_type: resolved.primary_type.to_string(),
                primary_identifier_value: resolved.primary_value,
            }),
            organization: org.to_string(),
        })
    }

    pub async fn get_company_developers(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<CompanyDevelopersSuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::CompanyDeveloper, ids)?;
        let members = self
            .db
            .find_company_developers(&resolved)
            .await
            .map_err(log_failure("get_company_developers"))?;

        if members.is_empty() {
            return Ok(CompanyDevelopersSuccessResponse {
                company_developers: None,
                organization: org.to_string(),
            });
        }

        let mut details = Vec::with_capacity(members.len());
        for member in members {
            let company_name = self
                .db
                .find_company_name(&member.tenant_id, &member.company_id)
                .await?;
            let developer_email = self
                .db
                .find_developer_email(&member.tenant_id, &member.developer_id)
                .await?;
            details.push(CompanyDeveloperDetails {
                company_name,
                created_at: member.created_at.clone(),
                created_by: member.created_by.clone(),
                developer_email,
                last_modified_at: member.updated_at.clone(),
                last_modified_by: member.updated_by.clone(),
                roles: member.role_list(),
                primary_identifier_type: resolved.primary_type.to_string(),
                primary_identifier_value: resolved.primary_value.clone(),
            });
        }

        Ok(CompanyDevelopersSuccessResponse {
            company_developers: Some(details),
            organization: org.to_string(),
        })
    }

    pub async fn get_developer(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<DeveloperSuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::Developer, ids)?;
        let developers = self
            .db
            .find_developers(&resolved)
            .await
            .map_err(log_failure("get_developer"))?;

        let Some(developer) = developers.into_iter().next() else {
            return Ok(DeveloperSuccessResponse {
                developer: None,
                organization: org.to_string(),
            });
        };

        let tenant_id = developer.tenant_id.as_str();
        let attributes = self.db.find_attributes(tenant_id, &developer.id).await?;
        let companies = self
            .db
            .find_company_names_for_developer(tenant_id, &developer.id)
            .await?;
        let apps = self
            .db
            .find_app_names_for_parent(tenant_id, &AppParent::Developer(developer.id.clone()))
            .await?;

        Ok(DeveloperSuccessResponse {
            developer: Some(DeveloperDetails {
                apps,
                attributes,
                companies,
                created_at: developer.created_at,
                created_by: developer.created_by,
                email: developer.email,
                first_name: developer.first_name,
                id: developer.id,
                last_modified_at: developer.updated_at,
                last_modified_by: developer.updated_by,
                last_name: developer.last_name,
                status: developer.status,
                user_name: developer.username,
                primary_identifier_type: resolved.primary_type.to_string(),
                primary_identifier_value: resolved.primary_value,
            }),
            organization: org.to_string(),
        })
    }

    pub async fn get_app_credential(
        &self,
        org: &str,
        ids: &Identifiers,
    ) -> Result<AppCredentialSuccessResponse, ServiceError> {
        let resolved = self.resolve(EntityKind::AppCredential, ids)?;
        let credentials = self
            .db
            .find_app_credentials(&resolved)
            .await
            .map_err(log_failure("get_app_credential"))?;

        let empty = || AppCredentialSuccessResponse {
            app_credential: None,
            organization: org.to_string(),
        };

        let Some(credential) = credentials.into_iter().next() else {
            return Ok(empty());
        };

        let Some(app) = self
            .db
            .find_app_by_id(&credential.tenant_id, &credential.app_id)
            .await?
        else {
            error!(
                consumer_key = %credential.id,
                app_id = %credential.app_id,
                "Credential references an app that is not replicated"
            );
            return Ok(empty());
        };

        let attributes = self
            .db
            .find_attributes(&credential.tenant_id, &credential.id)
            .await?;
        let parent_status = self.db.find_parent_status(&app.tenant_id, &app.parent).await?;
        let credential_details = self.credential_details(&credential, &app.status).await?;

        let status = ConsumerKeyStatusDetails {
            app_credential: credential_details,
            app_id: app.id.clone(),
            app_name: app.name.clone(),
            app_status: app.status.clone(),
            app_type: app.parent.kind().to_string(),
            app_parent_id: app.parent.id().to_string(),
            app_parent_status: parent_status,
            is_valid_key: String::new(),
        };

        Ok(AppCredentialSuccessResponse {
            app_credential: Some(AppCredentialDetails {
                app_id: credential.app_id.clone(),
                app_name: app.name.clone(),
                attributes,
                consumer_key: credential.id.clone(),
                consumer_key_status: status,
                consumer_secret: credential.consumer_secret.clone(),
                developer_id: app.parent.developer_id().map(str::to_string),
                company_id: app.parent.company_id().map(str::to_string),
                redirect_uris: Vec::new(),
                scopes: credential.scope_list(),
                status: credential.status.clone(),
                primary_identifier_type: resolved.primary_type.to_string(),
                primary_identifier_value: resolved.primary_value,
            }),
            organization: org.to_string(),
        })
    }

    async fn app_details(
        &self,
        app: App,
        resolved: &ResolvedIdentifiers,
    ) -> Result<AppDetails, ServiceError> {
        let tenant_id = app.tenant_id.as_str();
        let attributes = self.db.find_attributes(tenant_id, &app.id).await?;
        let api_products = self.db.find_api_product_names_for_app(tenant_id, &app.id).await?;
        let app_parent_status = self.db.find_parent_status(tenant_id, &app.parent).await?;

        let mut app_credentials = Vec::new();
        for credential in self.db.find_credentials_for_app(tenant_id, &app.id).await? {
            app_credentials.push(self.credential_details(&credential, &app.status).await?);
        }

        Ok(AppDetails {
            access_type: app.access_type,
            api_products,
            app_credentials,
            app_family: app.app_family,
            app_parent_id: app.parent.id().to_string(),
            app_parent_status,
            app_type: app.parent.kind().to_string(),
            attributes,
            callback_url: app.callback_url,
            created_at: app.created_at,
            created_by: app.created_by,
            display_name: app.display_name,
            id: app.id,
            last_modified_at: app.updated_at,
            last_modified_by: app.updated_by,
            name: app.name,
            status: app.status,
            primary_identifier_type: resolved.primary_type.to_string(),
            primary_identifier_value: resolved.primary_value.clone(),
            secondary_identifier_type: resolved.secondary_type_str().to_string(),
            secondary_identifier_value: resolved.secondary_value.clone(),
        })
    }

    async fn api_product_details(
        &self,
        product: ApiProduct,
        resolved: &ResolvedIdentifiers,
    ) -> Result<ApiProductDetails, ServiceError> {
        let quota_limit = product.quota_limit().map_err(|e| {
            error!(product_id = %product.id, quota = %product.quota, "Unparseable quota");
            ServiceError::DataCorruption(format!(
                "invalid quota {:?} for api product {}: {}",
                product.quota, product.id, e
            ))
        })?;
        let attributes = self.db.find_attributes(&product.tenant_id, &product.id).await?;

        Ok(ApiProductDetails {
            api_proxies: product.proxy_list(),
            api_resources: product.resources(),
            approval_type: product.approval_type.clone(),
            attributes,
            created_at: product.created_at.clone(),
            created_by: product.created_by.clone(),
            description: product.description.clone(),
            display_name: product.display_name.clone(),
            environments: product.environment_list(),
            id: product.id.clone(),
            last_modified_at: product.updated_at.clone(),
            last_modified_by: product.updated_by.clone(),
            name: product.name.clone(),
            quota_interval: product.quota_interval,
            quota_limit,
            quota_time_unit: product.quota_time_unit.clone(),
            scopes: product.scope_list(),
            primary_identifier_type: resolved.primary_type.to_string(),
            primary_identifier_value: resolved.primary_value.clone(),
            secondary_identifier_type: resolved.secondary_type_str().to_string(),
            secondary_identifier_value: resolved.secondary_value.clone(),
        })
    }

    async fn credential_details(
        &self,
        credential: &AppCredential,
        app_status: &str,
    ) -> Result<CredentialDetails, ServiceError> {
        let tenant_id = credential.tenant_id.as_str();
        Ok(CredentialDetails {
            api_product_references: self
                .db
                .find_api_product_names_for_credential(tenant_id, &credential.id)
                .await?,
            app_id: credential.app_id.clone(),
            app_status: app_status.to_string(),
            attributes: self.db.find_attributes(tenant_id, &credential.id).await?,
            consumer_key: credential.id.clone(),
            consumer_secret: credential.consumer_secret.clone(),
            expires_at: credential.expires_at.clone(),
            issued_at: credential.issued_at.clone(),
            method_type: credential.method_type.clone(),
            scopes: credential.scope_list(),
            status: credential.status.clone(),
        })
    }
}

fn log_failure(operation: &'static str) -> impl Fn(ServiceError) -> ServiceError {
    move |e| {
        error!(operation, error = %e, "Entity lookup failed");
        e
    }
}
