//! Entity lookup endpoints.
//!
//! Every endpoint takes `organization` plus up to two identifier parameters.
//! Parameter names are case-insensitive and unknown parameters are ignored.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    ApiProductSuccessResponse, AppCredentialSuccessResponse, AppSuccessResponse,
    CompanyDevelopersSuccessResponse, CompanySuccessResponse, DeveloperSuccessResponse,
};
use crate::services::identifiers::{IdentifierType, Identifiers};
use crate::AppState;

pub const ORGANIZATION_PARAM: &str = "organization";

/// Split query parameters into the organization and the identifier set.
pub fn extract_identifiers(params: Vec<(String, String)>) -> Result<(String, Identifiers), AppError> {
    let mut organization = String::new();
    let mut identifiers = Identifiers::new();

    for (name, value) in params {
        if name.eq_ignore_ascii_case(ORGANIZATION_PARAM) {
            organization = value;
            continue;
        }
        let Ok(identifier) = name.parse::<IdentifierType>() else {
            continue;
        };
        if identifiers.insert(identifier, value).is_some() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "identifier {} supplied more than once",
                identifier
            )));
        }
    }

    Ok((organization, identifiers))
}

/// Look up an app.
#[utoipa::path(
    get,
    path = "/entities/apps",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("appid" = Option<String>, Query, description = "App id"),
        ("appname" = Option<String>, Query, description = "App name"),
        ("consumerkey" = Option<String>, Query, description = "Consumer key of a credential"),
        ("developeremail" = Option<String>, Query, description = "Owning developer's email"),
        ("developerid" = Option<String>, Query, description = "Owning developer's id"),
        ("companyname" = Option<String>, Query, description = "Company name")
    ),
    responses(
        (status = 200, description = "App, or null when nothing matches", body = AppSuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Storage fault", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_apps(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AppSuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_app(&org, &ids).await?))
}

/// Look up an API product.
#[utoipa::path(
    get,
    path = "/entities/apiproducts",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("apiproductname" = Option<String>, Query, description = "API product name"),
        ("appid" = Option<String>, Query, description = "App id"),
        ("appname" = Option<String>, Query, description = "App name"),
        ("consumerkey" = Option<String>, Query, description = "Consumer key of a credential"),
        ("apiresource" = Option<String>, Query, description = "Resource path listed by the product")
    ),
    responses(
        (status = 200, description = "API product, or null when nothing matches", body = ApiProductSuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Storage fault or corrupt quota", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_api_products(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ApiProductSuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_api_product(&org, &ids).await?))
}

/// Look up a company.
#[utoipa::path(
    get,
    path = "/entities/companies",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("companyname" = Option<String>, Query, description = "Company name"),
        ("appid" = Option<String>, Query, description = "App id"),
        ("consumerkey" = Option<String>, Query, description = "Consumer key of a credential")
    ),
    responses(
        (status = 200, description = "Company, or null when nothing matches", body = CompanySuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_companies(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<CompanySuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_company(&org, &ids).await?))
}

/// List the developers of a company.
#[utoipa::path(
    get,
    path = "/entities/companydevelopers",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("companyname" = Option<String>, Query, description = "Company name")
    ),
    responses(
        (status = 200, description = "Memberships, or null when nothing matches", body = CompanyDevelopersSuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_company_developers(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<CompanyDevelopersSuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_company_developers(&org, &ids).await?))
}

/// Look up a developer.
#[utoipa::path(
    get,
    path = "/entities/developers",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("developeremail" = Option<String>, Query, description = "Owning developer's email"),
        ("developerid" = Option<String>, Query, description = "Owning developer's id"),
        ("appid" = Option<String>, Query, description = "App id"),
        ("consumerkey" = Option<String>, Query, description = "Consumer key of a credential")
    ),
    responses(
        (status = 200, description = "Developer, or null when nothing matches", body = DeveloperSuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_developers(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DeveloperSuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_developer(&org, &ids).await?))
}

/// Look up an app credential.
#[utoipa::path(
    get,
    path = "/entities/appcredentials",
    params(
        ("organization" = Option<String>, Query, description = "Organization, echoed back"),
        ("consumerkey" = Option<String>, Query, description = "Consumer key of a credential")
    ),
    responses(
        (status = 200, description = "Credential, or null when nothing matches", body = AppCredentialSuccessResponse),
        (status = 400, description = "Invalid identifiers", body = crate::dtos::ErrorResponse)
    ),
    tag = "Entities"
)]
pub async fn get_app_credentials(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AppCredentialSuccessResponse>, AppError> {
    let (org, ids) = extract_identifiers(params)?;
    Ok(Json(state.entities.get_app_credential(&org, &ids).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let (org, ids) =
            extract_identifiers(params(&[("Organization", "acme"),
        ("AppName", "foo")])).unwrap();
        assert_eq!(org, "acme");
        assert_eq!(ids.get(&IdentifierType::AppName).map(String::as_str), Some("foo"));
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let (_, ids) = extract_identifiers(params(&[("appid", "a1"),
        ("page", "2")])).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_repeated_identifier_is_rejected() {
        let result = extract_identifiers(params(&[("appid", "a1"),
        ("APPID", "a2")]));
        assert!(result.is_err());
    }
}
