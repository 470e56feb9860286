pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod workers;

use axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::KmsConfig;
use crate::dtos::HealthResponse;
use crate::middleware::metrics_middleware;
use crate::services::{ChangeProcessor, EntityService, KmsDatabase, VerificationService};
use crate::workers::ChangeFeedHandle;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::entities::get_apps,
        handlers::entities::get_api_products,
        handlers::entities::get_companies,
        handlers::entities::get_company_developers,
        handlers::entities::get_developers,
        handlers::entities::get_app_credentials,
        handlers::verify::verify_api_key,
        handlers::verify::verify_api_key_query,
        handlers::changes::apply_changes,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::HealthResponse,
            dtos::ApplyChangesResponse,
            dtos::AppSuccessResponse,
            dtos::AppDetails,
            dtos::CredentialDetails,
            dtos::ApiProductSuccessResponse,
            dtos::ApiProductDetails,
            dtos::CompanySuccessResponse,
            dtos::CompanyDetails,
            dtos::CompanyDevelopersSuccessResponse,
            dtos::CompanyDeveloperDetails,
            dtos::DeveloperSuccessResponse,
            dtos::DeveloperDetails,
            dtos::AppCredentialSuccessResponse,
            dtos::AppCredentialDetails,
            dtos::ConsumerKeyStatusDetails,
            dtos::VerifyApiKeyRequest,
            dtos::VerifyApiKeyResponse,
            dtos::ApiKeyContext,
            dtos::ErrorResult,
            models::Attribute,
        )
    ),
    tags(
        (name = "Entities", description = "Lookups over the replicated KMS catalog"),
        (name = "Verification", description = "API key verification"),
        (name = "Change Feed", description = "Replica maintenance"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: KmsConfig,
    pub db: KmsDatabase,
    pub processor: Arc<ChangeProcessor>,
    pub entities: EntityService,
    pub verification: VerificationService,
    /// Ordered queue in front of `processor`. When absent, POST /changes
    /// applies batches inline.
    pub feed: Option<ChangeFeedHandle>,
}

impl AppState {
    pub fn new(config: KmsConfig, pool: SqlitePool) -> Self {
        let db = KmsDatabase::new(pool);
        Self {
            config,
            processor: Arc::new(ChangeProcessor::new(db.clone())),
            entities: EntityService::new(db.clone()),
            verification: VerificationService::new(db.clone()),
            db,
            feed: None,
        }
    }

    pub fn with_feed(mut self, feed: ChangeFeedHandle) -> Self {
        self.feed = Some(feed);
        self
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let base = state.config.entities_base_path.trim_end_matches('/');

    let entity_routes = Router::new()
        .route(&format!("{base}/apps"), get(handlers::get_apps))
        .route(&format!("{base}/apiproducts"), get(handlers::get_api_products))
        .route(&format!("{base}/companies"), get(handlers::get_companies))
        .route(
            &format!("{base}/companydevelopers"),
            get(handlers::get_company_developers),
        )
        .route(&format!("{base}/developers"), get(handlers::get_developers))
        .route(
            &format!("{base}/appcredentials"),
            get(handlers::get_app_credentials),
        );

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(entity_routes)
        .route(
            "/verifiers/apikey",
            post(handlers::verify_api_key).get(handlers::verify_api_key_query),
        )
        .route("/changes", post(handlers::apply_changes))
        .with_state(state)
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware));

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Replica database unreachable", body = crate::dtos::ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "SQLite health check failed");
        AppError::from(e)
    })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
        change_feed: state.processor.stats().await,
    }))
}
