//! Shared setup for kms-service integration tests.
//!
//! Each `TestApp` owns a private in-memory SQLite replica and drives the
//! router in-process through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use kms_service::{
    build_router,
    config::KmsConfig,
    db,
    models::{ChangeBatch, ChangeRecord, Row},
    services::ServiceError,
    workers::ChangeFeedWorker,
    AppState,
};
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub feed_worker: Option<JoinHandle<Result<(), ServiceError>>>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let config = KmsConfig::for_tests();

        kms_service::services::metrics::init_metrics()?;

        let pool = db::create_pool(&config.database).await?;
        db::run_migrations(&pool).await?;

        let mut state = AppState::new(config.clone(), pool);
        let mut feed_worker = None;
        if config.change_feed.enabled {
            let (worker, handle) =
                ChangeFeedWorker::new(state.processor.clone(), config.change_feed.queue_size);
            feed_worker = Some(worker.spawn());
            state = state.with_feed(handle);
        }
        let router = build_router(state.clone())?;

        Ok(Self {
            router,
            state,
            feed_worker,
        })
    }

    /// Spawn and load the reference catalog.
    pub async fn seeded() -> Self {
        let app = Self::spawn().await.expect("Failed to spawn test app");
        let applied = app
            .state
            .processor
            .apply_batch(&seed_batch())
            .await
            .expect("Failed to seed catalog");
        assert_eq!(applied, seed_batch().len());
        app
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn apply(&self, batch: &ChangeBatch) -> (StatusCode, serde_json::Value) {
        let body = serde_json::to_value(batch).expect("Failed to encode batch");
        self.post_json("/changes", &body).await
    }

    pub async fn verify(&self, key: &str, uri_path: &str, scope: &str) -> serde_json::Value {
        let (status, body) = self
            .post_json(
                "/verifiers/apikey",
                &serde_json::json!({
                    "key": key,
                    "uriPath": uri_path,
                    "scopeUuid": scope,
                    "action": "verify",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "unexpected verify response: {body}");
        body
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }
}

pub fn developer_row(id: &str, email: &str, status: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("tenant_id", "t1")
        .with("username", id)
        .with("first_name", "Dev")
        .with("last_name", id)
        .with("email", email)
        .with("status", status)
}

pub fn app_row(id: &str, name: &str, developer_id: &str, status: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("tenant_id", "t1")
        .with("name", name)
        .with("display_name", name)
        .with("developer_id", developer_id)
        .with("status", status)
        .with("access_type", "read")
}

pub fn product_row(id: &str, name: &str, resources: &str, scopes: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("tenant_id", "t1")
        .with("name", name)
        .with("api_resources", resources)
        .with("scopes", scopes)
        .with("environments", "{prod,test}")
        .with("quota", "100")
        .with("quota_time_unit", "minute")
        .with("quota_interval", "1")
}

pub fn credential_row(key: &str, app_id: &str, status: &str) -> Row {
    Row::new()
        .with("id", key)
        .with("tenant_id", "t1")
        .with("app_id", app_id)
        .with("status", status)
        .with("consumer_secret", "s3cret")
        .with("issued_at", "2024-01-01T00:00:00Z")
        .with("scopes", "{}")
}

pub fn mapping_row(key: &str, app_id: &str, product_id: &str, status: &str) -> Row {
    Row::new()
        .with("tenant_id", "t1")
        .with("appcred_id", key)
        .with("app_id", app_id)
        .with("apiprdt_id", product_id)
        .with("status", status)
}

/// Developer d1 owns approved app a1 whose key k1 is granted product p1
/// over `/test` and `/orders/**` with scope XYZ.
pub fn seed_batch() -> ChangeBatch {
    ChangeBatch::new(vec![
        ChangeRecord::insert("kms.developer", developer_row("d1", "dev@acme.io", "Active")),
        ChangeRecord::insert("kms.app", app_row("a1", "foo", "d1", "Approved")),
        ChangeRecord::insert(
            "kms.api_product",
            product_row("p1", "orders", "{/test,/orders/**}", "{XYZ}"),
        ),
        ChangeRecord::insert("kms.app_credential", credential_row("k1", "a1", "Approved")),
        ChangeRecord::insert(
            "kms.app_credential_apiproduct_mapper",
            mapping_row("k1", "a1", "p1", "Approved"),
        ),
        ChangeRecord::insert(
            "kms.attributes",
            Row::new()
                .with("tenant_id", "t1")
                .with("app_id", "a1")
                .with("name", "tier")
                .with("value", "gold"),
        ),
    ])
}
