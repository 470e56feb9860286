//! Entity lookup integration tests.

mod common;

use axum::http::StatusCode;
use common::{product_row, TestApp};
use kms_service::models::{ChangeBatch, ChangeRecord, Row};

#[tokio::test]
async fn app_by_name_is_enriched() {
    let app = TestApp::seeded().await;

    let (status, body) = app.get("/entities/apps?organization=acme&appname=foo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organization"], "acme");
    let details = &body["app"];
    assert_eq!(details["id"], "a1");
    assert_eq!(details["appType"], "DEVELOPER");
    assert_eq!(details["appParentId"], "d1");
    assert_eq!(details["appParentStatus"], "Active");
    assert_eq!(details["apiProducts"], serde_json::json!(["orders"]));
    assert_eq!(details["attributes"][0]["name"], "tier");
    assert_eq!(details["attributes"][0]["value"], "gold");
    assert_eq!(details["appCredentials"][0]["consumerKey"], "k1");
    assert_eq!(
        details["appCredentials"][0]["apiProductReferences"],
        serde_json::json!(["orders"])
    );
    assert_eq!(details["primaryIdentifierType"], "appname");
    assert_eq!(details["secondaryIdentifierType"], "");
}

#[tokio::test]
async fn app_owner_filter_narrows_the_match() {
    let app = TestApp::seeded().await;

    let (status, body) = app
        .get("/entities/apps?organization=acme&appname=foo&developeremail=dev@acme.io")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"]["id"], "a1");
    assert_eq!(body["app"]["secondaryIdentifierType"], "developeremail");

    let (status, body) = app
        .get("/entities/apps?organization=acme&appname=foo&developeremail=other@acme.io")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["app"].is_null());
}

#[tokio::test]
async fn parameter_names_are_case_insensitive() {
    let app = TestApp::seeded().await;

    let (status, body) = app.get("/entities/apps?Organization=acme&AppId=a1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"]["name"], "foo");
}

#[tokio::test]
async fn too_many_identifiers_is_rejected() {
    let app = TestApp::seeded().await;

    let (status, body) = app
        .get("/entities/apps?organization=acme&appname=foo&developeremail=dev@acme.io&developerid=d1")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response_code"], "0");
}

#[tokio::test]
async fn unsupported_secondary_is_rejected() {
    let app = TestApp::seeded().await;

    let (status, _) = app
        .get("/entities/apps?organization=acme&appid=a1&developerid=d1")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn no_identifiers_is_rejected() {
    let app = TestApp::seeded().await;

    let (status, _) = app.get("/entities/developers?organization=acme").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_product_by_resource_filter() {
    let app = TestApp::seeded().await;

    let (status, body) = app
        .get("/entities/apiproducts?organization=acme&consumerkey=k1&apiresource=/test")
        .await;
    assert_eq!(status, StatusCode::OK);
    let product = &body["apiProduct"];
    assert_eq!(product["name"], "orders");
    assert_eq!(product["quotaLimit"], 100);
    assert_eq!(product["environments"], serde_json::json!(["prod", "test"]));

    let (_, body) = app
        .get("/entities/apiproducts?organization=acme&consumerkey=k1&apiresource=/other")
        .await;
    assert!(body["apiProduct"].is_null());
}

#[tokio::test]
async fn unparseable_quota_is_a_data_error() {
    let app = TestApp::seeded().await;
    let batch = ChangeBatch::new(vec![ChangeRecord::insert(
        "kms.api_product",
        product_row("p2", "broken", "{/x}", "{}").with("quota", "lots"),
    )]);
    app.apply(&batch).await;

    let (status, body) = app
        .get("/entities/apiproducts?organization=acme&apiproductname=broken")
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["response_code"], "2");
}

#[tokio::test]
async fn developer_lists_apps_and_companies() {
    let app = TestApp::seeded().await;
    let batch = ChangeBatch::new(vec![
        ChangeRecord::insert(
            "kms.company",
            Row::new()
                .with("id", "c1")
                .with("tenant_id", "t1")
                .with("name", "globex")
                .with("status", "Active"),
        ),
        ChangeRecord::insert(
            "kms.company_developer",
            Row::new()
                .with("tenant_id", "t1")
                .with("company_id", "c1")
                .with("developer_id", "d1")
                .with("roles", "{admin}"),
        ),
    ]);
    app.apply(&batch).await;

    let (status, body) = app
        .get("/entities/developers?organization=acme&developeremail=dev@acme.io")
        .await;
    assert_eq!(status, StatusCode::OK);
    let developer = &body["developer"];
    assert_eq!(developer["id"], "d1");
    assert_eq!(developer["apps"], serde_json::json!(["foo"]));
    assert_eq!(developer["companies"], serde_json::json!(["globex"]));
    assert!(developer.get("password").is_none());

    let (status, body) = app
        .get("/entities/companydevelopers?organization=acme&companyname=globex")
        .await;
    assert_eq!(status, StatusCode::OK);
    let members = &body["companyDevelopers"];
    assert_eq!(members[0]["developerEmail"], "dev@acme.io");
    assert_eq!(members[0]["companyName"], "globex");
    assert_eq!(members[0]["roles"], serde_json::json!(["admin"]));
}

#[tokio::test]
async fn missing_company_yields_null_members() {
    let app = TestApp::seeded().await;

    let (status, body) = app
        .get("/entities/companydevelopers?organization=acme&companyname=nobody")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["companyDevelopers"].is_null());
}

#[tokio::test]
async fn app_credential_carries_key_status() {
    let app = TestApp::seeded().await;

    let (status, body) = app
        .get("/entities/appcredentials?organization=acme&consumerkey=k1")
        .await;

    assert_eq!(status, StatusCode::OK);
    let credential = &body["appCredential"];
    assert_eq!(credential["appName"], "foo");
    assert_eq!(credential["developerId"], "d1");
    assert_eq!(credential["consumerKeyStatus"]["appStatus"], "Approved");
    assert_eq!(credential["consumerKeyStatus"]["appParentStatus"], "Active");
    assert_eq!(credential["consumerKeyStatus"]["isValidKey"], "");
    assert_eq!(credential["redirectUris"], serde_json::json!([]));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::spawn().await.expect("Failed to spawn test app");

    let (status, body) = app.get("/.well-known/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/verifiers/apikey"].is_object());
    assert!(body["paths"]["/entities/apps"].is_object());
}
