//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use api::routes::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use doc_store::InMemoryDocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_state().0
}

fn setup_with_state() -> (axum::Router, Arc<AppState<InMemoryDocumentStore>>) {
    let state = api::create_state(InMemoryDocumentStore::new());
    let app = api::create_app(state.clone(), get_metrics_handle(), &Config::default());
    (app, state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn add_category(app: &axum::Router, name: &str) -> String {
    let (status, json) = send(app, "POST", "/categories", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    json["category"]["_id"].as_str().unwrap().to_string()
}

async fn add_promotion(app: &axum::Router, body: Value) -> String {
    let (status, json) = send(app, "POST", "/promotions", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_category() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/categories", Some(json!({"name": "  Books "}))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Category added successfully");
    assert_eq!(json["category"]["name"], "Books");
    assert!(json["category"]["_id"].is_string());

    let (status, json) = send(&app, "GET", "/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_category_validation_and_conflict() {
    let app = setup();

    let (status, json) = send(&app, "POST", "/categories", Some(json!({"name": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = send(&app, "POST", "/categories", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    add_category(&app, "Books").await;
    let (status, json) = send(&app, "POST", "/categories", Some(json!({"name": "Books"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let app = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/promotions")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_category_cascades_to_promotions() {
    let app = setup();
    let id = add_category(&app, "Eletrônicos").await;
    let tv = add_promotion(
        &app,
        json!({"name": "TV", "discount_percent": 20, "categories": ["Eletrônicos"]}),
    )
    .await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/categories/{id}"),
        Some(json!({"name": "Electronics"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Category updated successfully");
    assert_eq!(json["category"], json!({"_id": id, "name": "Electronics"}));

    let (_, found) = send(&app, "GET", "/promotions?category=Electronics", None).await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["_id"], json!(tv));

    let (_, stale) = send(&app, "GET", "/promotions?category=Eletr%C3%B4nicos", None).await;
    assert_eq!(stale, json!([]));
}

#[tokio::test]
async fn test_rename_category_errors() {
    let app = setup();
    let books = add_category(&app, "Books").await;
    add_category(&app, "Games").await;

    // Empty name wins over a malformed id.
    let (status, _) = send(&app, "PUT", "/categories/not-an-id", Some(json!({"name": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "PUT",
        "/categories/not-an-id",
        Some(json!({"name": "Toys"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid category ID format");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/categories/{}", common::DocumentId::new()),
        Some(json!({"name": "Toys"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/categories/{books}"),
        Some(json!({"name": "Games"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_category_untags_promotions() {
    let (app, state) = setup_with_state();
    let id = add_category(&app, "Books").await;
    let promo = add_promotion(&app, json!({"name": "Novel", "categories": ["Books", "Sale"]})).await;

    let (status, json) = send(&app, "DELETE", &format!("/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Category deleted successfully");

    let (_, promotion) = send(&app, "GET", &format!("/promotions/{promo}"), None).await;
    assert_eq!(promotion["categories"], json!(["Sale"]));
    assert!(state.categories.list().await.unwrap().is_empty());

    let (status, _) = send(&app, "DELETE", &format!("/categories/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/categories/xyz", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_and_get_promotion() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/promotions",
        Some(json!({"name": "TV", "value": 1000, "store": "Downtown", "_id": "forged"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Promotion created successfully");
    let id = json["id"].as_str().unwrap().to_string();

    let (status, promotion) = send(&app, "GET", &format!("/promotions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promotion["_id"], json!(id));
    assert_eq!(promotion["store"], "Downtown");
    assert_eq!(promotion["categories"], json!([]));
}

#[tokio::test]
async fn test_create_promotion_rejects_bad_categories() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/promotions",
        Some(json!({"name": "TV", "categories": "Electronics"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "The 'categories' field must be a list of strings");

    let (status, _) = send(&app, "POST", "/promotions", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_promotion_outcomes() {
    let app = setup();
    let id = add_promotion(&app, json!({"name": "TV", "value": 100})).await;
    let uri = format!("/promotions/{id}");

    let (status, json) = send(&app, "PUT", &uri, Some(json!({"value": 80}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Promotion updated successfully");
    assert_eq!(json["promotion"]["value"], 80);
    assert_eq!(json["promotion"]["name"], "TV");

    let (status, json) = send(&app, "PUT", &uri, Some(json!({"value": 80}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "No data was changed in the promotion");
    assert!(json.get("promotion").is_none());

    let (status, _) = send(&app, "PUT", &uri, Some(json!({"categories": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/promotions/{}", common::DocumentId::new());
    let (status, _) = send(&app, "PUT", &missing, Some(json!({"value": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_promotion_id_format() {
    let app = setup();

    for method in ["GET", "DELETE"] {
        let (status, json) = send(&app, method, "/promotions/12345", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid promotion ID format");
    }
    let (status, _) = send(&app, "PUT", "/promotions/12345", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_promotion() {
    let app = setup();
    let id = add_promotion(&app, json!({"name": "TV"})).await;
    let uri = format!("/promotions/{id}");

    let (status, json) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Promotion deleted successfully");

    let (status, json) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Promotion not found");

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_promotions_with_filters() {
    let app = setup();
    add_promotion(&app, json!({"name": "Smart TV", "discount_percent": 10})).await;
    add_promotion(&app, json!({"name": "Radio", "discount_percent": 30})).await;

    let (_, all) = send(&app, "GET", "/promotions", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, exact) = send(&app, "GET", "/promotions?min_discount=10&max_discount=10", None).await;
    assert_eq!(exact.as_array().unwrap().len(), 1);
    assert_eq!(exact[0]["name"], "Smart TV");

    let (status, lenient) = send(&app, "GET", "/promotions?min_discount=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lenient.as_array().unwrap().len(), 2);

    let (_, search) = send(&app, "GET", "/promotions?search_term=radio", None).await;
    assert_eq!(search.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_statistics() {
    let app = setup();
    add_promotion(
        &app,
        json!({"value": 100, "discount_percent": 10, "categories": ["Books"], "valid_until": "2999-12-31"}),
    )
    .await;
    add_promotion(
        &app,
        json!({"value": 50, "categories": [], "valid_until": "2000-01-01"}),
    )
    .await;

    let (status, stats) = send(&app, "GET", "/statistics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_promotions"], 2);
    assert_eq!(stats["promotions_by_category"], json!([{"_id": "Books", "count": 1}]));
    assert_eq!(stats["active_promotions"], 1);
    assert_eq!(stats["expired_promotions"], 1);
    assert_eq!(stats["total_discount_offered"], 10.0);
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let app = setup();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/categories")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    send(&app, "GET", "/statistics", None).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
