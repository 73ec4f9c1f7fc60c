//! Router-level tests for listing, CRUD and write invalidation on the local store.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{config, local_app};
use serde_json::json;
use storefront_server::RateLimiter;

#[tokio::test]
async fn pagination_over_twelve_products() {
    let (app, _) = local_app();
    for i in 0..12 {
        app.create("products", json!({ "name": format!("Product {i:02}"), "price": i }))
            .await;
    }

    let (status, page) = app.get("/api/products?perPage=5&page=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 12);
    assert_eq!(page["pages"], 3);
    assert_eq!(page["current"], 3);
    assert_eq!(page["docs"].as_array().unwrap().len(), 2);
    assert_eq!(page["docs"][0]["name"], "Product 10");

    let (_, page) = app.get("/api/products").await;
    assert_eq!(page["docs"].as_array().unwrap().len(), 5);
    assert_eq!(page["current"], 1);
}

#[tokio::test]
async fn empty_collection_has_zero_pages() {
    let (app, _) = local_app();
    let (status, page) = app.get("/api/vouchers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
    assert_eq!(page["pages"], 0);
    assert!(page["docs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_sort_and_whitelist_fallbacks() {
    let (app, _) = local_app();
    for (name, price, status) in [
        ("Desk Lamp", 30, "active"),
        ("Floor Lamp", 80, "draft"),
        ("Office Chair", 120, "active"),
    ] {
        app.create("products", json!({ "name": name, "price": price, "status": status }))
            .await;
    }

    let (_, page) = app
        .get("/api/products?search=lamp&searchField=name&sortField=price&sortOrder=desc")
        .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["docs"][0]["name"], "Floor Lamp");

    let (_, page) = app.get("/api/products?search=desk&searchField=name&searchType=startsWith").await;
    assert_eq!(page["total"], 1);

    // `status` is filterable but not searchable: search is dropped, not rejected.
    let (status, page) = app.get("/api/products?search=draft&searchField=status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);

    // Unknown sort field falls back to creation order.
    let (_, page) = app.get("/api/products?sortField=password").await;
    assert_eq!(page["docs"][0]["name"], "Desk Lamp");

    let (_, page) = app.get("/api/products?filters=%7B%22status%22%3A%22active%22%7D").await;
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn invalid_parameters_are_client_errors() {
    let (app, store) = local_app();

    for uri in [
        "/api/products?filters=%7Bstatus",
        "/api/products?filters=%5B1%2C2%5D",
        "/api/products?page=0",
        "/api/products?perPage=abc",
        "/api/products?perPage=1000",
        "/api/products?filters=%7B%22%24where%22%3A%221%22%7D",
    ] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "bad_request", "{uri}");
    }
    // Nothing reached the cache.
    assert!(store.is_empty());

    let (status, body) = app.get("/api/wishlists").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn read_update_delete_lifecycle() {
    let (app, _) = local_app();
    let brand = app.create("brands", json!({ "name": "Acme" })).await;
    let id = app
        .create("products", json!({ "name": "Lamp", "brand": brand, "price": 10 }))
        .await;

    let (status, doc) = app.get(&format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["brand"]["name"], "Acme");
    assert!(doc["createdAt"].is_string());

    let (status, doc) = app
        .put(&format!("/api/products/{id}"), json!({ "price": 12, "_id": "hijack" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["price"], 12);
    assert_eq!(doc["_id"], id.as_str());

    // The cached read was swept by the update.
    let (_, doc) = app.get(&format!("/api/products/{id}")).await;
    assert_eq!(doc["price"], 12);

    let (status, _) = app.delete(&format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get(&format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app.delete(&format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.put("/api/products/missing", json!({ "price": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_and_bodies_are_rejected() {
    let (app, _) = local_app();

    let (status, _) = app.get("/api/products/bad%20id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/api/products", json!([1, 2, 3])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    app.create("products", json!({ "_id": "fixed-1", "name": "A" })).await;
    let (status, body) = app
        .post("/api/products", json!({ "_id": "fixed-1", "name": "B" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn extractor_rejections_use_the_error_body() {
    let (app, store) = local_app();

    let (status, body) = app.get("/api/products?page=1&page=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("query string"));

    let (status, body) = app.get("/api/products/%FF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = app
        .send_raw(Method::POST, "/api/products", "{not json", Some("application/json"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("request body"));

    let (status, body) = app
        .send_raw(Method::POST, "/api/products", "{}", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    assert!(store.is_empty());
}

#[tokio::test]
async fn writes_invalidate_cached_lists() {
    let (app, store) = local_app();
    app.create("products", json!({ "name": "First" })).await;

    let (_, page) = app.get("/api/products").await;
    assert_eq!(page["total"], 1);
    assert!(!store.is_empty());

    app.create("products", json!({ "name": "Second" })).await;
    let (_, page) = app.get("/api/products").await;
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn writes_reach_resources_that_embed_the_target() {
    let (app, _) = local_app();
    let order = app
        .create("orders", json!({ "code": "A-1", "status": "pending" }))
        .await;
    app.create("payments", json!({ "order": order, "amount": 50 }))
        .await;

    let (_, page) = app.get("/api/payments").await;
    assert_eq!(page["docs"][0]["order"]["status"], "pending");

    app.put(&format!("/api/orders/{order}"), json!({ "status": "paid" }))
        .await;

    let (_, page) = app.get("/api/payments").await;
    assert_eq!(page["docs"][0]["order"]["status"], "paid");
}

#[tokio::test]
async fn concurrent_order_writes_leave_no_stale_list() {
    let (app, _) = local_app();
    let (_, page) = app.get("/api/orders?perPage=100").await;
    assert_eq!(page["total"], 0);

    let writes = (0..10).map(|i| {
        let app = &app;
        async move {
            app.post("/api/orders", json!({ "code": format!("O-{i}") }))
                .await
        }
    });
    for (status, _) in futures_util::future::join_all(writes).await {
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = app.get("/api/orders?perPage=100").await;
    assert_eq!(page["total"], 10);
}

#[tokio::test]
async fn manual_sweep_reports_deleted_keys() {
    let (app, store) = local_app();
    app.create("banners", json!({ "title": "Sale" })).await;
    app.get("/api/banners").await;
    app.get("/api/banners?page=2").await;
    app.get("/api/users").await;

    let (status, body) = app
        .send(Method::POST, "/api/cache/invalidate/banners", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);
    // The users page is still cached.
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn write_rate_limit_returns_429() {
    let (mut app, _) = local_app();
    let state = app
        .state
        .clone()
        .with_rate_limiter(Some(RateLimiter::new(Duration::from_secs(60), 2)));
    app.router = storefront_server::build_app(&config(), state);

    let client = [("x-forwarded-for", "203.0.113.9")];
    for _ in 0..2 {
        let (status, _) = app
            .send_with(Method::POST, "/api/brands", Some(json!({ "name": "x" })), &client)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = app
        .send_with(Method::POST, "/api/brands", Some(json!({ "name": "x" })), &client)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    // Reads and other clients are unaffected.
    let (status, _) = app.send_with(Method::GET, "/api/brands", None, &client).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send_with(
            Method::POST,
            "/api/brands",
            Some(json!({ "name": "y" })),
            &[("x-forwarded-for", "198.51.100.1")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn health_endpoints() {
    let (app, _) = local_app();
    let (status, body) = app.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"]["mode"], "local");
    assert_eq!(body["cache"]["reachable"], true);
    assert_eq!(body["resources"], 15);
}
