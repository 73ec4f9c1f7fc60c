//! Shared helpers for router-level tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use storefront_search::storefront_catalog;
use storefront_server::{AppConfig, AppState, DynCacheStore, LocalCacheStore, build_app};
use storefront_storage::DynDatastore;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.cache.op_timeout_ms = 100;
    cfg.cache.invalidation_retries = 1;
    cfg.rate_limit.enabled = false;
    cfg
}

pub fn app_with_store(cfg: &AppConfig, cache_store: DynCacheStore) -> TestApp {
    app_with_parts(cfg, storefront_db_memory::create_datastore(), cache_store)
}

pub fn app_with_parts(
    cfg: &AppConfig,
    datastore: DynDatastore,
    cache_store: DynCacheStore,
) -> TestApp {
    let registry = Arc::new(storefront_catalog().expect("catalog"));
    let state = AppState::new(cfg, registry, datastore, cache_store);
    TestApp {
        router: build_app(cfg, state.clone()),
        state,
    }
}

/// App on a fresh local store; the store handle is returned for inspection.
pub fn local_app() -> (TestApp, LocalCacheStore) {
    let local = LocalCacheStore::new();
    let app = app_with_store(&config(), Arc::new(local.clone()));
    (app, local)
}

impl TestApp {
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_with(method, uri, body, &[]).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Send an arbitrary body, e.g. one that is not valid JSON.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        body: &'static str,
        content_type: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body)).expect("request");
        self.dispatch(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    /// Create a document and return its `_id`.
    pub async fn create(&self, resource: &str, body: Value) -> String {
        let (status, doc) = self.post(&format!("/api/{resource}"), body).await;
        assert_eq!(status, StatusCode::CREATED, "create {resource}: {doc}");
        doc["_id"].as_str().expect("_id").to_string()
    }
}
