//! HTTP front end for Lnk.
//!
//! Serves short-link redirects and the add form in front of any
//! [`Store`](lnk_store::Store). A primary process owns a durable
//! [`PrimaryStore`](lnk_store::PrimaryStore) and also exposes it over RPC;
//! a replica caches lookups and forwards writes to its primary.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::{Backend, LnkServer};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use lnk_protocol::HealthResponse;
    use lnk_store::{PrimaryStore, Store, StoreError, StoreResult};
    use tower::util::ServiceExt;

    fn app(store: Arc<dyn Store>) -> Router {
        build_router(AppState::new(store, "localhost:8080", "primary"))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/add")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        async fn put(&self, _url: String) -> StoreResult<String> {
            Err(StoreError::Remote("connection refused".into()))
        }

        async fn get(&self, _key: &str) -> StoreResult<String> {
            Err(StoreError::Remote("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app(Arc::new(PrimaryStore::in_memory()))
            .oneshot(get("/v1/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.role, "primary");
    }

    #[tokio::test]
    async fn add_without_url_serves_form() {
        let response = app(Arc::new(PrimaryStore::in_memory()))
            .oneshot(get("/add"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("<form method=\"POST\" action=\"/add\">"));
    }

    #[tokio::test]
    async fn post_add_returns_short_link() {
        let store = Arc::new(PrimaryStore::in_memory());
        let response = app(store.clone())
            .oneshot(post_form("url=http%3A%2F%2Fa.com%2Fx"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "http://localhost:8080/0");
        assert_eq!(store.get("0").unwrap(), "http://a.com/x");
    }

    #[tokio::test]
    async fn query_add_also_stores() {
        let store = Arc::new(PrimaryStore::in_memory());
        store.set("0", "http://taken.com").unwrap();

        let response = app(store.clone())
            .oneshot(get("/add?url=http%3A%2F%2Fb.com"))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "http://localhost:8080/1");
        assert_eq!(store.get("1").unwrap(), "http://b.com");
    }

    #[tokio::test]
    async fn redirect_to_stored_url() {
        let store = Arc::new(PrimaryStore::in_memory());
        store.set("0", "http://a.com").unwrap();

        let response = app(store).oneshot(get("/0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "http://a.com");
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let response = app(Arc::new(PrimaryStore::in_memory()))
            .oneshot(get("/zzz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remote_failure_is_bad_gateway() {
        let router = app(Arc::new(BrokenStore));

        let response = router.clone().oneshot(get("/0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = router.oneshot(post_form("url=http%3A%2F%2Fa.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn closed_primary_is_unavailable() {
        let store = Arc::new(PrimaryStore::in_memory());
        store.close().await.unwrap();

        let response = app(store)
            .oneshot(post_form("url=http%3A%2F%2Fa.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
