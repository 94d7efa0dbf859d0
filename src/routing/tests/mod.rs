//! Unit tests for the router itself: finalization, registration edge cases and
//! the request preamble. Engine behaviour is covered by the contract suite in
//! `tests/contract.rs`.

use super::*;
use crate::{AxumEngine, Byte, ErrorKind, MatchitEngine, MuxEngine, param};
use http::StatusCode;
use tower::ServiceExt;
use tracing_test::traced_test;

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn post_request(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

pub(crate) async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn echo_id(req: Request<Body>) -> String {
    param(&req, "id")
}

// ============================================================================
// Finalization
// ============================================================================

#[tokio::test]
async fn test_finalize_is_lazy_and_idempotent() {
    let router = Router::new(MatchitEngine::new());
    router.get("/users/:id", echo_id, []);
    assert!(!router.core.table.is_sealed());

    let response = router.clone().oneshot(get_request("/users/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "7");
    assert!(router.core.table.is_sealed());

    assert!(router.finalize().is_ok());
    assert!(router.finalize().is_ok());
}

#[tokio::test]
#[traced_test]
async fn test_late_registration_is_ignored() {
    let router = Router::new(AxumEngine::new());
    router.get("/early", |_req: Request<Body>| async { "early" }, []);
    router.finalize().unwrap();

    router.get("/late", |_req: Request<Body>| async { "late" }, []);
    assert!(logs_contain("route ignored"));

    let response = router.dispatch(get_request("/late")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = router.dispatch(get_request("/early")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_route_fails_finalization() {
    let router = Router::new(MuxEngine::new());
    router.get("/a", |_req: Request<Body>| async { "one" }, []);
    router.get("/a", |_req: Request<Body>| async { "two" }, []);

    let err = router.finalize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);

    // Every request reports the stored failure.
    let response = router.dispatch(get_request("/a")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response).await.contains("ROUTE_REGISTRATION_ERROR"));
}

#[tokio::test]
async fn test_native_conflict_is_a_registration_error() {
    let router = Router::new(AxumEngine::new());
    router.get("/files/*path", echo_id, []);
    router.get("/files/*rest", echo_id, []);

    let err = router.finalize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
}

#[tokio::test]
async fn test_same_pattern_shares_method_table() {
    let router = Router::new(MatchitEngine::new());
    router.get("/items/:id", echo_id, []);
    router.post("/items/:id", |_req: Request<Body>| async { "created" }, []);

    let response = router.dispatch(get_request("/items/3")).await;
    assert_eq!(body_string(response).await, "3");
    let response = router.dispatch(post_request("/items/3", "{}")).await;
    assert_eq!(body_string(response).await, "created");

    let response = router
        .dispatch(
            Request::builder()
                .method(Method::DELETE)
                .uri("/items/3")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[http::header::ALLOW], "GET, POST");
}

// ============================================================================
// Views
// ============================================================================

#[test]
fn test_group_prefix_joins() {
    let router = Router::new(MatchitEngine::new());
    let api = router.group("/api/");
    let v1 = api.group("v1");
    assert_eq!(router.prefix(), "");
    assert_eq!(api.prefix(), "/api");
    assert_eq!(v1.prefix(), "/api/v1");
}

#[test]
fn test_engine_downcast() {
    let router = Router::new(AxumEngine::new());
    assert!(router.engine::<AxumEngine>().is_some());
    assert!(router.engine::<MatchitEngine>().is_none());
    assert_eq!(router.engine_name(), "axum");
}

#[tokio::test]
async fn test_axum_engine_configure_adds_native_fallback() {
    let router = Router::new(AxumEngine::new());
    router
        .engine::<AxumEngine>()
        .unwrap()
        .configure(|native| native.fallback(|| async { (StatusCode::IM_A_TEAPOT, "native") }));
    router.get("/known", |_req: Request<Body>| async { "known" }, []);

    let response = router.dispatch(get_request("/unknown")).await;
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    let response = router.dispatch(get_request("/known")).await;
    assert_eq!(body_string(response).await, "known");
}

// ============================================================================
// Request preamble
// ============================================================================

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let config = RoutingConfig {
        max_body_bytes: Byte::from_u64(4),
        ..RoutingConfig::default()
    };
    let router = Router::with_config(MatchitEngine::new(), &config);
    router.post("/upload", |_req: Request<Body>| async { "stored" }, []);

    let response = router.dispatch(post_request("/upload", "abcdefgh")).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = router.dispatch(post_request("/upload", "abc")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shadow_cache_size_applies_before_finalization() {
    let router = Router::new(MatchitEngine::new());
    router.set_max_shadow_cache_size(0);
    router.get("/a/:b", |req: Request<Body>| async move { param(&req, "b") }, []);
    router.get("/a/*", |_req: Request<Body>| async { "wild" }, []);

    for _ in 0..3 {
        let response = router.dispatch(get_request("/a/x")).await;
        assert_eq!(body_string(response).await, "x");
    }
    assert_eq!(router.core.max_shadow_cache_size.load(Ordering::Acquire), 0);
}
