//! Benchmarks for measuring dispatch overhead per engine.
//!
//! Each engine serves the same table. `native` hits a route the engine
//! matches directly, `shadow` hits a route under a prefix that the shadow
//! router resolves.

use axum::body::Body;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::Request;
use std::hint::black_box;
#[cfg(feature = "path-tree")]
use switchyard::PathTreeEngine;
#[cfg(feature = "recognizer")]
use switchyard::RecognizerEngine;
use switchyard::{AxumEngine, Engine, MatchitEngine, Middleware, MuxEngine, Next, Router, param};
use tower::ServiceExt;

/// Creates a minimal request for benchmarking
fn test_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// Registers the shared table: plain routes plus a param/wildcard collision
/// under `/files`.
fn build_router<E: Engine>(engine: E) -> Router {
    let router = Router::new(engine);
    router.get("/", |_req: Request<Body>| async { "OK" }, []);
    router.get(
        "/users/:id",
        |req: Request<Body>| async move { param(&req, "id") },
        [],
    );
    router.get(
        "/files/:name/meta",
        |req: Request<Body>| async move { param(&req, "name") },
        [],
    );
    router.get(
        "/files/*path",
        |req: Request<Body>| async move { param(&req, "path") },
        [],
    );
    router.finalize().unwrap();
    router
}

fn engines() -> Vec<(&'static str, Router)> {
    let mut routers = vec![
        ("axum", build_router(AxumEngine::new())),
        ("matchit", build_router(MatchitEngine::new())),
        ("mux", build_router(MuxEngine::new())),
    ];
    #[cfg(feature = "recognizer")]
    routers.push(("recognizer", build_router(RecognizerEngine::new())));
    #[cfg(feature = "path-tree")]
    routers.push(("path-tree", build_router(PathTreeEngine::new())));
    routers
}

/// Benchmark: routes each engine matches natively
fn bench_native(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("native");

    for (name, router) in engines() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &router, |b, router| {
            b.to_async(&rt).iter(|| async {
                let response = router
                    .clone()
                    .oneshot(test_request("/users/42"))
                    .await
                    .unwrap();
                black_box(response)
            })
        });
    }

    group.finish();
}

/// Benchmark: routes resolved by the shadow router
fn bench_shadow(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("shadow");

    for (name, router) in engines() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &router, |b, router| {
            b.to_async(&rt).iter(|| async {
                let response = router
                    .clone()
                    .oneshot(test_request("/files/report.pdf/meta"))
                    .await
                    .unwrap();
                black_box(response)
            })
        });
    }

    group.finish();
}

/// Benchmark: cost of each additional middleware layer
fn bench_middleware_depth(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("middleware_depth");

    for depth in [0usize, 1, 5, 10] {
        let mut router = Router::new(MatchitEngine::new());
        for _ in 0..depth {
            router.layer(Middleware::from_fn(|req: Request<Body>, next: Next| async move {
                next.run(req).await
            }));
        }
        router.get("/", |_req: Request<Body>| async { "OK" }, []);
        router.finalize().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &router, |b, router| {
            b.to_async(&rt).iter(|| async {
                let response = router.clone().oneshot(test_request("/")).await.unwrap();
                black_box(response)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_native, bench_shadow, bench_middleware_depth);
criterion_main!(benches);
