//! Routing contract shared by every engine.
//!
//! Each case in [`cases`] builds its routes on a fresh [`Router`] and drives
//! it in-process with `oneshot()`. The `contract_suite!` macro instantiates
//! every case once per engine, so a behavioural difference between engines
//! shows up as a failure in that engine's module only.

use axum::body::Body;
use http::{HeaderMap, Method, StatusCode};
#[cfg(feature = "path-tree")]
use switchyard::PathTreeEngine;
#[cfg(feature = "recognizer")]
use switchyard::RecognizerEngine;
use switchyard::{
    AxumEngine, MatchitEngine, Middleware, MuxEngine, Next, Request, Router, param,
    request_state, set_state_value,
};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

async fn send(router: &Router, req: Request) -> (StatusCode, HeaderMap, String) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    send(router, http::Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: &Router, uri: &str, body: &'static str) -> (StatusCode, HeaderMap, String) {
    send(router, http::Request::post(uri).body(Body::from(body)).unwrap()).await
}

fn tag_header(name: &'static str) -> Middleware {
    Middleware::from_fn(move |req: Request, next: Next| async move {
        let mut res = next.run(req).await;
        res.headers_mut().insert(name, "1".parse().unwrap());
        res
    })
}

#[derive(Clone)]
struct Tag(&'static str);

mod cases {
    use super::*;
    use axum::response::IntoResponse;
    use std::{
        convert::Infallible,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    pub async fn plain_param(router: Router) {
        router.get("/users/:id", |req: Request| async move { param(&req, "id") }, []);

        let (status, _, body) = get(&router, "/users/123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "123");
    }

    pub async fn dotted_param(router: Router) {
        router.get(
            "/file/:name.json",
            |req: Request| async move {
                format!("{}|{}", param(&req, "name"), param(&req, "name.json"))
            },
            [],
        );

        let (status, _, body) = get(&router, "/file/config.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "config.json|config.json");
    }

    pub async fn percent_encoded_param(router: Router) {
        router.get("/q/:term", |req: Request| async move { param(&req, "term") }, []);

        let (_, _, body) = get(&router, "/q/hello%20world").await;
        assert_eq!(body, "hello world");
    }

    pub async fn state_and_extensions_propagate(router: Router) {
        let set_user = Middleware::from_fn(|mut req: Request, next: Next| async move {
            set_state_value(&mut req, "user", "alice");
            next.run(req).await
        });
        router.get(
            "/orders/:id",
            |req: Request| async move {
                let tag = req.extensions().get::<Tag>().map(|t| t.0).unwrap_or("none");
                format!("{}|{}|{}", param(&req, "id"), param(&req, "user"), tag)
            },
            [set_user],
        );

        let mut req = http::Request::get("/orders/42").body(Body::empty()).unwrap();
        req.extensions_mut().insert(Tag("outer"));
        let (_, _, body) = send(&router, req).await;
        assert_eq!(body, "42|alice|outer");
    }

    pub async fn short_circuit(router: Router) {
        let reached = Arc::new(AtomicBool::new(false));
        let deny = Middleware::from_fn(|_req: Request, _next: Next| async {
            (StatusCode::UNAUTHORIZED, [("www-authenticate", "Bearer")], "denied")
        });
        let flag = Arc::clone(&reached);
        router.get(
            "/secret",
            move |_req: Request| {
                let flag = Arc::clone(&flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    "secret"
                }
            },
            [deny],
        );

        let (status, headers, body) = get(&router, "/secret").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers["www-authenticate"], "Bearer");
        assert_eq!(body, "denied");
        assert!(!reached.load(Ordering::SeqCst));
    }

    pub async fn multiple_params(router: Router) {
        router.get(
            "/repos/:org/:repo/blob/:file",
            |req: Request| async move {
                format!(
                    "{}|{}|{}",
                    param(&req, "org"),
                    param(&req, "repo"),
                    param(&req, "file")
                )
            },
            [],
        );

        let (_, _, body) = get(&router, "/repos/my.org/my-repo/blob/main.go").await;
        assert_eq!(body, "my.org|my-repo|main.go");
    }

    pub async fn group_isolation(mut router: Router) {
        router.layer(tag_header("x-root"));
        let mut admin = router.group("/admin");
        admin.layer(Middleware::from_fn(|req: Request, next: Next| async move {
            if req.headers().contains_key("x-admin") {
                next.run(req).await
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }));
        router.get("/public", |_req: Request| async { "public" }, []);
        admin.get("/stats", |_req: Request| async { "stats" }, []);

        let (status, headers, body) = get(&router, "/public").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "public");
        assert!(headers.contains_key("x-root"));

        let (status, headers, _) = get(&router, "/admin/stats").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(headers.contains_key("x-root"));

        let req = http::Request::get("/admin/stats")
            .header("x-admin", "yes")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "stats");
    }

    pub async fn layer_applies_only_to_later_routes(mut router: Router) {
        router.get("/before", |_req: Request| async { "before" }, []);
        let early_group = router.group("/early");
        router.layer(tag_header("x-late"));
        router.get("/after", |_req: Request| async { "after" }, []);
        early_group.get("/inside", |_req: Request| async { "inside" }, []);

        let (_, headers, _) = get(&router, "/before").await;
        assert!(!headers.contains_key("x-late"));
        let (_, headers, _) = get(&router, "/after").await;
        assert!(headers.contains_key("x-late"));
        let (_, headers, _) = get(&router, "/early/inside").await;
        assert!(!headers.contains_key("x-late"));
    }

    pub async fn body_echo(router: Router) {
        router.post(
            "/echo",
            |req: Request| async move {
                let cached = request_state(&req)
                    .and_then(|state| state.body().cloned())
                    .unwrap_or_default();
                let read = axum::body::to_bytes(req.into_body(), usize::MAX)
                    .await
                    .unwrap();
                assert_eq!(cached, read);
                read
            },
            [],
        );

        let (status, _, body) = post(&router, "/echo", r#"{"message":"hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"message":"hello"}"#);
    }

    pub async fn body_readable_after_middleware(router: Router) {
        let drain = Middleware::from_fn(|req: Request, next: Next| async move {
            let (parts, body) = req.into_parts();
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            let mut req = Request::from_parts(parts, Body::empty());
            set_state_value(&mut req, "seen", String::from_utf8_lossy(&bytes));
            next.run(req).await
        });
        router.put(
            "/submit",
            |req: Request| async move {
                let seen = param(&req, "seen");
                let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
                    .await
                    .unwrap();
                format!("{}|{}", seen, String::from_utf8_lossy(&bytes))
            },
            [drain],
        );

        let req = http::Request::put("/submit").body(Body::from("hello")).unwrap();
        let (_, _, body) = send(&router, req).await;
        assert_eq!(body, "hello|hello");
    }

    pub async fn group_path_normalization(router: Router) {
        let api = router.group("/api/");
        api.get("/health", |_req: Request| async { "healthy" }, []);

        let (status, _, body) = get(&router, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "healthy");
    }

    pub async fn handle_service_and_function(router: Router) {
        let service = tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>(([("x-handle", "service")], "from service"))
        });
        router.handle(Method::GET, "/service", service, []);
        router.handle_fn(
            Method::POST,
            "/function",
            |_req: Request| async { ([("x-handle", "function")], "from function") },
            [],
        );

        let (_, headers, body) = get(&router, "/service").await;
        assert_eq!(headers["x-handle"], "service");
        assert_eq!(body, "from service");

        let (_, headers, body) = post(&router, "/function", "").await;
        assert_eq!(headers["x-handle"], "function");
        assert_eq!(body, "from function");
    }

    pub async fn custom_method(router: Router) {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        router.handle(
            purge.clone(),
            "/cache/:key",
            tower::service_fn(|req: Request| async move {
                Ok::<_, Infallible>(format!("purged {}", param(&req, "key")))
            }),
            [],
        );

        let req = http::Request::builder()
            .method(purge)
            .uri("/cache/home")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "purged home");
    }

    pub async fn any_method(router: Router) {
        router.any("/anything", |req: Request| async move { req.method().to_string() }, []);

        for method in [Method::GET, Method::POST, Method::PATCH, Method::DELETE] {
            let req = http::Request::builder()
                .method(method.clone())
                .uri("/anything")
                .body(Body::empty())
                .unwrap();
            let (status, _, body) = send(&router, req).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, method.as_str());
        }
    }

    pub async fn static_beats_param(router: Router) {
        router.get("/post/:id", |req: Request| async move { format!("dynamic:{}", param(&req, "id")) }, []);
        router.get("/post/featured", |_req: Request| async { "static_featured" }, []);

        let (_, _, body) = get(&router, "/post/featured").await;
        assert_eq!(body, "static_featured");
        let (_, _, body) = get(&router, "/post/123").await;
        assert_eq!(body, "dynamic:123");
    }

    pub async fn onion_order(mut router: Router) {
        let trace = Arc::new(Mutex::new(String::new()));
        let layer = |n: u8| {
            let trace = Arc::clone(&trace);
            Middleware::from_fn(move |req: Request, next: Next| {
                let trace = Arc::clone(&trace);
                async move {
                    trace.lock().unwrap().push_str(&format!("({n}"));
                    let res = next.run(req).await;
                    trace.lock().unwrap().push_str(&format!("{n})"));
                    res
                }
            })
        };

        router.layer(layer(1));
        router.layer(layer(2));
        let mut group = router.group("/onion");
        group.layer(layer(3));
        let handler_trace = Arc::clone(&trace);
        group.get(
            "/:id",
            move |_req: Request| {
                let trace = Arc::clone(&handler_trace);
                async move {
                    trace.lock().unwrap().push('X');
                    "done"
                }
            },
            [layer(4), layer(5)],
        );

        let (status, _, _) = get(&router, "/onion/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(*trace.lock().unwrap(), "(1(2(3(4(5X5)4)3)2)1)");
    }

    pub async fn nested_group_onion(mut router: Router) {
        let trace = Arc::new(Mutex::new(String::new()));
        let layer = |n: u8| {
            let trace = Arc::clone(&trace);
            Middleware::from_fn(move |req: Request, next: Next| {
                let trace = Arc::clone(&trace);
                async move {
                    trace.lock().unwrap().push_str(&format!("({n}"));
                    let res = next.run(req).await;
                    trace.lock().unwrap().push_str(&format!("{n})"));
                    res
                }
            })
        };

        router.layer(layer(1));
        let mut first = router.group("/one");
        first.layer(layer(2));
        let mut second = first.group("/two");
        second.layer(layer(3));
        let mut third = second.group("/three");
        third.layer(layer(4));
        let handler_trace = Arc::clone(&trace);
        third.get(
            "/:id",
            move |req: Request| {
                let trace = Arc::clone(&handler_trace);
                async move {
                    trace.lock().unwrap().push('X');
                    param(&req, "id")
                }
            },
            [layer(5)],
        );
        first.get("/plain", |_req: Request| async { "plain" }, []);

        let (status, _, body) = get(&router, "/one/two/three/9").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "9");
        assert_eq!(*trace.lock().unwrap(), "(1(2(3(4(5X5)4)3)2)1)");

        // Outer groups never see the inner layers.
        trace.lock().unwrap().clear();
        let (_, _, body) = get(&router, "/one/plain").await;
        assert_eq!(body, "plain");
        assert_eq!(*trace.lock().unwrap(), "(1(22)1)");
    }

    pub async fn sibling_serves_conflicting_prefix(router: Router) {
        router.get("/a/:b", |req: Request| async move { format!("sibling:{}", param(&req, "b")) }, []);
        router.get("/a/x/:id", |req: Request| async move { format!("id:{}", param(&req, "id")) }, []);
        router.get("/a/x/*", |req: Request| async move { format!("wild:{}", param(&req, "*")) }, []);

        let (status, _, body) = get(&router, "/a/x").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "sibling:x");
        let (_, _, body) = get(&router, "/a/y").await;
        assert_eq!(body, "sibling:y");
        let (_, _, body) = get(&router, "/a/x/1").await;
        assert_eq!(body, "id:1");
        let (_, _, body) = get(&router, "/a/x/1/2").await;
        assert_eq!(body, "wild:1/2");
    }

    pub async fn head_falls_back_to_get(router: Router) {
        router.get("/native/:id", |req: Request| async move { param(&req, "id") }, []);
        router.get("/a/:b", |req: Request| async move { param(&req, "b") }, []);
        router.get("/a/*", |req: Request| async move { param(&req, "*") }, []);

        for uri in ["/native/1", "/a/1", "/a/1/2"] {
            let req = http::Request::head(uri).body(Body::empty()).unwrap();
            let (status, _, _) = send(&router, req).await;
            assert_eq!(status, StatusCode::OK, "HEAD {uri}");
        }
    }

    pub async fn query_does_not_collide(router: Router) {
        router.get(
            "/search/:category",
            |req: Request| async move {
                let q = req
                    .uri()
                    .query()
                    .and_then(|query| query.strip_prefix("q="))
                    .unwrap_or_default()
                    .to_owned();
                format!("{}|{}|{}", param(&req, "category"), q, param(&req, "q"))
            },
            [],
        );

        let (_, _, body) = get(&router, "/search/books?q=golang").await;
        assert_eq!(body, "books|golang|");
    }

    pub async fn wildcard_aliases(router: Router) {
        router.get(
            "/static/*filepath",
            |req: Request| async move {
                format!(
                    "{}|{}|{}",
                    param(&req, "filepath"),
                    param(&req, "*"),
                    param(&req, "path")
                )
            },
            [],
        );

        let (_, _, body) = get(&router, "/static/images/logo/brand.png").await;
        assert_eq!(
            body,
            "images/logo/brand.png|images/logo/brand.png|images/logo/brand.png"
        );
    }

    pub async fn headers_and_status_sync(router: Router) {
        let stamp = Middleware::from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().insert("x-middleware", "seen".parse().unwrap());
            res
        });
        router.post(
            "/items",
            |_req: Request| async { (StatusCode::CREATED, [("x-handler", "created")], "ok") },
            [stamp],
        );

        let (status, headers, _) = post(&router, "/items", "{}").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers["x-handler"], "created");
        assert_eq!(headers["x-middleware"], "seen");
    }

    pub async fn concurrent_requests(router: Router) {
        router.get("/users/:id", |req: Request| async move { param(&req, "id") }, []);

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let router = router.clone();
                tokio::spawn(async move {
                    let (_, _, body) = get(&router, &format!("/users/{i}")).await;
                    assert_eq!(body, i.to_string());
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
    }

    pub async fn shadow_ambiguity(router: Router) {
        router.get("/a/b/c", |_req: Request| async { "static" }, []);
        router.get("/a/:b/c", |req: Request| async move { format!("param:{}", param(&req, "b")) }, []);
        router.get("/a/*", |req: Request| async move { format!("wild:{}", param(&req, "*")) }, []);
        router.get("/other/:id", |req: Request| async move { format!("native:{}", param(&req, "id")) }, []);

        let (_, _, body) = get(&router, "/a/b/c").await;
        assert_eq!(body, "static");
        let (_, _, body) = get(&router, "/a/x/c").await;
        assert_eq!(body, "param:x");
        let (_, _, body) = get(&router, "/a/x/y/z").await;
        assert_eq!(body, "wild:x/y/z");
        let (_, _, body) = get(&router, "/a/x").await;
        assert_eq!(body, "wild:x");
        let (_, _, body) = get(&router, "/other/7").await;
        assert_eq!(body, "native:7");

        // Second round is served from the shadow cache.
        let (_, _, body) = get(&router, "/a/x/c").await;
        assert_eq!(body, "param:x");

        let (status, headers, _) = post(&router, "/a/x/c", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(headers["allow"].to_str().unwrap().contains("GET"));
    }

    pub async fn not_found(router: Router) {
        router.get("/exists", |_req: Request| async { "here" }, []);

        let (status, _, _) = get(&router, "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    pub async fn method_not_allowed(router: Router) {
        router.get("/only-get", |_req: Request| async { "got" }, []);

        let (status, headers, _) = post(&router, "/only-get", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers["allow"], "GET");
    }
}

// ============================================================================
// Instantiation
// ============================================================================

macro_rules! contract_suite {
    ($module:ident: $engine:expr; $($case:ident),* $(,)?) => {
        mod $module {
            use super::*;
            $(
                #[tokio::test]
                async fn $case() {
                    cases::$case(Router::new($engine)).await;
                }
            )*
        }
    };
}

macro_rules! every_engine {
    ($($case:ident),* $(,)?) => {
        contract_suite!(axum_engine: AxumEngine::new(); $($case),*);
        contract_suite!(matchit_engine: MatchitEngine::new(); $($case),*);
        #[cfg(feature = "recognizer")]
        contract_suite!(recognizer_engine: RecognizerEngine::new(); $($case),*);
        #[cfg(feature = "path-tree")]
        contract_suite!(path_tree_engine: PathTreeEngine::new(); $($case),*);
        contract_suite!(mux_engine: MuxEngine::new(); $($case),*);
    };
}

every_engine!(
    plain_param,
    dotted_param,
    percent_encoded_param,
    state_and_extensions_propagate,
    short_circuit,
    multiple_params,
    group_isolation,
    layer_applies_only_to_later_routes,
    body_echo,
    body_readable_after_middleware,
    group_path_normalization,
    handle_service_and_function,
    custom_method,
    any_method,
    static_beats_param,
    onion_order,
    nested_group_onion,
    sibling_serves_conflicting_prefix,
    head_falls_back_to_get,
    query_does_not_collide,
    wildcard_aliases,
    headers_and_status_sync,
    concurrent_requests,
    shadow_ambiguity,
    not_found,
    method_not_allowed,
);
