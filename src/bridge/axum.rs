use {
    crate::{
        Error, RequestState,
        routing::{Middleware, Next},
        state::request_state,
    },
    axum::{
        body::Body,
        response::{IntoResponse, Response},
        routing::Route,
    },
    http::Request,
    std::convert::Infallible,
    tower::{Layer, Service, ServiceExt},
};

/// Carries the rest of the chain through the private axum router.
#[derive(Clone)]
struct Resume {
    next: Next,
    entry: RequestState,
}

/// Wraps anything [`axum::Router::layer`] accepts as a [`Middleware`].
///
/// The layer is applied once to a private router whose fallback resumes the
/// chain; each request runs through a fresh clone of that router.
///
/// ```rust
/// use axum::middleware::{self, Next};
/// use switchyard::{Request, bridge};
///
/// let tagged = bridge::axum::from_router_layer(middleware::from_fn(
///     |req: Request, next: Next| async move {
///         let mut res = next.run(req).await;
///         res.headers_mut().insert("x-native", "axum".parse().unwrap());
///         res
///     },
/// ));
/// ```
pub fn from_router_layer<L>(layer: L) -> Middleware
where
    L: Layer<Route> + Clone + Send + Sync + 'static,
    L::Service: Service<Request<Body>> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request<Body>>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request<Body>>>::Error: Into<Infallible> + 'static,
    <L::Service as Service<Request<Body>>>::Future: Send + 'static,
{
    let router = axum::Router::new().fallback(resume).layer(layer);
    Middleware::from_fn(move |mut req: Request<Body>, next: Next| {
        let entry = request_state(&req).cloned().unwrap_or_default();
        req.extensions_mut().insert(Resume { next, entry });
        let router = router.clone();
        async move {
            match router.oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        }
    })
}

async fn resume(mut req: Request<Body>) -> Response {
    let Some(Resume { next, entry }) = req.extensions_mut().remove::<Resume>() else {
        return Error::internal("axum bridge reached its fallback without a continuation")
            .into_response();
    };
    let state = match request_state(&req) {
        Some(local) => entry.merged(local),
        None => entry,
    };
    req.extensions_mut().insert(state);
    next.run(req).await
}
