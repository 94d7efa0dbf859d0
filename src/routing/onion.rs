//! Handlers, middleware and the onion chain that runs them.
//!
//! A route's chain is its middleware stack (global, then group, then
//! route-local) wrapped around the terminal handler. Each middleware receives
//! the request and a [`Next`]; awaiting `next.run(req)` descends one layer,
//! returning without calling it short-circuits everything inside.

use {
    crate::state,
    axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    futures_util::future::BoxFuture,
    http::Request,
    std::{convert::Infallible, fmt, future::Future, sync::Arc},
    tower::{Service, ServiceExt},
};

/// Future returned by handlers and middleware once boxed.
pub type ResponseFuture = BoxFuture<'static, Response>;

/// A terminal request handler.
///
/// Implemented for every `Fn(Request<Body>) -> impl Future<Output = impl IntoResponse>`,
/// so plain async functions and closures work directly:
///
/// ```rust
/// use switchyard::{Request, param};
///
/// async fn show_user(req: Request) -> String {
///     format!("user {}", param(&req, "id"))
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Body>) -> ResponseFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request<Body>) -> ResponseFuture {
        let fut = (self)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Adapts a tower [`Service`] into a [`Handler`]. Each request is served by a
/// fresh clone of the service.
#[derive(Clone)]
pub(crate) struct ServiceHandler<S>(pub(crate) S);

impl<S> Handler for ServiceHandler<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    fn call(&self, req: Request<Body>) -> ResponseFuture {
        let service = self.0.clone();
        Box::pin(async move {
            match service.oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        })
    }
}

type MiddlewareFn = dyn Fn(Request<Body>, Next) -> ResponseFuture + Send + Sync;

/// One layer of the onion.
///
/// ```rust
/// use switchyard::{Middleware, Next, Request};
///
/// let tag = Middleware::from_fn(|req: Request, next: Next| async move {
///     let mut res = next.run(req).await;
///     res.headers_mut().insert("x-tagged", "yes".parse().unwrap());
///     res
/// });
/// ```
#[derive(Clone)]
pub struct Middleware(Arc<MiddlewareFn>);

impl Middleware {
    /// Builds a middleware from an async function of the request and the
    /// rest of the chain.
    pub fn from_fn<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |req, next| {
            let fut = f(req, next);
            Box::pin(async move { fut.await.into_response() })
        }))
    }

    fn call(&self, req: Request<Body>, next: Next) -> ResponseFuture {
        (self.0)(req, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").finish_non_exhaustive()
    }
}

/// A composed middleware stack around its terminal handler.
pub(crate) struct Chain {
    middleware: Vec<Middleware>,
    handler: Arc<dyn Handler>,
}

impl Chain {
    pub(crate) fn new(middleware: Vec<Middleware>, handler: Arc<dyn Handler>) -> Arc<Self> {
        Arc::new(Self {
            middleware,
            handler,
        })
    }

    /// Runs the whole chain from its outermost layer.
    pub(crate) fn run(self: &Arc<Self>, req: Request<Body>) -> ResponseFuture {
        let next = Next {
            chain: Arc::clone(self),
            position: 0,
        };
        Box::pin(next.run(req))
    }
}

/// The remainder of a chain, handed to each middleware.
#[derive(Clone)]
pub struct Next {
    chain: Arc<Chain>,
    position: usize,
}

impl Next {
    /// Runs the next layer, or the handler once every layer has run.
    ///
    /// The buffered body is re-injected first, so a layer that drained the
    /// body does not starve the layers inside it.
    pub async fn run(self, mut req: Request<Body>) -> Response {
        state::reinject_body(&mut req);
        match self.chain.middleware.get(self.position) {
            Some(middleware) => {
                let next = Next {
                    chain: Arc::clone(&self.chain),
                    position: self.position + 1,
                };
                middleware.call(req, next).await
            }
            None => self.chain.handler.call(req).await,
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("layers", &self.chain.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Mutex;

    fn recorder(trace: &Arc<Mutex<String>>, tag: &'static str) -> Middleware {
        let trace = Arc::clone(trace);
        Middleware::from_fn(move |req: Request<Body>, next: Next| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push_str(&format!("({tag}"));
                let res = next.run(req).await;
                trace.lock().unwrap().push_str(&format!("{tag})"));
                res
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_as_onion() {
        let trace = Arc::new(Mutex::new(String::new()));
        let handler_trace = Arc::clone(&trace);
        let handler = move |_req: Request<Body>| {
            let trace = Arc::clone(&handler_trace);
            async move {
                trace.lock().unwrap().push('X');
                "done"
            }
        };

        let chain = Chain::new(
            vec![recorder(&trace, "1"), recorder(&trace, "2"), recorder(&trace, "3")],
            Arc::new(handler),
        );
        let res = chain.run(Request::new(Body::empty())).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*trace.lock().unwrap(), "(1(2(3X3)2)1)");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_layers() {
        let trace = Arc::new(Mutex::new(String::new()));
        let guard = Middleware::from_fn(|_req: Request<Body>, _next: Next| async {
            (StatusCode::UNAUTHORIZED, "denied")
        });
        let handler_trace = Arc::clone(&trace);
        let handler = move |_req: Request<Body>| {
            let trace = Arc::clone(&handler_trace);
            async move {
                trace.lock().unwrap().push('X');
                "reached"
            }
        };

        let chain = Chain::new(
            vec![recorder(&trace, "1"), guard, recorder(&trace, "3")],
            Arc::new(handler),
        );
        let res = chain.run(Request::new(Body::empty())).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(*trace.lock().unwrap(), "(11)");
    }

    #[tokio::test]
    async fn test_service_handler() {
        let service = tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>((StatusCode::CREATED, "from service"))
        });
        let handler = ServiceHandler(service);
        let res = handler.call(Request::new(Body::empty())).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
}
