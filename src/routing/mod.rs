//! The engine-agnostic router.
//!
//! A [`Router`] records routes and middleware in one syntax and serves them
//! through whichever [`Engine`] it was created with. Nothing is handed to the
//! engine until the route table is finalized, either explicitly through
//! [`Router::finalize`] or on the first request. At that point conflicting
//! prefixes are moved to the shadow router, the remaining patterns are
//! translated into the engine's syntax and the native router is built once.
//!
//! ```rust
//! use switchyard::{MatchitEngine, Middleware, Next, Request, Router, param};
//!
//! let mut router = Router::new(MatchitEngine::new());
//! router.layer(Middleware::from_fn(|req: Request, next: Next| async move {
//!     next.run(req).await
//! }));
//!
//! router.get("/users/:id", |req: Request| async move {
//!     format!("user {}", param(&req, "id"))
//! }, []);
//!
//! let api = router.group("/api");
//! api.get("/health", |_req: Request| async { "ok" }, []);
//!
//! router.finalize().unwrap();
//! ```

pub(crate) mod onion;
mod pattern;
pub(crate) mod shadow;
mod table;

#[cfg(test)]
mod tests;

pub use {
    onion::{Handler, Middleware, Next, ResponseFuture},
    pattern::{DOT_PLACEHOLDER, DotPolicy, ParamBinding, Pattern, Segment, Translation},
};

use {
    self::{
        onion::{Chain, ServiceHandler},
        shadow::ShadowRouter,
        table::{RouteEntry, RouteTable},
    },
    crate::{
        Error, Result,
        config::RoutingConfig,
        engine::{Dispatch, Endpoint, Engine, MethodTable, NativeRoute},
        state::{self, capture_body},
        utils::join_paths,
    },
    axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    futures_util::{FutureExt, future::BoxFuture},
    http::{Method, Request},
    std::{
        convert::Infallible,
        fmt,
        sync::{
            Arc, OnceLock,
            atomic::{AtomicUsize, Ordering},
        },
        task::{Context, Poll},
    },
    tower::Service,
};

/// Methods registered by [`Router::any`].
const ANY_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Capture name of the catch-all mounted for each shadow zone.
const SHADOW_CAPTURE: &str = "__shadow";

type Compiled = std::result::Result<Box<dyn Dispatch>, Error>;

struct Core {
    engine: Box<dyn Engine>,
    table: RouteTable,
    max_shadow_cache_size: AtomicUsize,
    max_body_bytes: u64,
    compiled: OnceLock<Compiled>,
}

impl Core {
    fn compiled(&self) -> &Compiled {
        self.compiled.get_or_init(|| {
            let compiled = self.compile();
            if let Err(err) = &compiled {
                tracing::error!(
                    engine = self.engine.name(),
                    error = %err,
                    "Route table failed to finalize"
                );
            }
            compiled
        })
    }

    fn compile(&self) -> Compiled {
        let engine = self.engine.as_ref();
        let entries = self.table.seal();
        let total = entries.len();

        let (native, zones) = shadow::partition(entries)?;
        let prefixes: Vec<String> = zones.iter().map(|zone| zone.prefix.clone()).collect();
        let shadowed: usize = zones.iter().map(|zone| zone.routes.len()).sum();
        let shadow = Arc::new(ShadowRouter::new(
            zones,
            self.max_shadow_cache_size.load(Ordering::Acquire),
        ));

        let mut patterns: Vec<(String, bool, MethodTable)> = Vec::new();
        for entry in native {
            let translation = entry.pattern.translate(engine);
            let index = match patterns.iter().position(|(p, ..)| *p == translation.native) {
                Some(index) => index,
                None => {
                    patterns.push((
                        translation.native.clone(),
                        translation.captures(),
                        MethodTable::default(),
                    ));
                    patterns.len() - 1
                }
            };
            let endpoint = Endpoint::Route {
                chain: entry.chain,
                bindings: translation.bindings.into(),
            };
            if !patterns[index].2.insert(entry.method.clone(), endpoint) {
                return Err(Error::registration(format!(
                    "{} {} is registered more than once",
                    entry.method,
                    entry.pattern.as_str()
                )));
            }
        }

        let catch_all = engine.render_wildcard(SHADOW_CAPTURE);
        for (zone, prefix) in prefixes.iter().enumerate() {
            let mounts = if prefix == "/" {
                vec!["/".to_owned(), format!("/{catch_all}")]
            } else {
                vec![prefix.clone(), format!("{prefix}/"), format!("{prefix}/{catch_all}")]
            };
            for mount in mounts {
                let mut methods = MethodTable::default();
                methods.set_any(Endpoint::Shadow {
                    router: Arc::clone(&shadow),
                    zone,
                });
                patterns.push((mount, false, methods));
            }
        }

        let routes: Vec<NativeRoute> = patterns
            .into_iter()
            .map(|(pattern, captures, methods)| NativeRoute {
                pattern,
                captures,
                methods: Arc::new(methods),
            })
            .collect();
        let native_patterns = routes.len();
        let dispatch = engine.build(routes)?;

        tracing::info!(
            engine = engine.name(),
            routes = total,
            native_patterns,
            shadowed,
            shadow_prefixes = ?prefixes,
            "Route table finalized"
        );
        Ok(dispatch)
    }
}

/// Routes, middleware and the engine that serves them.
///
/// Cloning a router, or deriving a [`group`](Router::group) from it, yields
/// another view of the same route table and engine. Each view carries its own
/// path prefix and its own copy of the middleware stack.
#[derive(Clone)]
pub struct Router {
    core: Arc<Core>,
    prefix: String,
    middleware: Vec<Middleware>,
}

impl Router {
    /// Creates a router served by `engine` with the default [`RoutingConfig`].
    pub fn new<E: Engine>(engine: E) -> Self {
        Self::with_config(engine, &RoutingConfig::default())
    }

    pub fn with_config<E: Engine>(engine: E, config: &RoutingConfig) -> Self {
        Self {
            core: Arc::new(Core {
                engine: Box::new(engine),
                table: RouteTable::default(),
                max_shadow_cache_size: AtomicUsize::new(config.max_shadow_cache_size),
                max_body_bytes: config.max_body_bytes.as_u64(),
                compiled: OnceLock::new(),
            }),
            prefix: String::new(),
            middleware: Vec::new(),
        }
    }

    pub fn get<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[Method::GET], path, Arc::new(handler), middleware)
    }

    pub fn post<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[Method::POST], path, Arc::new(handler), middleware)
    }

    pub fn put<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[Method::PUT], path, Arc::new(handler), middleware)
    }

    pub fn delete<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[Method::DELETE], path, Arc::new(handler), middleware)
    }

    pub fn options<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[Method::OPTIONS], path, Arc::new(handler), middleware)
    }

    /// Registers `handler` under every standard method.
    pub fn any<H, M>(&self, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&ANY_METHODS, path, Arc::new(handler), middleware)
    }

    /// Registers a tower [`Service`] for `method`, which may be any extension
    /// method such as `PURGE`.
    pub fn handle<S, M>(&self, method: Method, path: &str, service: S, middleware: M) -> &Self
    where
        S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[method], path, Arc::new(ServiceHandler(service)), middleware)
    }

    /// Registers a handler function for `method`.
    pub fn handle_fn<H, M>(&self, method: Method, path: &str, handler: H, middleware: M) -> &Self
    where
        H: Handler,
        M: IntoIterator<Item = Middleware>,
    {
        self.route(&[method], path, Arc::new(handler), middleware)
    }

    /// Appends a middleware to this view's stack.
    ///
    /// Only routes registered afterwards, and groups created afterwards, run
    /// it.
    pub fn layer(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Creates a view whose routes live under `prefix` and start from a copy
    /// of this view's middleware stack.
    pub fn group(&self, prefix: &str) -> Router {
        let joined = join_paths(&self.prefix, prefix);
        Router {
            core: Arc::clone(&self.core),
            prefix: joined.trim_end_matches('/').to_owned(),
            middleware: self.middleware.clone(),
        }
    }

    /// The path prefix of this view, empty for the root router.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Looks up a path parameter of `req`. See [`RequestState::param`](crate::RequestState::param).
    pub fn param<B>(&self, req: &Request<B>, key: &str) -> String {
        state::param(req, key)
    }

    /// The engine, if it is an `E`.
    pub fn engine<E: Engine>(&self) -> Option<&E> {
        self.core.engine.as_any().downcast_ref::<E>()
    }

    pub fn engine_name(&self) -> &'static str {
        self.core.engine.name()
    }

    /// Sets the shadow cache bound. Zero disables the cache.
    ///
    /// Ignored once the route table is finalized.
    pub fn set_max_shadow_cache_size(&self, size: usize) -> &Self {
        if self.core.table.is_sealed() {
            tracing::warn!(size, "Route table already finalized, shadow cache size unchanged");
        } else {
            self.core
                .max_shadow_cache_size
                .store(size, Ordering::Release);
        }
        self
    }

    /// Finalizes the route table and builds the native router now instead of
    /// on the first request.
    ///
    /// Repeated calls report the outcome of the first one.
    pub fn finalize(&self) -> Result<()> {
        match self.core.compiled() {
            Ok(_) => Ok(()),
            Err(err) => Err(Error::new(err.kind(), err.to_string())),
        }
    }

    /// Serves one request.
    pub fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        let core = Arc::clone(&self.core);
        Box::pin(async move {
            let dispatch = match core.compiled() {
                Ok(dispatch) => dispatch,
                Err(err) => return err.to_response(),
            };
            match capture_body(req, core.max_body_bytes).await {
                Ok(req) => dispatch.dispatch(req).await,
                Err(err) => err.into_response(),
            }
        })
    }

    fn route<M>(&self, methods: &[Method], path: &str, handler: Arc<dyn Handler>, local: M) -> &Self
    where
        M: IntoIterator<Item = Middleware>,
    {
        let full = join_paths(&self.prefix, path);
        let middleware = self.middleware.iter().cloned().chain(local).collect();
        let chain = Chain::new(middleware, handler);
        let pattern = Pattern::parse(&full);

        for method in methods {
            let accepted = self.core.table.push(RouteEntry {
                method: method.clone(),
                pattern: pattern.clone(),
                chain: Arc::clone(&chain),
            });
            if accepted {
                tracing::debug!(method = %method, pattern = %pattern.as_str(), "Route registered");
            } else {
                tracing::warn!(
                    method = %method,
                    pattern = %pattern.as_str(),
                    "Route table already finalized, route ignored"
                );
            }
        }
        self
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("engine", &self.core.engine.name())
            .field("prefix", &self.prefix)
            .field("middleware", &self.middleware.len())
            .field("finalized", &self.core.table.is_sealed())
            .finish()
    }
}

impl Service<Request<Body>> for Router {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        Box::pin(self.dispatch(req).map(Ok))
    }
}
