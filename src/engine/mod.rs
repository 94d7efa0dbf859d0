//! Engine bridges.
//!
//! An [`Engine`] turns the finalized route table into a native router. The
//! [`Router`](crate::Router) does everything engine-independent (pattern
//! parsing, conflict detection, middleware composition, body buffering) and
//! hands each engine a list of [`NativeRoute`]s: a pattern already rendered
//! in the engine's syntax plus the [`MethodTable`] to call when it matches.
//! The engine only has to match paths and report the captured parameters
//! under their native names.
//!
//! | Engine | Backing crate | Parameter | Wildcard | Dotted names |
//! |--------|---------------|-----------|----------|--------------|
//! | [`AxumEngine`] | `axum` | `{id}` | `{*rest}` | split |
//! | [`MatchitEngine`] | `matchit` | `{id}` | `{*rest}` | encoded |
//! | [`RecognizerEngine`] | `route-recognizer` | `:id` | `*rest` | split |
//! | [`PathTreeEngine`] | `path-tree` | `:id` | `:rest+` | split |
//! | [`MuxEngine`] | built in | `{id}` | `{rest...}` | configurable |

mod axum;
mod matchit;
mod mux;
#[cfg(feature = "path-tree")]
mod path_tree;
#[cfg(feature = "recognizer")]
mod recognizer;

pub use self::axum::AxumEngine;
pub use self::matchit::MatchitEngine;
pub use self::mux::MuxEngine;
#[cfg(feature = "path-tree")]
pub use self::path_tree::PathTreeEngine;
#[cfg(feature = "recognizer")]
pub use self::recognizer::RecognizerEngine;

use {
    crate::{
        DotPolicy, Result,
        routing::{
            ParamBinding, ResponseFuture,
            onion::Chain,
            shadow::{Resolution, ShadowRouter},
        },
        state::request_state,
        utils::decode_segment,
    },
    ::axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    http::{HeaderValue, Method, Request, StatusCode, header},
    std::{any::Any, sync::Arc},
};

/// A native routing engine.
pub trait Engine: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// How this engine receives dotted parameter names.
    fn dot_policy(&self) -> DotPolicy;

    /// Renders a parameter token, e.g. `{id}` or `:id`.
    fn render_param(&self, name: &str) -> String;

    /// Renders a catch-all token, e.g. `{*rest}` or `*rest`.
    fn render_wildcard(&self, name: &str) -> String;

    /// Builds the native router. Called once, when the route table is
    /// finalized.
    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>>;

    fn as_any(&self) -> &dyn Any;
}

/// A built native router.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture;
}

/// One native pattern and the handlers registered for it.
pub struct NativeRoute {
    /// The pattern in the engine's syntax.
    pub pattern: String,
    /// Whether the pattern contains parameters or a catch-all.
    pub captures: bool,
    pub methods: Arc<MethodTable>,
}

/// Per-pattern method dispatch shared by every engine.
#[derive(Default)]
pub struct MethodTable {
    routes: Vec<(Method, Endpoint)>,
    any: Option<Endpoint>,
}

impl MethodTable {
    /// Serves `req` with the endpoint registered for its method.
    ///
    /// `captured` holds the engine's captures keyed by native name, already
    /// percent-decoded. A method with no endpoint yields 405 with an `Allow`
    /// header; `HEAD` falls back to `GET`.
    pub fn serve(&self, req: Request<Body>, captured: Vec<(String, String)>) -> ResponseFuture {
        let endpoint = self
            .find(req.method())
            .or_else(|| (req.method() == Method::HEAD).then(|| self.find(&Method::GET)).flatten())
            .or(self.any.as_ref());

        match endpoint {
            Some(endpoint) => endpoint.serve(req, captured),
            None => {
                let allowed = self.allowed_methods();
                Box::pin(async move { method_not_allowed(&allowed) })
            }
        }
    }

    /// Methods with a registered endpoint, in registration order.
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.routes.iter().map(|(method, _)| method.clone()).collect()
    }

    fn find(&self, method: &Method) -> Option<&Endpoint> {
        self.routes
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, endpoint)| endpoint)
    }

    /// Registers `endpoint` for `method`. Returns `false` if the method is
    /// already taken.
    pub(crate) fn insert(&mut self, method: Method, endpoint: Endpoint) -> bool {
        if self.find(&method).is_some() {
            return false;
        }
        self.routes.push((method, endpoint));
        true
    }

    pub(crate) fn set_any(&mut self, endpoint: Endpoint) {
        self.any = Some(endpoint);
    }
}

/// What a matched native pattern runs.
#[derive(Clone)]
pub(crate) enum Endpoint {
    Route {
        chain: Arc<Chain>,
        bindings: Arc<[ParamBinding]>,
    },
    Shadow {
        router: Arc<ShadowRouter>,
        zone: usize,
    },
}

impl Endpoint {
    fn serve(&self, mut req: Request<Body>, captured: Vec<(String, String)>) -> ResponseFuture {
        match self {
            Endpoint::Route { chain, bindings } => {
                hydrate(&mut req, captured, bindings);
                chain.run(req)
            }
            Endpoint::Shadow { router, zone } => {
                let resolution = router.resolve(*zone, req.method(), req.uri().path());
                match resolution {
                    Resolution::Matched { route, params } => {
                        let params = params
                            .into_iter()
                            .map(|(name, value)| (name, decode_segment(&value)))
                            .collect();
                        hydrate(&mut req, params, &route.bindings);
                        route.chain.run(req)
                    }
                    Resolution::MethodNotAllowed(allowed) => {
                        Box::pin(async move { method_not_allowed(&allowed) })
                    }
                    Resolution::NotFound => Box::pin(async { not_found() }),
                }
            }
        }
    }
}

/// Merges native captures into the request state, translating native names
/// back to logical keys.
pub(crate) fn hydrate(
    req: &mut Request<Body>,
    captured: Vec<(String, String)>,
    bindings: &[ParamBinding],
) {
    let mut primary = Vec::with_capacity(captured.len());
    let mut aliases = Vec::new();
    for (native, value) in captured {
        match bindings.iter().find(|binding| binding.native == native) {
            Some(binding) => {
                let mut keys = binding.keys.iter();
                if let Some(key) = keys.next() {
                    primary.push((key.clone(), value.clone()));
                }
                aliases.extend(keys.map(|key| (key.clone(), value.clone())));
            }
            None => primary.push((native, value)),
        }
    }
    aliases.retain(|(key, _)| !primary.iter().any(|(k, _)| k == key));

    let state = request_state(req)
        .cloned()
        .unwrap_or_default()
        .with_params(aliases.into_iter().chain(primary));
    req.extensions_mut().insert(state);
}

/// The response for a path no route matches.
pub fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// The response for a path matched only under other methods.
pub fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}
