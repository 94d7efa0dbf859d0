use {
    super::{Dispatch, Engine, NativeRoute},
    crate::{DotPolicy, Result, routing::ResponseFuture},
    axum::{
        body::Body,
        extract::{Path, Request},
        routing::any,
    },
    std::{
        any::Any,
        sync::{Mutex, PoisonError},
    },
    tower::ServiceExt,
};

/// Engine backed by [`axum::Router`].
///
/// Dotted parameter names are split: `:name.json` is registered as `{name}`
/// and the value is stored under both `name.json` and `name`.
///
/// The native router can be prepared before routes are added, for example to
/// attach axum-level layers that should run outside every switchyard chain:
///
/// ```rust
/// use switchyard::{AxumEngine, Router};
///
/// let router = Router::new(AxumEngine::new());
/// if let Some(engine) = router.engine::<AxumEngine>() {
///     engine.configure(|native| native.fallback(|| async { "nothing here" }));
/// }
/// ```
#[derive(Default)]
pub struct AxumEngine {
    base: Mutex<Option<axum::Router>>,
}

impl AxumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to the native router the routes will be added to.
    ///
    /// Only effective before the route table is finalized.
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(axum::Router) -> axum::Router,
    {
        let mut base = self.base.lock().unwrap_or_else(PoisonError::into_inner);
        let router = base.take().unwrap_or_default();
        *base = Some(f(router));
    }
}

impl Engine for AxumEngine {
    fn name(&self) -> &'static str {
        "axum"
    }

    fn dot_policy(&self) -> DotPolicy {
        DotPolicy::Split
    }

    fn render_param(&self, name: &str) -> String {
        format!("{{{name}}}")
    }

    fn render_wildcard(&self, name: &str) -> String {
        format!("{{*{name}}}")
    }

    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>> {
        // axum panics on conflicting paths; surface those as errors first.
        let mut check = matchit::Router::new();
        for route in &routes {
            check.insert(route.pattern.as_str(), ())?;
        }

        let mut router = self
            .base
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();

        for route in routes {
            let methods = route.methods;
            router = if route.captures {
                router.route(
                    &route.pattern,
                    any(
                        move |Path(params): Path<Vec<(String, String)>>, req: Request| {
                            methods.serve(req, params)
                        },
                    ),
                )
            } else {
                router.route(
                    &route.pattern,
                    any(move |req: Request| methods.serve(req, Vec::new())),
                )
            };
        }

        Ok(Box::new(AxumDispatch { router }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct AxumDispatch {
    router: axum::Router,
}

impl Dispatch for AxumDispatch {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        let router = self.router.clone();
        Box::pin(async move {
            match router.oneshot(req).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
    }
}
