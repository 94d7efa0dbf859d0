use {
    super::{Dispatch, Engine, MethodTable, NativeRoute, not_found},
    crate::{DotPolicy, Result, routing::ResponseFuture, utils::decode_segment},
    axum::body::Body,
    http::Request,
    std::{any::Any, sync::Arc},
};

/// Engine backed by a bare [`matchit::Router`].
///
/// Dots in parameter names are encoded as
/// [`DOT_PLACEHOLDER`](crate::DOT_PLACEHOLDER) on registration and restored
/// when the value is stored.
#[derive(Debug, Default)]
pub struct MatchitEngine;

impl MatchitEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for MatchitEngine {
    fn name(&self) -> &'static str {
        "matchit"
    }

    fn dot_policy(&self) -> DotPolicy {
        DotPolicy::Encode
    }

    fn render_param(&self, name: &str) -> String {
        format!("{{{name}}}")
    }

    fn render_wildcard(&self, name: &str) -> String {
        format!("{{*{name}}}")
    }

    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>> {
        let mut router = matchit::Router::new();
        for route in routes {
            router.insert(route.pattern, route.methods)?;
        }
        Ok(Box::new(MatchitDispatch { router }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct MatchitDispatch {
    router: matchit::Router<Arc<MethodTable>>,
}

impl Dispatch for MatchitDispatch {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        let (methods, params) = match self.router.at(req.uri().path()) {
            Ok(matched) => {
                let params = matched
                    .params
                    .iter()
                    .map(|(name, value)| (name.to_owned(), decode_segment(value)))
                    .collect::<Vec<_>>();
                (Arc::clone(matched.value), params)
            }
            Err(_) => return Box::pin(async { not_found() }),
        };
        methods.serve(req, params)
    }
}
