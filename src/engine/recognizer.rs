use {
    super::{Dispatch, Engine, MethodTable, NativeRoute, not_found},
    crate::{DotPolicy, Result, routing::ResponseFuture, utils::decode_segment},
    axum::body::Body,
    http::Request,
    std::{any::Any, sync::Arc},
};

/// Engine backed by [`route_recognizer::Router`].
///
/// Uses the classic `:name` / `*name` syntax. The recognizer treats `.` as a
/// separator inside patterns, so a dotted name is registered under its base
/// name only and the value is stored under both names. It ranks static over
/// dynamic over wildcard segments itself, so it never rejects a pattern.
#[derive(Debug, Default)]
pub struct RecognizerEngine;

impl RecognizerEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for RecognizerEngine {
    fn name(&self) -> &'static str {
        "route-recognizer"
    }

    fn dot_policy(&self) -> DotPolicy {
        DotPolicy::Split
    }

    fn render_param(&self, name: &str) -> String {
        format!(":{name}")
    }

    fn render_wildcard(&self, name: &str) -> String {
        format!("*{name}")
    }

    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>> {
        let mut router = route_recognizer::Router::new();
        for route in routes {
            router.add(&route.pattern, route.methods);
        }
        Ok(Box::new(RecognizerDispatch { router }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct RecognizerDispatch {
    router: route_recognizer::Router<Arc<MethodTable>>,
}

impl Dispatch for RecognizerDispatch {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        let (methods, params) = match self.router.recognize(req.uri().path()) {
            Ok(matched) => {
                let params = matched
                    .params()
                    .iter()
                    .map(|(name, value)| (name.to_owned(), decode_segment(value)))
                    .collect::<Vec<_>>();
                (Arc::clone(*matched.handler()), params)
            }
            Err(_) => return Box::pin(async { not_found() }),
        };
        methods.serve(req, params)
    }
}
