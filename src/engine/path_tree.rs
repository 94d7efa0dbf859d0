use {
    super::{Dispatch, Engine, MethodTable, NativeRoute, not_found},
    crate::{DotPolicy, Result, routing::ResponseFuture, utils::decode_segment},
    axum::body::Body,
    http::Request,
    path_tree::PathTree,
    std::{any::Any, sync::Arc},
};

/// Engine backed by [`path_tree::PathTree`], a radix tree.
///
/// Parameters are `:name` and catch-alls are one-or-more `:name+`. A `.`
/// ends a parameter name in this syntax, so dotted names are split.
#[derive(Debug, Default)]
pub struct PathTreeEngine;

impl PathTreeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for PathTreeEngine {
    fn name(&self) -> &'static str {
        "path-tree"
    }

    fn dot_policy(&self) -> DotPolicy {
        DotPolicy::Split
    }

    fn render_param(&self, name: &str) -> String {
        format!(":{name}")
    }

    fn render_wildcard(&self, name: &str) -> String {
        format!(":{name}+")
    }

    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>> {
        let mut tree = PathTree::new();
        for route in routes {
            let _ = tree.insert(&route.pattern, route.methods);
        }
        Ok(Box::new(PathTreeDispatch { tree }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PathTreeDispatch {
    tree: PathTree<Arc<MethodTable>>,
}

impl Dispatch for PathTreeDispatch {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        let (methods, params) = {
            let Some((methods, path)) = self.tree.find(req.uri().path()) else {
                return Box::pin(async { not_found() });
            };
            let params = path
                .params()
                .into_iter()
                .map(|(name, value)| (name.to_owned(), decode_segment(value)))
                .collect();
            (Arc::clone(methods), params)
        };
        methods.serve(req, params)
    }
}
