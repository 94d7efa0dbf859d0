use {
    super::{Dispatch, Engine, MethodTable, NativeRoute, not_found},
    crate::{
        DotPolicy, Error, Result, config::RoutingConfig, routing::ResponseFuture,
        utils::decode_segment,
    },
    axum::body::Body,
    http::Request,
    std::{any::Any, sync::Arc},
};

/// The built-in segment matcher.
///
/// Patterns use `{name}` for a parameter and `{name...}` for the rest of the
/// path. When several patterns match, the one with the most literal segments
/// in the leading positions wins; remaining ties go to the pattern registered
/// first.
#[derive(Debug, Default)]
pub struct MuxEngine {
    dot_policy: DotPolicy,
}

impl MuxEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine using the configured `mux_dot_policy`.
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new().with_dot_policy(config.mux_dot_policy)
    }

    /// Selects how dotted parameter names are registered.
    pub fn with_dot_policy(mut self, policy: DotPolicy) -> Self {
        self.dot_policy = policy;
        self
    }
}

impl Engine for MuxEngine {
    fn name(&self) -> &'static str {
        "mux"
    }

    fn dot_policy(&self) -> DotPolicy {
        self.dot_policy
    }

    fn render_param(&self, name: &str) -> String {
        format!("{{{name}}}")
    }

    fn render_wildcard(&self, name: &str) -> String {
        format!("{{{name}...}}")
    }

    fn build(&self, routes: Vec<NativeRoute>) -> Result<Box<dyn Dispatch>> {
        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let segments = parse(&route.pattern)?;
            if compiled
                .iter()
                .any(|(existing, _): &(Vec<Piece>, _)| *existing == segments)
            {
                return Err(Error::registration(format!(
                    "mux: pattern {} registered twice",
                    route.pattern
                )));
            }
            compiled.push((segments, route.methods));
        }
        Ok(Box::new(MuxDispatch { routes: compiled }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Param(String),
    Rest(String),
}

impl Piece {
    fn rank(&self) -> u8 {
        match self {
            Piece::Literal(_) => 0,
            Piece::Param(_) => 1,
            Piece::Rest(_) => 2,
        }
    }
}

fn parse(pattern: &str) -> Result<Vec<Piece>> {
    let body = pattern.strip_prefix('/').ok_or_else(|| {
        Error::registration(format!("mux: pattern {pattern} must start with '/'"))
    })?;
    let parts: Vec<&str> = body.split('/').collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) else {
                return Ok(Piece::Literal((*part).to_owned()));
            };
            match inner.strip_suffix("...") {
                Some(name) if i == last && !name.is_empty() => Ok(Piece::Rest(name.to_owned())),
                Some(_) => Err(Error::registration(format!(
                    "mux: {{name...}} must be the last segment of {pattern}"
                ))),
                None if !inner.is_empty() => Ok(Piece::Param(inner.to_owned())),
                None => Err(Error::registration(format!(
                    "mux: empty parameter name in {pattern}"
                ))),
            }
        })
        .collect()
}

struct MuxDispatch {
    routes: Vec<(Vec<Piece>, Arc<MethodTable>)>,
}

impl MuxDispatch {
    fn find(&self, path: &str) -> Option<(&Arc<MethodTable>, Vec<(String, String)>)> {
        let body = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = body.split('/').collect();

        let mut best: Option<(Vec<u8>, usize, Vec<(String, String)>)> = None;
        for (index, (pieces, _)) in self.routes.iter().enumerate() {
            let Some(params) = match_pieces(pieces, &parts) else {
                continue;
            };
            let rank: Vec<u8> = pieces.iter().map(Piece::rank).collect();
            if best.as_ref().is_none_or(|(best_rank, _, _)| rank < *best_rank) {
                best = Some((rank, index, params));
            }
        }

        best.map(|(_, index, params)| (&self.routes[index].1, params))
    }
}

fn match_pieces(pieces: &[Piece], parts: &[&str]) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        match piece {
            Piece::Literal(literal) => {
                if parts.get(i) != Some(&literal.as_str()) {
                    return None;
                }
            }
            Piece::Param(name) => {
                let value = parts.get(i).filter(|v| !v.is_empty())?;
                params.push((name.clone(), decode_segment(value)));
            }
            Piece::Rest(name) => {
                let rest = parts.get(i..)?.join("/");
                if rest.is_empty() {
                    return None;
                }
                params.push((name.clone(), decode_segment(&rest)));
                return Some(params);
            }
        }
    }
    (pieces.len() == parts.len()).then_some(params)
}

impl Dispatch for MuxDispatch {
    fn dispatch(&self, req: Request<Body>) -> ResponseFuture {
        match self.find(req.uri().path()) {
            Some((methods, params)) => Arc::clone(methods).serve(req, params),
            None => Box::pin(async { not_found() }),
        }
    }
}
