//! Per-request routing state.
//!
//! Every request dispatched by a [`Router`](crate::Router) carries a
//! [`RequestState`] in its extensions. It holds the path parameters captured
//! by whichever engine matched the route and, for non-GET requests with a
//! body, the buffered body bytes so that every middleware layer and the
//! handler can read the same payload.
//!
//! The state is never mutated in place. Each update builds a new value with
//! a copied parameter map and replaces the extension, so a state cloned into
//! another request or a foreign middleware context cannot observe the change.

use {
    crate::{Error, Result},
    axum::body::Body,
    bytes::Bytes,
    http::{Method, Request},
    http_body::Body as _,
    http_body_util::{BodyExt, LengthLimitError, Limited},
    std::{collections::HashMap, sync::Arc},
};

/// Key under which every wildcard capture is mirrored.
pub const WILDCARD_KEY: &str = "*";

/// Generic key under which a wildcard capture is also mirrored.
pub const PATH_KEY: &str = "path";

/// Name given to a wildcard declared without a name (`/static/*`).
pub const ANY_KEY: &str = "any";

/// Path parameters and buffered body of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    params: Arc<HashMap<String, String>>,
    body: Option<Bytes>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a path parameter.
    ///
    /// Lookup order, first hit wins:
    ///
    /// 1. the exact key;
    /// 2. a stored key equal to `key` or starting with `key.`, so `id` finds
    ///    a value captured as `id.json`;
    /// 3. for a dotted `key`, the part before the first dot, so `id.json`
    ///    finds a value captured as `id`;
    /// 4. the wildcard capture (`*`, then `any`);
    ///
    /// and `None` otherwise.
    pub fn param(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.params.get(key) {
            return Some(value.as_str());
        }

        let dotted = format!("{key}.");
        let fuzzy = self
            .params
            .iter()
            .filter(|(name, _)| name.starts_with(&dotted))
            .min_by(|(a, _), (b, _)| a.cmp(b));
        if let Some((_, value)) = fuzzy {
            return Some(value.as_str());
        }

        if let Some(value) = key
            .split_once('.')
            .and_then(|(base, _)| self.params.get(base))
        {
            return Some(value.as_str());
        }

        self.params
            .get(WILDCARD_KEY)
            .or_else(|| self.params.get(ANY_KEY))
            .map(String::as_str)
    }

    /// All captured parameters, including wildcard mirrors.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// The buffered request body, if one was captured.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns a copy of this state with `key` set to `value`.
    #[must_use]
    pub fn with_param(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_params([(key.into(), value.into())])
    }

    /// Returns a copy of this state with all `params` added, overriding
    /// existing keys.
    #[must_use]
    pub fn with_params<I, K, V>(&self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut copy = (*self.params).clone();
        copy.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self {
            params: Arc::new(copy),
            body: self.body.clone(),
        }
    }

    /// Returns a copy of this state without `key`.
    #[must_use]
    pub fn without_param(&self, key: &str) -> Self {
        let mut copy = (*self.params).clone();
        copy.remove(key);
        Self {
            params: Arc::new(copy),
            body: self.body.clone(),
        }
    }

    /// Returns a copy of this state carrying `body`.
    #[must_use]
    pub fn with_body(&self, body: Bytes) -> Self {
        Self {
            params: Arc::clone(&self.params),
            body: Some(body),
        }
    }

    /// Union of both states where `local` wins on equal keys. The body of
    /// `local` is kept when present.
    #[must_use]
    pub fn merged(&self, local: &RequestState) -> Self {
        if Arc::ptr_eq(&self.params, &local.params) {
            return Self {
                params: Arc::clone(&self.params),
                body: local.body.clone().or_else(|| self.body.clone()),
            };
        }
        let mut copy = (*self.params).clone();
        copy.extend(
            local
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self {
            params: Arc::new(copy),
            body: local.body.clone().or_else(|| self.body.clone()),
        }
    }
}

/// Returns the routing state attached to `req`, if any.
pub fn request_state<B>(req: &Request<B>) -> Option<&RequestState> {
    req.extensions().get::<RequestState>()
}

/// Resolves a path parameter of `req`, returning an empty string when absent.
///
/// See [`RequestState::param`] for the lookup order.
pub fn param<B>(req: &Request<B>, key: &str) -> String {
    request_state(req)
        .and_then(|state| state.param(key))
        .unwrap_or_default()
        .to_owned()
}

/// Sets a parameter in the routing state of `req`, creating the state when
/// the request has none.
pub fn set_state_value<B>(req: &mut Request<B>, key: impl Into<String>, value: impl Into<String>) {
    let state = request_state(req)
        .cloned()
        .unwrap_or_default()
        .with_param(key, value);
    req.extensions_mut().insert(state);
}

/// Removes a parameter from the routing state of `req`.
pub fn delete_state_value<B>(req: &mut Request<B>, key: &str) {
    if let Some(state) = request_state(req) {
        let state = state.without_param(key);
        req.extensions_mut().insert(state);
    }
}

/// Replaces the request body with a fresh readable copy of the buffered
/// bytes, if the state holds any.
pub(crate) fn reinject_body(req: &mut Request<Body>) {
    if let Some(bytes) = request_state(req).and_then(RequestState::body) {
        let bytes = bytes.clone();
        *req.body_mut() = Body::from(bytes);
    }
}

/// Makes sure `req` carries a [`RequestState`] and, for non-GET requests
/// with a body, that the body has been buffered into it.
pub(crate) async fn capture_body(req: Request<Body>, limit: u64) -> Result<Request<Body>> {
    let existing = request_state(&req).cloned();
    let needs_capture = req.method() != Method::GET
        && !req.body().is_end_stream()
        && existing.as_ref().and_then(RequestState::body).is_none();

    if !needs_capture {
        let mut req = req;
        if existing.is_none() {
            req.extensions_mut().insert(RequestState::default());
        }
        reinject_body(&mut req);
        return Ok(req);
    }

    let (mut parts, body) = req.into_parts();
    let limit_usize = usize::try_from(limit).unwrap_or(usize::MAX);
    let bytes = match Limited::new(body, limit_usize).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.is::<LengthLimitError>() => return Err(Error::payload_too_large(limit)),
        Err(err) => {
            return Err(Error::invalid_input(format!(
                "Failed to read request body: {err}"
            )));
        }
    };

    let state = existing.unwrap_or_default();
    let state = if bytes.is_empty() {
        state
    } else {
        state.with_body(bytes.clone())
    };
    parts.extensions.insert(state);
    Ok(Request::from_parts(parts, Body::from(bytes)))
}
