use {
    crate::{
        RequestState,
        routing::{Middleware, Next},
        state::request_state,
    },
    axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    bytes::Bytes,
    futures_util::future::BoxFuture,
    http::{Request, StatusCode},
    std::{
        convert::Infallible,
        sync::Arc,
        task::{Context, Poll},
    },
    tower::{BoxError, Layer, Service, ServiceExt, timeout::error::Elapsed},
};

/// The inner service handed to a bridged tower layer. Calling it resumes the
/// chain.
#[derive(Clone)]
pub struct Continuation {
    next: Next,
    entry: RequestState,
}

impl Service<Request<Body>> for Continuation {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let state = match request_state(&req) {
            Some(local) => self.entry.merged(local),
            None => self.entry.clone(),
        };
        req.extensions_mut().insert(state);
        let next = self.next.clone();
        Box::pin(async move { Ok(next.run(req).await) })
    }
}

/// Wraps a tower layer as a [`Middleware`].
///
/// Errors produced by the layer are turned into responses by
/// [`default_error_response`]: a timeout becomes 408, anything else 500.
///
/// ```rust
/// use std::time::Duration;
/// use switchyard::bridge;
/// use tower::timeout::TimeoutLayer;
///
/// let timeout = bridge::tower::from_layer(TimeoutLayer::new(Duration::from_secs(5)));
/// ```
pub fn from_layer<L, B>(layer: L) -> Middleware
where
    L: Layer<Continuation> + Send + Sync + 'static,
    L::Service: Service<Request<Body>, Response = http::Response<B>> + Send + 'static,
    <L::Service as Service<Request<Body>>>::Error: Into<BoxError>,
    <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    from_layer_with(layer, default_error_response)
}

/// Like [`from_layer`], with `handle_error` deciding the response for errors
/// returned by the layer.
pub fn from_layer_with<L, B, F>(layer: L, handle_error: F) -> Middleware
where
    L: Layer<Continuation> + Send + Sync + 'static,
    L::Service: Service<Request<Body>, Response = http::Response<B>> + Send + 'static,
    <L::Service as Service<Request<Body>>>::Error: Into<BoxError>,
    <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    F: Fn(BoxError) -> Response + Send + Sync + 'static,
{
    let layer = Arc::new(layer);
    let handle_error = Arc::new(handle_error);
    Middleware::from_fn(move |req: Request<Body>, next: Next| {
        let entry = request_state(&req).cloned().unwrap_or_default();
        let service = layer.layer(Continuation { next, entry });
        let handle_error = Arc::clone(&handle_error);
        async move {
            match service.oneshot(req).await {
                Ok(response) => response.map(Body::new),
                Err(err) => handle_error(err.into()),
            }
        }
    })
}

/// Maps [`Elapsed`] to 408 Request Timeout and every other error to 500.
pub fn default_error_response(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        return StatusCode::REQUEST_TIMEOUT.into_response();
    }
    tracing::error!(error = %err, "Bridged tower middleware failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_error_response() {
        let elapsed: BoxError = Box::new(Elapsed::new());
        assert_eq!(
            default_error_response(elapsed).status(),
            StatusCode::REQUEST_TIMEOUT
        );

        let other: BoxError = "boom".into();
        assert_eq!(
            default_error_response(other).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
