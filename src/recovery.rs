//! Panic recovery middleware.

use {
    crate::{bridge, routing::Middleware},
    axum::response::Response,
    http::{StatusCode, header},
    serde_json::{Value, json},
    std::{any::Any, backtrace::Backtrace},
    tower_http::catch_panic::CatchPanicLayer,
};

/// Catches panics raised by the links inside it and answers with
/// `500 {"error":"Internal Server Error"}`.
///
/// With `stack` set, the body also carries a `"stack"` field holding the
/// backtrace of the recovering task. The panic message is logged at `error`.
///
/// ```rust
/// use switchyard::{AxumEngine, Router, recovery};
///
/// let mut router = Router::new(AxumEngine::new());
/// router.layer(recovery(false));
/// ```
pub fn recovery(stack: bool) -> Middleware {
    bridge::tower::from_layer(CatchPanicLayer::custom(
        move |err: Box<dyn Any + Send + 'static>| panic_response(err, stack),
    ))
}

fn panic_response(err: Box<dyn Any + Send + 'static>, stack: bool) -> Response<String> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "panic payload could not be downcast".to_owned()
    };
    tracing::error!(panic = %message, "Handler panicked");

    let mut body = json!({ "error": "Internal Server Error" });
    if stack {
        body["stack"] = Value::String(Backtrace::force_capture().to_string());
    }

    // Never panic while answering a panic.
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap_or_else(|_| Response::new(r#"{"error":"Internal Server Error"}"#.to_owned()))
}
