//! Adapters that run foreign middleware as ordinary chain links.
//!
//! - [`tower::from_layer`] wraps any tower [`Layer`](::tower::Layer), such as
//!   `TimeoutLayer` or the tower-http layers.
//! - [`axum::from_router_layer`] wraps anything accepted by
//!   [`axum::Router::layer`](::axum::Router::layer), including
//!   `axum::middleware::from_fn`.
//!
//! In both cases the foreign middleware sees the request with its
//! [`RequestState`](crate::RequestState) attached and a readable body. When it
//! calls its inner service the chain resumes: parameter changes it made are
//! merged into the state, the buffered body is restored and the next link
//! runs. A foreign middleware that answers on its own stops the chain and its
//! response is returned untouched.

pub mod axum;
pub mod tower;
