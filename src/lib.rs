//! # switchyard
//!
//! Register HTTP routes and middleware once, serve them from whichever routing
//! engine fits the job.
//!
//! Routes use a single pattern syntax (`/users/:id`, `/file/:name.json`,
//! `/static/*path`) and a single onion-style middleware model. When the route
//! table is finalized each pattern is translated into the native syntax of the
//! chosen engine. Prefixes where a parameter route and a wildcard route would
//! collide natively are served by a regex-based shadow router instead, so the
//! same table behaves the same on every engine.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use switchyard::{AxumEngine, Config, Request, Result, Router, Server, param, recovery};
//!
//! async fn show_file(req: Request) -> String {
//!     // Both names resolve the same value.
//!     format!("{} / {}", param(&req, "name"), param(&req, "name.json"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default(); // Loads config/{RUST_ENV}.toml when present
//!     config.setup_tracing();
//!
//!     let mut router = Router::with_config(AxumEngine::new(), &config.routing);
//!     router.layer(recovery(false));
//!     router.get("/file/:name.json", show_file, []);
//!
//!     let api = router.group("/api");
//!     api.get("/health", |_req: Request| async { "ok" }, []);
//!
//!     Server::new(router, config.http).start().await
//! }
//! ```
//!
//! # Engines
//!
//! | Engine | Backing crate | Feature |
//! |--------|---------------|---------|
//! | [`AxumEngine`] | `axum` | always |
//! | [`MatchitEngine`] | `matchit` | always |
//! | [`RecognizerEngine`] | `route-recognizer` | `recognizer` (default) |
//! | [`PathTreeEngine`] | `path-tree` | `path-tree` (default) |
//! | [`MuxEngine`] | built in | always |
//!
//! # Configuration
//!
//! ```rust
//! use switchyard::Config;
//!
//! let config: Config = r#"
//!     [routing]
//!     max_shadow_cache_size = 5000
//!     max_body_bytes = "1MiB"
//!
//!     [http]
//!     bind_port = 8080
//!     shutdown_timeout = "10s"
//! "#.parse().unwrap();
//! assert_eq!(config.http.bind_port, 8080);
//! ```
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | The [`Router`], pattern syntax, middleware and handlers |
//! | [`engine`] | The [`Engine`] trait and the bundled engines |
//! | [`bridge`] | Running tower layers and axum middleware inside the chain |
//! | [`state`] | Per-request parameters and buffered body ([`RequestState`]) |
//! | [`validate()`] | Typed binding and validation of body plus path parameters |
//! | [`config`] | Configuration loading and validation ([`Config`]) |
//! | [`error`] | Error types ([`Error`]) |

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
mod recovery;
pub mod routing;
mod server;
pub mod state;
mod utils;
mod validate;

pub use {
    config::*,
    engine::{
        AxumEngine, Dispatch, Engine, MatchitEngine, MethodTable, MuxEngine, NativeRoute,
        method_not_allowed, not_found,
    },
    error::*,
    recovery::recovery,
    routing::{
        DOT_PLACEHOLDER, DotPolicy, Handler, Middleware, Next, ParamBinding, Pattern,
        ResponseFuture, Router, Segment, Translation,
    },
    server::Server,
    state::{
        ANY_KEY, PATH_KEY, RequestState, WILDCARD_KEY, delete_state_value, param, request_state,
        set_state_value,
    },
    utils::{join_paths, replace_handlebars_with_env},
    validate::{FieldError, validate, validated},
};

#[cfg(feature = "path-tree")]
pub use engine::PathTreeEngine;
#[cfg(feature = "recognizer")]
pub use engine::RecognizerEngine;

/// An HTTP request with an axum body, as seen by handlers and middleware.
pub type Request<B = axum::body::Body> = http::Request<B>;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
