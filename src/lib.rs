//! Edge-side microfrontend router.
//!
//! A single front-door handler dispatches each request to one of several
//! independently-deployed sub-worker services by path, strips the mount
//! prefix, proxies the request, and rewrites the response — redirects,
//! cookie scopes, HTML asset references, CSS asset references — so the
//! upstream behaves as if it were mounted at its assigned sub-path.

pub mod config;
pub mod env;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod rewrite;
pub mod routing;
pub mod server;
pub mod upstream;

pub use env::{RequestEnv, ServiceBinding};
pub use error::GatewayError;
pub use proxy::{handle, BoxBody};
