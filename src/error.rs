use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    /// Invalid or missing route configuration. Raised at the start of
    /// handling; the host maps it to a 5xx.
    Config(String),
    /// A binding's fetch failed. Propagated unchanged, never retried.
    Upstream(String),
    /// No route matched and no root route is defined.
    NoMatch,
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "config error: {}", msg),
            GatewayError::Upstream(msg) => write!(f, "upstream error: {}", msg),
            GatewayError::NoMatch => write!(f, "no route matched"),
            GatewayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}
