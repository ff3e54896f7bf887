use crate::env::ServiceBinding;
use crate::error::GatewayError;
use crate::proxy::context::BoxBody;
use futures_util::future::BoxFuture;
use http::header::HOST;
use http::{HeaderValue, Uri};
use http_body_util::BodyExt;
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// A sub-worker reachable over plain HTTP.
///
/// Each origin owns its connection pool so idle-timeout behavior is
/// isolated per service. The forwarded request arrives in origin form; the
/// target URI is rebuilt from the configured origin plus that path/query.
pub struct HttpOrigin {
    name: String,
    scheme: String,
    authority: String,
    client: Client<HttpConnector, BoxBody>,
}

impl HttpOrigin {
    pub fn new(name: &str, origin: &str) -> Result<Self, GatewayError> {
        let uri: Uri = origin.parse().map_err(|e| {
            GatewayError::Config(format!(
                "service {:?} has an invalid origin {:?}: {}",
                name, origin, e
            ))
        })?;
        let scheme = uri.scheme_str().unwrap_or("http").to_string();
        if scheme != "http" {
            return Err(GatewayError::Config(format!(
                "service {:?}: only http origins are supported, got {:?}",
                name, origin
            )));
        }
        let authority = uri.authority().map(|a| a.to_string()).ok_or_else(|| {
            GatewayError::Config(format!(
                "service {:?} origin {:?} is missing an authority",
                name, origin
            ))
        })?;

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(32)
            .build_http();

        Ok(Self {
            name: name.to_string(),
            scheme,
            authority,
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ServiceBinding for HttpOrigin {
    fn fetch(
        &self,
        req: Request<BoxBody>,
    ) -> BoxFuture<'_, Result<Response<BoxBody>, GatewayError>> {
        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let path_and_query = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            parts.uri = format!("{}://{}{}", self.scheme, self.authority, path_and_query)
                .parse::<Uri>()
                .map_err(|e| {
                    GatewayError::Internal(format!("failed to build upstream uri: {}", e))
                })?;
            if let Ok(host) = HeaderValue::from_str(&self.authority) {
                parts.headers.insert(HOST, host);
            }

            let resp = self
                .client
                .request(Request::from_parts(parts, body))
                .await
                .map_err(|e| GatewayError::Upstream(format!("{}: {}", self.name, e)))?;

            let (parts, body) = resp.into_parts();
            Ok(Response::from_parts(parts, body.boxed()))
        })
    }
}
