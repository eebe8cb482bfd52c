//! Relaying requests to a service named by the environment.

use crate::{
    forward::{Forwarder, ForwardingError},
    resolver::SrvResolver,
    ResolutionError, ServiceResolver,
};
use bytes::Bytes;
use http::{header, Method, Response, StatusCode};
use http_body_util::Full;
use std::fmt::Debug;

/// Environment variable holding the SRV name of the upstream service.
pub const SERVICE_ENV_VAR: &str = "LAGOM_SERVICE";

/// Path served by [`ServiceProxy::respond`].
pub const DEFAULT_ROUTE: &str = "/example";

/// Prefix of every response body produced when the upstream is unreachable.
pub const FAILURE_PREFIX: &str = "Could not contact Lagom Service.";

/// Errors encountered by a [`ServiceProxy`].
#[derive(Debug, thiserror::Error)]
pub enum ProxyError<Lookup: Debug> {
    /// The environment does not name a service
    #[error("environment variable {0} is not set")]
    MissingServiceName(String),
    /// The service could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError<Lookup>),
    /// The resolved endpoint could not be reached
    #[error(transparent)]
    Forwarding(#[from] ForwardingError),
}

/// Resolves the service named by the environment and relays its response.
#[derive(Debug)]
pub struct ServiceProxy<Resolver> {
    resolver: ServiceResolver<Resolver>,
    forwarder: Forwarder,
    env_var: String,
    route: String,
}

impl<Resolver> ServiceProxy<Resolver> {
    /// Creates a proxy reading the service name from [`SERVICE_ENV_VAR`].
    pub fn new(resolver: ServiceResolver<Resolver>, forwarder: Forwarder) -> Self {
        Self {
            resolver,
            forwarder,
            env_var: SERVICE_ENV_VAR.to_owned(),
            route: DEFAULT_ROUTE.to_owned(),
        }
    }

    /// Sets the environment variable naming the service.
    pub fn env_var(self, env_var: impl ToString) -> Self {
        Self {
            env_var: env_var.to_string(),
            ..self
        }
    }

    /// Sets the path answered by [`ServiceProxy::respond`].
    pub fn route(self, route: impl ToString) -> Self {
        Self {
            route: route.to_string(),
            ..self
        }
    }

    /// Gets the resolver used by the proxy.
    pub fn resolver(&self) -> &ServiceResolver<Resolver> {
        &self.resolver
    }

    /// Reads the service name from the environment.
    fn service_name(&self) -> Option<String> {
        std::env::var(&self.env_var)
            .ok()
            .filter(|name| !name.trim().is_empty())
    }
}

impl<Resolver: SrvResolver> ServiceProxy<Resolver> {
    /// Resolves `srv`, forwards a request to its preferred endpoint and
    /// returns the response body.
    pub async fn relay(&self, srv: &str) -> Result<String, ProxyError<Resolver::Error>> {
        let endpoints = self.resolver.resolve(srv).await?;
        let endpoint = endpoints
            .first()
            .ok_or_else(|| ResolutionError::Empty(srv.to_owned()))?;
        #[cfg(feature = "log")]
        tracing::debug!(srv, %endpoint, "Forwarding to resolved endpoint");
        Ok(self.forwarder.forward(endpoint).await?)
    }

    /// Relays the response of the service currently named by the environment.
    pub async fn proxy(&self) -> Result<String, ProxyError<Resolver::Error>> {
        let srv = self
            .service_name()
            .ok_or_else(|| ProxyError::MissingServiceName(self.env_var.clone()))?;
        self.relay(&srv).await
    }

    /// Like [`ServiceProxy::proxy`], but turns failures into a message
    /// suitable for a response body.
    pub async fn handle(&self) -> String {
        match self.proxy().await {
            Ok(body) => body,
            Err(error) => {
                #[cfg(feature = "log")]
                tracing::warn!(%error, "Could not contact service");
                format!("{FAILURE_PREFIX}{error}")
            }
        }
    }

    /// Answers an inbound request. `GET` and `POST` on the configured route
    /// are handled identically.
    pub async fn respond(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        if path != self.route {
            return plain(StatusCode::NOT_FOUND, "Not Found".to_owned());
        }
        if *method != Method::GET && *method != Method::POST {
            let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_owned());
            response
                .headers_mut()
                .insert(header::ALLOW, header::HeaderValue::from_static("GET, POST"));
            return response;
        }
        plain(StatusCode::OK, self.handle().await)
    }
}

fn plain(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
