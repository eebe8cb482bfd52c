//! Forwarding requests to resolved endpoints.

use crate::{Endpoint, SrvRecord};
use bytes::Bytes;
use http::{header, uri::Scheme, Request, StatusCode};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use url::{Position, Url};

/// Path requested from the upstream service by default.
pub const DEFAULT_PATH: &str = "/lagom";

/// Query string sent to the upstream service by default.
pub const DEFAULT_QUERY: &str = "name=liberty";

/// Default bound on a whole forwarded request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors encountered by a [`Forwarder`].
#[derive(Debug, thiserror::Error)]
pub enum ForwardingError {
    /// The endpoint could not be turned into a request target
    #[error("building url from endpoint: {0}")]
    Url(#[from] url::ParseError),
    /// Opening the connection failed
    #[error("connecting to {endpoint}: {source}")]
    Connect {
        /// The endpoint that could not be reached
        endpoint: Endpoint,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The request could not be built
    #[error("building request: {0}")]
    Request(#[from] http::Error),
    /// HTTP protocol or I/O errors while talking to the endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
    /// The endpoint did not answer in time
    #[error("request to {0} timed out")]
    Timeout(Url),
    /// The endpoint answered with an error status
    #[error("{url} responded with {status}")]
    Status {
        /// The requested URL
        url: Url,
        /// The status of the response
        status: StatusCode,
    },
    /// The response body is not text
    #[error("response body is not UTF-8: {0}")]
    Body(#[from] std::string::FromUtf8Error),
}

/// Issues plain HTTP GET requests against resolved endpoints.
#[derive(Debug, Clone)]
pub struct Forwarder {
    path: String,
    query: Option<String>,
    timeout: Duration,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_owned(),
            query: Some(DEFAULT_QUERY.to_owned()),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Forwarder {
    /// Sets the path requested from endpoints.
    pub fn path(self, path: impl ToString) -> Self {
        Self {
            path: path.to_string(),
            ..self
        }
    }

    /// Sets the query string sent to endpoints, if any.
    pub fn query(self, query: Option<String>) -> Self {
        Self { query, ..self }
    }

    /// Sets the bound on a whole request, from connecting to reading the body.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Builds the URL requested from `endpoint`.
    pub fn target(&self, endpoint: &Endpoint) -> Result<Url, ForwardingError> {
        let mut url = endpoint.parse(Scheme::HTTP)?;
        url.set_path(&self.path);
        url.set_query(self.query.as_deref());
        Ok(url)
    }

    /// Requests the configured path from `endpoint` and returns the response
    /// body as text.
    ///
    /// The body is returned verbatim: line terminators are kept, including a
    /// trailing newline, rather than being dropped line by line.
    pub async fn forward(&self, endpoint: &Endpoint) -> Result<String, ForwardingError> {
        let url = self.target(endpoint)?;
        match tokio::time::timeout(self.timeout, self.get(endpoint, &url)).await {
            Ok(result) => result,
            Err(_) => Err(ForwardingError::Timeout(url)),
        }
    }

    async fn get(&self, endpoint: &Endpoint, url: &Url) -> Result<String, ForwardingError> {
        let stream = TcpStream::connect((endpoint.host(), endpoint.port()))
            .await
            .map_err(|source| ForwardingError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            #[allow(unused_variables)]
            if let Err(error) = connection.await {
                #[cfg(feature = "log")]
                tracing::debug!(%error, "Upstream connection failed");
            }
        });

        let request = Request::get(&url[Position::BeforePath..])
            .header(header::HOST, &url[Position::BeforeHost..Position::AfterPort])
            .body(Empty::<Bytes>::new())?;
        let response = sender.send_request(request).await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ForwardingError::Status {
                url: url.clone(),
                status,
            });
        }

        let body = response.into_body().collect().await?.to_bytes();
        #[cfg(feature = "log")]
        tracing::debug!(%url, %status, bytes = body.len(), "Forwarded request");
        Ok(String::from_utf8(body.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn endpoint_of(server: &MockServer) -> Endpoint {
        let addr = server.address();
        Endpoint::new(addr.ip().to_string(), addr.port(), 0, 10)
    }

    #[test]
    fn target_uses_fixed_path_and_query() {
        let url = Forwarder::default()
            .target(&Endpoint::new("10.0.0.5", 9000, 0, 10))
            .unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:9000/lagom?name=liberty");
    }

    #[test]
    fn target_without_query() {
        let url = Forwarder::default()
            .path("/health")
            .query(None)
            .target(&Endpoint::new("node.example.", 80, 0, 0))
            .unwrap();
        assert_eq!(url.as_str(), "http://node.example/health");
    }

    #[tokio::test]
    async fn relays_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lagom"))
            .and(query_param("name", "liberty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let body = Forwarder::default().forward(&endpoint_of(&server)).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn keeps_multiline_bodies_intact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("line one\nline two\n"))
            .mount(&server)
            .await;

        let body = Forwarder::default().forward(&endpoint_of(&server)).await.unwrap();
        assert_eq!(body, "line one\nline two\n");
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = Forwarder::default().forward(&endpoint_of(&server)).await.unwrap_err();
        assert!(matches!(
            error,
            ForwardingError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn binary_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
            .mount(&server)
            .await;

        let error = Forwarder::default().forward(&endpoint_of(&server)).await.unwrap_err();
        assert!(matches!(error, ForwardingError::Body(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let error = Forwarder::default()
            .forward(&Endpoint::new("127.0.0.1", port, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(error, ForwardingError::Connect { .. }));
        assert!(error.to_string().starts_with(&format!("connecting to 127.0.0.1:{port}")));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let error = Forwarder::default()
            .timeout(Duration::from_millis(100))
            .forward(&endpoint_of(&server))
            .await
            .unwrap_err();
        assert!(matches!(error, ForwardingError::Timeout(_)));
    }
}
