//! Authenticated connections to a nimbus.io host.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use jiff::Timestamp;
use reqwest::header::{AUTHORIZATION, HOST};
use reqwest::{Body, Client, Method, StatusCode};
use url::Url;

use super::response::HttpResponse;
use super::{auth, uri};
use crate::config::{ClientConfig, Credentials};
use crate::{Error, Result, TRACING_TARGET_CONNECTION};

/// Maximum number of bytes of an error body kept in [`Error::Http`].
const ERROR_BODY_LIMIT: usize = 1024;

struct ConnectorInner {
    http: Client,
    credentials: Credentials,
    config: ClientConfig,
}

/// Factory for [`HttpConnection`]s.
///
/// Holds the credentials, the transport options and the underlying HTTP
/// client. Cloning is cheap; clones share the same HTTP client.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

impl Connector {
    /// Creates a connector from credentials and transport options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let timeout = config.effective_timeout();

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            timeout_ms = timeout.as_millis(),
            service_domain = %config.service_domain,
            base_address = ?config.base_address.as_ref().map(Url::as_str),
            "Creating HTTP client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.effective_user_agent())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ConnectorInner {
                http,
                credentials,
                config,
            }),
        })
    }

    /// Returns the credentials requests are signed with.
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// Returns the transport options.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Opens a connection bound to `host`.
    pub fn connect(&self, host: impl Into<String>) -> Result<HttpConnection> {
        let host = host.into();
        let base = self.inner.config.endpoint_for(&host)?;

        tracing::trace!(
            target: TRACING_TARGET_CONNECTION,
            host = %host,
            "Opening connection"
        );

        Ok(HttpConnection {
            connector: self.clone(),
            host,
            base,
        })
    }

    /// Opens a connection to the account-level host.
    pub fn connect_default(&self) -> Result<HttpConnection> {
        self.connect(uri::default_hostname(&self.inner.config.service_domain))
    }

    /// Opens a connection to the host serving `collection`.
    pub fn connect_collection(&self, collection: &str) -> Result<HttpConnection> {
        self.connect(uri::collection_hostname(
            collection,
            &self.inner.config.service_domain,
        ))
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("credentials", &self.inner.credentials)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// A connection to one nimbus.io host, used for a single logical operation.
///
/// Dropping the connection releases it; [`HttpConnection::close`] does the
/// same and records it in the trace.
pub struct HttpConnection {
    connector: Connector,
    host: String,
    base: Url,
}

impl HttpConnection {
    /// Returns the host this connection is bound to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds a request address on this connection's host.
    pub fn uri(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        uri::compute_uri(&self.base, segments, params)
    }

    /// Signs and sends one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] on a 404, [`Error::Http`] on any other
    /// non-success status and [`Error::Transport`] if the request could not
    /// be sent.
    pub async fn request(
        &self,
        method: Method,
        uri: &Url,
        body: Option<Body>,
    ) -> Result<HttpResponse> {
        let credentials = self.connector.credentials();
        let path = uri::path_and_query(uri);
        let timestamp = Timestamp::now().as_second();
        let signature = auth::compute_signature(credentials, method.as_str(), timestamp, path);

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            method = %method,
            host = %self.host,
            path = %path,
            "Sending request"
        );

        let mut request = self
            .connector
            .inner
            .http
            .request(method.clone(), uri.clone())
            .header(AUTHORIZATION, auth::authorization_value(credentials, &signature))
            .header(auth::TIMESTAMP_HEADER, timestamp.to_string());

        if self.connector.config().uses_base_address() {
            request = request.header(HOST, &self.host);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                method = %method,
                host = %self.host,
                path = %path,
                error = %e,
                "Request failed"
            );
            Error::Transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                method = %method,
                path = %path,
                status = status.as_u16(),
                "Request completed"
            );
            return Ok(HttpResponse::new(response));
        }

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                method = %method,
                path = %path,
                "Resource not found"
            );
            return Err(Error::NotFound(path.to_string()));
        }

        let message = read_error_body(response).await;

        tracing::error!(
            target: TRACING_TARGET_CONNECTION,
            method = %method,
            host = %self.host,
            path = %path,
            status = status.as_u16(),
            message = %message,
            "Request rejected"
        );

        Err(Error::Http {
            status: status.as_u16(),
            message,
        })
    }

    /// Releases the connection.
    pub fn close(self) {
        tracing::trace!(
            target: TRACING_TARGET_CONNECTION,
            host = %self.host,
            "Closing connection"
        );
    }
}

/// Reads at most [`ERROR_BODY_LIMIT`] bytes of an error response body.
///
/// A body that fails mid-stream keeps whatever was received before the
/// failure.
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while body.len() < ERROR_BODY_LIMIT {
        let Some(Ok(chunk)) = stream.next().await else {
            break;
        };
        let take = chunk.len().min(ERROR_BODY_LIMIT - body.len());
        body.extend_from_slice(&chunk[..take]);
    }

    String::from_utf8_lossy(&body).into_owned()
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("host", &self.host)
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}
