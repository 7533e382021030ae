//! Account-level client: bucket creation, listing and deletion.

use std::fmt;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::bucket::Bucket;
use crate::config::{ClientConfig, Credentials};
use crate::http::uri::default_collection_name;
use crate::http::{Connector, HttpConnection};
use crate::{Result, TRACING_TARGET_BUCKETS, TRACING_TARGET_CLIENT};

/// Entry point of the library.
///
/// Owns the credentials and transport options and hands out [`Bucket`]
/// handles. Cloning is cheap.
#[derive(Clone)]
pub struct NimbusClient {
    connector: Connector,
    default_bucket: Bucket,
}

impl NimbusClient {
    /// Creates a client for the account described by `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the HTTP client
    /// cannot be built.
    #[instrument(skip_all, target = TRACING_TARGET_CLIENT, fields(user_name = %credentials.user_name))]
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let default_name = default_collection_name(&credentials.user_name);
        let connector = Connector::new(credentials, config)?;
        let default_bucket = Bucket::new(connector.clone(), default_name);

        info!(
            target: TRACING_TARGET_CLIENT,
            service_domain = %connector.config().service_domain,
            default_bucket = %default_bucket.name(),
            "Client created"
        );

        Ok(Self {
            connector,
            default_bucket,
        })
    }

    /// Creates a client from credentials found in the environment or the
    /// default dotfile, with default transport options.
    pub fn from_env() -> Result<Self> {
        Self::new(Credentials::load()?, ClientConfig::default())
    }

    /// Returns the account credentials.
    pub fn credentials(&self) -> &Credentials {
        self.connector.credentials()
    }

    /// Returns the transport options.
    pub fn config(&self) -> &ClientConfig {
        self.connector.config()
    }

    /// Returns the account's default bucket, `dd-{user_name}`.
    pub fn default_bucket(&self) -> &Bucket {
        &self.default_bucket
    }

    /// Returns a handle for the bucket `name`, without checking that it
    /// exists.
    pub fn get_bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.connector.clone(), name)
    }

    fn connect(&self) -> Result<HttpConnection> {
        self.connector.connect_default()
    }

    /// Creates the bucket `name` and returns a handle for it.
    #[instrument(skip(self), target = TRACING_TARGET_BUCKETS)]
    pub async fn create_bucket(&self, name: &str) -> Result<Bucket> {
        let connection = self.connect()?;
        let uri = connection.uri(
            &["customers", self.user_name(), "collections"],
            &[("action", "create"), ("name", name)],
        )?;

        let response = connection.request(Method::POST, &uri, None).await?;
        response.drain().await?;
        connection.close();

        info!(target: TRACING_TARGET_BUCKETS, bucket = %name, "Bucket created");
        Ok(self.get_bucket(name))
    }

    /// Lists the account's buckets together with their creation timestamps,
    /// in the order the server returns them.
    #[instrument(skip(self), target = TRACING_TARGET_BUCKETS)]
    pub async fn get_all_buckets(&self) -> Result<Vec<(Bucket, Value)>> {
        let connection = self.connect()?;
        let uri = connection.uri(&["customers", self.user_name(), "collections"], &[])?;

        let response = connection.request(Method::GET, &uri, None).await?;
        let entries: Vec<(String, Value)> = response.json().await?;
        connection.close();

        debug!(
            target: TRACING_TARGET_BUCKETS,
            count = entries.len(),
            "Listed buckets"
        );

        Ok(entries
            .into_iter()
            .map(|(name, created)| (self.get_bucket(name), created))
            .collect())
    }

    /// Deletes the bucket `name`. A single leading `/` is ignored.
    #[instrument(skip(self), target = TRACING_TARGET_BUCKETS)]
    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let name = name.strip_prefix('/').unwrap_or(name);
        let connection = self.connect()?;
        let uri = connection.uri(&["customers", self.user_name(), "collections", name], &[])?;

        let response = connection.request(Method::DELETE, &uri, None).await?;
        response.drain().await?;
        connection.close();

        info!(target: TRACING_TARGET_BUCKETS, bucket = %name, "Bucket deleted");
        Ok(())
    }

    /// Releases the client.
    pub fn close(self) {
        debug!(
            target: TRACING_TARGET_CLIENT,
            user_name = %self.user_name(),
            "Client closed"
        );
    }

    fn user_name(&self) -> &str {
        self.connector.credentials().user_name()
    }
}

impl fmt::Debug for NimbusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NimbusClient")
            .field("connector", &self.connector)
            .field("default_bucket", &self.default_bucket.name())
            .finish()
    }
}
