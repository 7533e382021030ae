//! Bucket (collection) handle.

use std::collections::HashMap;
use std::fmt;

use reqwest::Method;
use tracing::{debug, instrument};

use super::key::Key;
use crate::http::uri::DATA_RESOURCE;
use crate::http::{Connector, HttpConnection};
use crate::{Result, TRACING_TARGET_BUCKETS};

/// A named collection of keys.
///
/// Holds only its name and the connector used to reach the backend;
/// creating a handle sends no request.
#[derive(Clone)]
pub struct Bucket {
    connector: Connector,
    name: String,
}

impl Bucket {
    pub(crate) fn new(connector: Connector, name: impl Into<String>) -> Self {
        Self {
            connector,
            name: name.into(),
        }
    }

    /// Returns the bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a connection to the host serving this bucket.
    pub(crate) fn connect(&self) -> Result<HttpConnection> {
        self.connector.connect_collection(&self.name)
    }

    /// Returns an unnamed key handle in this bucket.
    pub fn new_key(&self) -> Key {
        Key::new(self)
    }

    /// Returns a handle for the key `name`, without checking that it exists.
    pub fn get_key(&self, name: impl Into<String>) -> Key {
        Key::with_name(self, name)
    }

    /// Lists every key in the bucket, in the order the server returns them.
    #[instrument(skip(self), target = TRACING_TARGET_BUCKETS, fields(bucket = %self.name))]
    pub async fn get_all_keys(&self) -> Result<Vec<Key>> {
        let connection = self.connect()?;
        let uri = connection.uri(&[DATA_RESOURCE, ""], &[])?;

        let response = connection.request(Method::GET, &uri, None).await?;
        let names: Vec<String> = response.json().await?;
        connection.close();

        debug!(
            target: TRACING_TARGET_BUCKETS,
            count = names.len(),
            "Listed keys"
        );

        Ok(names.into_iter().map(|name| self.get_key(name)).collect())
    }

    /// Deletes the key `name` from this bucket.
    pub async fn delete_key(&self, name: impl Into<String>) -> Result<()> {
        self.get_key(name).delete().await
    }

    /// Returns the space usage statistics the server keeps for this bucket.
    #[instrument(skip(self), target = TRACING_TARGET_BUCKETS, fields(bucket = %self.name))]
    pub async fn get_space_used(&self) -> Result<HashMap<String, serde_json::Value>> {
        let connection = self.connector.connect_default()?;
        let user_name = self.connector.credentials().user_name();
        let uri = connection.uri(
            &["customers", user_name, "collections", &self.name],
            &[("action", "space_usage")],
        )?;

        let response = connection.request(Method::GET, &uri, None).await?;
        let usage = response.json().await?;
        connection.close();

        Ok(usage)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Bucket {}
