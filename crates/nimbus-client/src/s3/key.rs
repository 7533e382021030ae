//! Key (object) handle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use reqwest::{Body, Method};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};

use super::bucket::Bucket;
use super::progress::{Progress, ProgressReader, RetrieveProgress};
use crate::http::uri::{self, DATA_RESOURCE};
use crate::{Error, Result, TRACING_TARGET_OBJECTS};

/// Size of the chunks transfers are read in: 64 KiB.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Body of a `stat` response.
#[derive(Debug, Deserialize)]
struct KeyStat {
    #[serde(default)]
    size: Option<u64>,
}

/// A named object within a bucket.
///
/// A key is a cheap local handle; creating one sends no request. It keeps
/// the object's size once known and a local metadata map that is attached
/// to the next write and consulted before asking the server.
#[derive(Debug, Clone, Default)]
pub struct Key {
    bucket: Option<Bucket>,
    name: Option<String>,
    size: Option<u64>,
    metadata: HashMap<String, String>,
}

impl Key {
    /// Creates an unnamed key in `bucket`.
    pub fn new(bucket: &Bucket) -> Self {
        Self {
            bucket: Some(bucket.clone()),
            ..Self::default()
        }
    }

    /// Creates a key named `name` in `bucket`.
    pub fn with_name(bucket: &Bucket, name: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.clone()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns the bucket this key belongs to.
    pub fn bucket(&self) -> Option<&Bucket> {
        self.bucket.as_ref()
    }

    /// Returns the key name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the key name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Returns the object size, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Sets the object size, used as the total when reporting download
    /// progress.
    pub fn set_size(&mut self, size: u64) {
        self.size = Some(size);
    }

    /// Returns the locally held metadata.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Sets a metadata entry, sent with the next write.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Sets several metadata entries, sent with the next write.
    pub fn update_metadata<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Returns the bucket and name, or fails if either is missing.
    fn target(&self) -> Result<(&Bucket, &str)> {
        let bucket = self
            .bucket
            .as_ref()
            .ok_or(Error::InvalidKey("key has no bucket"))?;
        let name = self
            .name
            .as_deref()
            .ok_or(Error::InvalidKey("key has no name"))?;
        Ok((bucket, name))
    }

    /// Checks whether the object exists.
    ///
    /// A 404 is reported as `false`; any other failure is returned. When the
    /// server reports the object size it is cached on the key.
    #[instrument(skip(self), target = TRACING_TARGET_OBJECTS, fields(key = ?self.name))]
    pub async fn exists(&mut self) -> Result<bool> {
        let (bucket, name) = self.target()?;
        let connection = bucket.connect()?;
        let uri = connection.uri(&[DATA_RESOURCE, name], &[("action", "stat")])?;

        let response = match connection.request(Method::GET, &uri, None).await {
            Ok(response) => response,
            Err(Error::NotFound(_)) => {
                connection.close();
                debug!(target: TRACING_TARGET_OBJECTS, "Key does not exist");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let body = response.read_all().await?;
        connection.close();

        if let Ok(KeyStat { size: Some(size) }) = serde_json::from_slice(&body) {
            self.size = Some(size);
        }

        debug!(target: TRACING_TARGET_OBJECTS, size = ?self.size, "Key exists");
        Ok(true)
    }

    /// Stores `data` as the object's content.
    ///
    /// With `replace == false` the write is refused with
    /// [`Error::KeyExists`] if the object already exists. Returns the number
    /// of bytes written.
    pub async fn set_contents_from_bytes(
        &mut self,
        data: impl Into<Bytes>,
        replace: bool,
    ) -> Result<u64> {
        let data = data.into();
        let size = data.len() as u64;

        self.guard_replace(replace).await?;
        self.write(Body::from(data)).await?;
        self.size = Some(size);
        Ok(size)
    }

    /// Streams the content of `reader` into the object.
    ///
    /// `progress` is called with the cumulative count every time a chunk is
    /// read from `reader`.
    pub async fn set_contents_from_reader<R>(
        &mut self,
        reader: R,
        replace: bool,
        progress: Option<Box<dyn Progress>>,
    ) -> Result<u64>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.guard_replace(replace).await?;
        self.write_reader(reader, progress, None).await
    }

    /// Streams the file at `path` into the object.
    ///
    /// The file length is reported to `progress` as the total.
    pub async fn set_contents_from_path(
        &mut self,
        path: impl AsRef<Path>,
        replace: bool,
        progress: Option<Box<dyn Progress>>,
    ) -> Result<u64> {
        self.target()?;
        let file = File::open(path.as_ref()).await?;
        let length = file.metadata().await?.len();

        self.guard_replace(replace).await?;
        self.write_reader(file, progress, Some(length)).await
    }

    async fn guard_replace(&mut self, replace: bool) -> Result<()> {
        self.target()?;
        if !replace && self.exists().await? {
            let name = self.name.clone().unwrap_or_default();
            debug!(target: TRACING_TARGET_OBJECTS, key = %name, "Refusing to replace key");
            return Err(Error::KeyExists(name));
        }
        Ok(())
    }

    async fn write_reader<R>(
        &mut self,
        reader: R,
        progress: Option<Box<dyn Progress>>,
        total: Option<u64>,
    ) -> Result<u64>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let reader = ProgressReader::new(reader, progress, total);
        let counter = reader.counter();
        let body = Body::wrap_stream(ReaderStream::with_capacity(reader, CHUNK_SIZE));

        self.write(body).await?;

        let size = counter.load(Ordering::Acquire);
        self.size = Some(size);
        Ok(size)
    }

    #[instrument(skip(self, body), target = TRACING_TARGET_OBJECTS, fields(key = ?self.name))]
    async fn write(&self, body: Body) -> Result<()> {
        let (bucket, name) = self.target()?;
        let connection = bucket.connect()?;

        let metadata = uri::metadata_params(&self.metadata);
        let params: Vec<(&str, &str)> = metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let uri = connection.uri(&[DATA_RESOURCE, name], &params)?;

        debug!(
            target: TRACING_TARGET_OBJECTS,
            bucket = %bucket.name(),
            metadata = params.len(),
            "Uploading key"
        );

        let response = connection.request(Method::POST, &uri, Some(body)).await?;
        response.drain().await?;
        connection.close();

        info!(
            target: TRACING_TARGET_OBJECTS,
            bucket = %bucket.name(),
            "Key uploaded"
        );
        Ok(())
    }

    /// Downloads the object's content into memory.
    pub async fn get_contents_as_bytes(&mut self) -> Result<Bytes> {
        let mut data = Vec::new();
        self.get_contents_to_writer(&mut data, None).await?;
        Ok(Bytes::from(data))
    }

    /// Downloads the object's content into `writer` in 64 KiB chunks.
    ///
    /// `progress` is called once before the first chunk, after every chunk
    /// and once at completion. The total it receives is the key's size if
    /// set, otherwise the length announced by the server. Returns the
    /// number of bytes received, which also becomes the key's size.
    #[instrument(skip(self, writer, progress), target = TRACING_TARGET_OBJECTS, fields(key = ?self.name))]
    pub async fn get_contents_to_writer<W>(
        &mut self,
        writer: &mut W,
        progress: Option<Box<dyn Progress>>,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let (bucket, name) = self.target()?;
        let connection = bucket.connect()?;
        let uri = connection.uri(&[DATA_RESOURCE, name], &[])?;

        debug!(target: TRACING_TARGET_OBJECTS, bucket = %bucket.name(), "Downloading key");

        let mut response = connection.request(Method::GET, &uri, None).await?;
        let mut reporter = RetrieveProgress::new(progress, self.size.or(response.content_length()));
        let mut buf = vec![0u8; CHUNK_SIZE];

        reporter.start();
        loop {
            let n = response.read_chunk(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            reporter.bytes_written(n as u64);
        }
        writer.flush().await?;
        reporter.finish();
        connection.close();

        let received = reporter.total_written();
        self.size = Some(received);

        debug!(target: TRACING_TARGET_OBJECTS, size = received, "Key downloaded");
        Ok(received)
    }

    /// Downloads the object's content into a file at `path`, replacing it.
    ///
    /// The content is written to a temporary file next to `path` and moved
    /// into place only once the download has completed, so a failed
    /// download leaves any existing file untouched.
    pub async fn get_contents_to_path(
        &mut self,
        path: impl AsRef<Path>,
        progress: Option<Box<dyn Progress>>,
    ) -> Result<u64> {
        self.target()?;
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let (file, temp_path) = NamedTempFile::new_in(dir)?.into_parts();
        let mut file = File::from_std(file);
        let received = self.get_contents_to_writer(&mut file, progress).await?;
        file.sync_all().await?;
        drop(file);

        temp_path.persist(path).map_err(|e| e.error)?;
        Ok(received)
    }

    /// Deletes the object.
    #[instrument(skip(self), target = TRACING_TARGET_OBJECTS, fields(key = ?self.name))]
    pub async fn delete(&self) -> Result<()> {
        let (bucket, name) = self.target()?;
        let connection = bucket.connect()?;
        let uri = connection.uri(&[DATA_RESOURCE, name], &[])?;

        let response = connection.request(Method::DELETE, &uri, None).await?;
        response.drain().await?;
        connection.close();

        info!(
            target: TRACING_TARGET_OBJECTS,
            bucket = %bucket.name(),
            "Key deleted"
        );
        Ok(())
    }

    /// Returns the metadata value stored under `key`.
    ///
    /// The local map is consulted first. On a miss the object's metadata is
    /// fetched from the server; entries not already held locally are cached
    /// and the lookup is repeated. Fails with [`Error::MetadataNotFound`] if
    /// the value is absent on both sides, including when the server answers
    /// 404.
    pub async fn get_metadata(&mut self, key: &str) -> Result<String> {
        if let Some(value) = self.metadata.get(key) {
            return Ok(value.clone());
        }

        let remote = match self.fetch_metadata().await {
            Ok(remote) => remote,
            Err(Error::NotFound(_)) => return Err(Error::MetadataNotFound(key.to_string())),
            Err(e) => return Err(e),
        };

        for (k, v) in remote {
            self.metadata.entry(k).or_insert(v);
        }

        self.metadata
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MetadataNotFound(key.to_string()))
    }

    #[instrument(skip(self), target = TRACING_TARGET_OBJECTS, fields(key = ?self.name))]
    async fn fetch_metadata(&self) -> Result<HashMap<String, String>> {
        let (bucket, name) = self.target()?;
        let connection = bucket.connect()?;
        let uri = connection.uri(&[DATA_RESOURCE, name], &[("action", "get_meta")])?;

        let response = connection.request(Method::GET, &uri, None).await?;
        let metadata: HashMap<String, String> = response.json().await?;
        connection.close();

        debug!(
            target: TRACING_TARGET_OBJECTS,
            entries = metadata.len(),
            "Fetched key metadata"
        );
        Ok(metadata)
    }
}
