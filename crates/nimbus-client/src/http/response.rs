//! Streaming access to response bodies.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::Result;

/// Upper bound on the buffer preallocated from an announced body length.
const INITIAL_CAPACITY_LIMIT: usize = 64 * 1024;

/// A successful response whose body has not been read yet.
pub struct HttpResponse {
    status: StatusCode,
    content_length: Option<u64>,
    body: Pin<Box<dyn AsyncRead + Send>>,
}

impl HttpResponse {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let status = response.status();
        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        Self {
            status,
            content_length,
            body: Box::pin(StreamReader::new(stream)),
        }
    }

    /// Returns the response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Reads the next chunk of the body into `buf`.
    ///
    /// The buffer is filled completely unless the body ends first; zero
    /// means the body is exhausted.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(fill_chunk(&mut self.body, buf).await?)
    }

    /// Reads the whole body.
    pub async fn read_all(mut self) -> Result<Bytes> {
        let capacity = self
            .content_length
            .map_or(0, |len| len.min(INITIAL_CAPACITY_LIMIT as u64) as usize);
        let mut data = Vec::with_capacity(capacity);
        self.body.read_to_end(&mut data).await?;
        Ok(Bytes::from(data))
    }

    /// Reads and discards the whole body, returning its length.
    pub async fn drain(mut self) -> Result<u64> {
        Ok(tokio::io::copy(&mut self.body, &mut tokio::io::sink()).await?)
    }

    /// Reads the whole body and decodes it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let data = self.read_all().await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Reads from `reader` until `buf` is full or the reader is exhausted.
pub(crate) async fn fill_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
