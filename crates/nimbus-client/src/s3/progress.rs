//! Transfer progress reporting.
//!
//! Uploads wrap their source in a [`ProgressReader`], which reports the
//! cumulative byte count every time a chunk is read. Downloads drive a
//! [`RetrieveProgress`], which reports before the first chunk, after each
//! chunk and once more at completion. Callbacks run on the task performing
//! the transfer.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

/// Receives transfer progress as `(bytes_done, total_bytes)`.
///
/// `total_bytes` is `None` when the size of the transfer is not known up
/// front. Implemented for every matching closure.
pub trait Progress: Send + Sync {
    /// Reports the cumulative number of bytes transferred so far.
    fn report(&mut self, bytes_done: u64, total_bytes: Option<u64>);
}

impl<F> Progress for F
where
    F: FnMut(u64, Option<u64>) + Send + Sync,
{
    fn report(&mut self, bytes_done: u64, total_bytes: Option<u64>) {
        self(bytes_done, total_bytes)
    }
}

pin_project! {
    /// An async reader that reports progress as data flows through.
    ///
    /// The running byte count is also kept in a shared counter so the
    /// caller can learn how much was read after the reader has been handed
    /// off to the HTTP body.
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        progress: Option<Box<dyn Progress>>,
        total: Option<u64>,
        bytes_read: Arc<AtomicU64>,
    }
}

impl<R> ProgressReader<R> {
    /// Wraps `inner`, reporting to `progress` if one is given.
    pub fn new(inner: R, progress: Option<Box<dyn Progress>>, total: Option<u64>) -> Self {
        Self {
            inner,
            progress,
            total,
            bytes_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns a handle to the running byte count.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.bytes_read)
    }

    /// Returns the number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = (buf.filled().len() - before) as u64;
                if n > 0 {
                    let done = this.bytes_read.fetch_add(n, Ordering::AcqRel) + n;
                    if let Some(progress) = this.progress.as_mut() {
                        progress.report(done, *this.total);
                    }
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<R> fmt::Debug for ProgressReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReader")
            .field("total", &self.total)
            .field("bytes_read", &self.bytes_read())
            .field("reporting", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

/// Progress reporter for downloads.
///
/// Without a callback every method is a no-op.
pub struct RetrieveProgress {
    progress: Option<Box<dyn Progress>>,
    total: Option<u64>,
    bytes_written: u64,
}

impl RetrieveProgress {
    /// Creates a reporter for a transfer of `total` bytes, if known.
    pub fn new(progress: Option<Box<dyn Progress>>, total: Option<u64>) -> Self {
        Self {
            progress,
            total,
            bytes_written: 0,
        }
    }

    /// Creates a reporter that reports nothing.
    pub fn null() -> Self {
        Self::new(None, None)
    }

    /// Reports the start of the transfer.
    pub fn start(&mut self) {
        self.emit();
    }

    /// Records `n` more bytes and reports the new total.
    pub fn bytes_written(&mut self, n: u64) {
        self.bytes_written += n;
        self.emit();
    }

    /// Reports the end of the transfer.
    pub fn finish(&mut self) {
        self.emit();
    }

    /// Returns the number of bytes recorded so far.
    pub fn total_written(&self) -> u64 {
        self.bytes_written
    }

    fn emit(&mut self) {
        if let Some(progress) = self.progress.as_mut() {
            progress.report(self.bytes_written, self.total);
        }
    }
}

impl fmt::Debug for RetrieveProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieveProgress")
            .field("total", &self.total)
            .field("bytes_written", &self.bytes_written)
            .field("reporting", &self.progress.is_some())
            .finish()
    }
}
