//! Bucket and key handles modelled on the S3 client interface.
//!
//! [`NimbusClient`] is the entry point: it owns the credentials and the
//! transport, and hands out [`Bucket`] handles, which in turn hand out
//! [`Key`] handles. Handles are plain values; each operation on them opens
//! its own connection.

mod bucket;
mod key;
mod progress;
mod service;

pub use bucket::Bucket;
pub use key::{CHUNK_SIZE, Key};
pub use progress::{Progress, ProgressReader, RetrieveProgress};
pub use service::NimbusClient;
