#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for client construction and configuration.
pub const TRACING_TARGET_CLIENT: &str = "nimbus_client::client";

/// Tracing target for connection and request handling.
pub const TRACING_TARGET_CONNECTION: &str = "nimbus_client::connection";

/// Tracing target for bucket operations.
pub const TRACING_TARGET_BUCKETS: &str = "nimbus_client::buckets";

/// Tracing target for key (object) operations.
pub const TRACING_TARGET_OBJECTS: &str = "nimbus_client::objects";

mod error;

pub mod config;
pub mod http;
pub mod s3;

pub use crate::config::{ClientConfig, Credentials};
pub use crate::error::{Error, Result};
pub use crate::s3::{Bucket, Key, NimbusClient, Progress, ProgressReader, RetrieveProgress};
