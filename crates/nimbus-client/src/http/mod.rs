//! HTTP plumbing for the nimbus.io API.
//!
//! - [`uri`] computes hostnames and request addresses.
//! - [`auth`] signs requests with the account credentials.
//! - [`Connector`] owns the shared HTTP client and opens an
//!   [`HttpConnection`] per operation.
//! - [`HttpResponse`] reads response bodies in fixed-size chunks.

pub mod auth;
mod connection;
mod response;
pub mod uri;

pub use connection::{Connector, HttpConnection};
pub use response::HttpResponse;
