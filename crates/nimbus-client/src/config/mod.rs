//! Client configuration.
//!
//! [`Credentials`] identify the account and sign every request; they come
//! from the environment or a dotfile. [`ClientConfig`] holds transport
//! options such as the service domain and request timeout.

mod client_config;
mod credentials;

pub use client_config::{
    ClientConfig, DEFAULT_SERVICE_DOMAIN, DEFAULT_TIMEOUT_SECS, ENV_BASE_ADDRESS,
    ENV_SERVICE_DOMAIN,
};
pub use credentials::{
    CONFIG_FILE_NAME, Credentials, ENV_AUTH_KEY, ENV_AUTH_KEY_ID, ENV_USER_NAME,
    default_config_path,
};
