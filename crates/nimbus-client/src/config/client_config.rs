//! Transport configuration for the nimbus.io client.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default nimbus.io service domain.
pub const DEFAULT_SERVICE_DOMAIN: &str = "nimbus.io";

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the service domain.
pub const ENV_SERVICE_DOMAIN: &str = "NIMBUS_IO_SERVICE_DOMAIN";

/// Environment variable holding an address to connect to instead of the
/// computed host.
pub const ENV_BASE_ADDRESS: &str = "NIMBUS_IO_BASE_ADDRESS";

/// Transport options shared by every connection a client opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ClientConfig {
    /// Domain of the nimbus.io service
    #[cfg_attr(
        feature = "config",
        arg(
            long = "service-domain",
            env = ENV_SERVICE_DOMAIN,
            default_value = DEFAULT_SERVICE_DOMAIN
        )
    )]
    #[serde(default = "default_service_domain")]
    pub service_domain: String,

    /// Address to connect to instead of the computed host (the computed
    /// host is still sent in the Host header)
    #[cfg_attr(
        feature = "config",
        arg(long = "base-address", env = ENV_BASE_ADDRESS)
    )]
    #[serde(default)]
    pub base_address: Option<Url>,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "HTTP_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_service_domain() -> String {
    DEFAULT_SERVICE_DOMAIN.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_domain: default_service_domain(),
            base_address: None,
            http_timeout: default_timeout_secs(),
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Set the service domain.
    #[must_use]
    pub fn with_service_domain(mut self, service_domain: impl Into<String>) -> Self {
        self.service_domain = service_domain.into();
        self
    }

    /// Route every connection to `base_address`.
    #[must_use]
    pub fn with_base_address(mut self, base_address: Url) -> Self {
        self.base_address = Some(base_address);
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_timeout = timeout_secs;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.http_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.http_timeout)
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(Self::default_user_agent)
    }

    fn default_user_agent() -> String {
        format!("nimbus-client/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Returns whether connections go to a fixed base address.
    pub fn uses_base_address(&self) -> bool {
        self.base_address.is_some()
    }

    /// Returns the URL requests for `host` are sent to.
    ///
    /// Without a base address this is `https://{host}/`.
    pub fn endpoint_for(&self, host: &str) -> Result<Url> {
        let endpoint = match &self.base_address {
            Some(base) => base.clone(),
            None => Url::parse(&format!("https://{host}/"))?,
        };

        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "'{endpoint}' cannot be used as a base address"
            )));
        }

        Ok(endpoint)
    }
}
