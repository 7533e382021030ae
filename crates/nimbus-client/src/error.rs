//! Error types for nimbus.io client operations.

/// Specialized [`Result`] type for nimbus.io client operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for nimbus.io client operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum Error {
    /// Configuration error.
    ///
    /// Credentials are missing or incomplete, the dotfile is malformed, or
    /// the transport options cannot be turned into a working HTTP client.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The key handle cannot address an object.
    ///
    /// Raised before any request is sent when a key has no bucket or no name.
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),

    /// A write with `replace = false` targeted a key that already exists.
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// The metadata entry is neither cached locally nor stored remotely.
    #[error("Metadata key not found: {0}")]
    MetadataNotFound(String),

    /// The backend answered 404 for the requested resource.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-success status other than 404.
    #[error("HTTP request failed with status {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// A request address could not be built.
    #[error("Invalid address: {0}")]
    Url(#[from] url::ParseError),

    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body was not the expected JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local file or stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns whether the backend reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns whether this error indicates a configuration issue.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound(_) => Some(404),
            Error::Http { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
