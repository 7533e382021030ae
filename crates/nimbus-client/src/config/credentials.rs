//! Account credentials and their loader.
//!
//! Credentials are resolved from three environment variables first. When
//! any of them is missing, the dotfile is parsed and whatever environment
//! variables are present override the matching file entries.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, TRACING_TARGET_CLIENT};

/// Environment variable holding the account user name.
pub const ENV_USER_NAME: &str = "NIMBUS_IO_USER_NAME";

/// Environment variable holding the auth key id.
pub const ENV_AUTH_KEY_ID: &str = "NIMBUS_IO_AUTH_KEY_ID";

/// Environment variable holding the auth key.
pub const ENV_AUTH_KEY: &str = "NIMBUS_IO_AUTH_KEY";

/// Name of the credentials dotfile in the user's home directory.
pub const CONFIG_FILE_NAME: &str = ".nimbus.io";

/// Returns the default dotfile location, `$HOME/.nimbus.io`.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

/// nimbus.io account credentials.
///
/// The auth key is never serialized and is masked in debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account user name.
    pub user_name: String,

    /// Identifier of the auth key, sent in the clear.
    pub auth_key_id: String,

    /// Secret used to sign requests.
    #[serde(skip_serializing)]
    pub auth_key: String,
}

impl Credentials {
    /// Creates credentials from their three parts.
    pub fn new(
        user_name: impl Into<String>,
        auth_key_id: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            auth_key_id: auth_key_id.into(),
            auth_key: auth_key.into(),
        }
    }

    /// Loads credentials from the process environment and the default dotfile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any field is still unset after merging,
    /// or if the dotfile exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_with(default_config_path().as_deref(), |name| {
            std::env::var(name).ok()
        })
    }

    /// Loads credentials from the process environment and the given dotfile.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(Some(path.as_ref()), |name| std::env::var(name).ok())
    }

    /// Loads credentials using `lookup` in place of the process environment.
    ///
    /// A missing dotfile is treated as empty; any other read failure is an
    /// error.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = PartialCredentials::from_lookup(&lookup);
        if let Some(credentials) = from_env.complete() {
            tracing::debug!(
                target: TRACING_TARGET_CLIENT,
                user_name = %credentials.user_name,
                "Loaded credentials from environment"
            );
            return Ok(credentials);
        }

        let from_file = match path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => {
                    tracing::debug!(
                        target: TRACING_TARGET_CLIENT,
                        path = %path.display(),
                        "Reading credentials file"
                    );
                    PartialCredentials::parse(&contents)?
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    PartialCredentials::default()
                }
                Err(e) => return Err(Error::Io(e)),
            },
            None => PartialCredentials::default(),
        };

        from_file.overlay(from_env).finish(path)
    }

    /// Loads credentials from the three environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads credentials from the three variables exposed by `lookup` only.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        PartialCredentials::from_lookup(&lookup).finish(None)
    }

    /// Loads credentials from a dotfile only.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        PartialCredentials::parse(&contents)?.finish(Some(path))
    }

    /// Returns the user name.
    #[inline]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Returns the auth key id.
    #[inline]
    pub fn auth_key_id(&self) -> &str {
        &self.auth_key_id
    }

    /// Returns the auth key.
    #[inline]
    pub fn auth_key(&self) -> &str {
        &self.auth_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("auth_key_id", &self.auth_key_id)
            .field("auth_key", &"***")
            .finish()
    }
}

/// Credentials with possibly missing fields, as read from one source.
#[derive(Debug, Default)]
struct PartialCredentials {
    user_name: Option<String>,
    auth_key_id: Option<String>,
    auth_key: Option<String>,
}

impl PartialCredentials {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            user_name: lookup(ENV_USER_NAME),
            auth_key_id: lookup(ENV_AUTH_KEY_ID),
            auth_key: lookup(ENV_AUTH_KEY),
        }
    }

    /// Parses `key value` lines; blank lines and `#` comments are skipped.
    fn parse(contents: &str) -> Result<Self> {
        let mut partial = Self::default();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::Config(format!(
                    "line {} of the credentials file is not a 'key value' pair",
                    index + 1
                )));
            };

            match key.to_ascii_lowercase().as_str() {
                "user_name" | "username" => partial.user_name = Some(value.to_string()),
                "auth_key_id" | "authkeyid" => partial.auth_key_id = Some(value.to_string()),
                "auth_key" | "authkey" => partial.auth_key = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(partial)
    }

    /// Fields present in `other` replace the ones in `self`.
    fn overlay(self, other: Self) -> Self {
        Self {
            user_name: other.user_name.or(self.user_name),
            auth_key_id: other.auth_key_id.or(self.auth_key_id),
            auth_key: other.auth_key.or(self.auth_key),
        }
    }

    fn complete(&self) -> Option<Credentials> {
        match (&self.user_name, &self.auth_key_id, &self.auth_key) {
            (Some(user_name), Some(auth_key_id), Some(auth_key)) => {
                Some(Credentials::new(user_name, auth_key_id, auth_key))
            }
            _ => None,
        }
    }

    fn finish(self, path: Option<&Path>) -> Result<Credentials> {
        if let Some(credentials) = self.complete() {
            return Ok(credentials);
        }

        let missing: Vec<&str> = [
            (self.user_name.is_none(), ENV_USER_NAME),
            (self.auth_key_id.is_none(), ENV_AUTH_KEY_ID),
            (self.auth_key.is_none(), ENV_AUTH_KEY),
        ]
        .into_iter()
        .filter_map(|(missing, name)| missing.then_some(name))
        .collect();

        let source = match path {
            Some(path) => format!("the environment or {}", path.display()),
            None => "the environment".to_string(),
        };

        Err(Error::Config(format!(
            "missing credentials ({}); set them in {source}",
            missing.join(", ")
        )))
    }
}
