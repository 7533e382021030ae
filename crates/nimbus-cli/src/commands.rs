//! Subcommands and their execution.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use nimbus_client::{NimbusClient, Progress};

use crate::TRACING_TARGET_TRANSFER;

/// Operation to perform.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List bucket names
    Buckets,

    /// Create a bucket
    CreateBucket {
        /// Bucket name
        name: String,
    },

    /// Delete a bucket
    DeleteBucket {
        /// Bucket name
        name: String,
    },

    /// List the keys in a bucket
    Keys {
        /// Bucket name
        bucket: String,
    },

    /// Upload a file
    Put {
        /// Bucket name
        bucket: String,
        /// Key name
        key: String,
        /// File to upload
        file: PathBuf,
        /// Fail if the key already exists
        #[arg(long)]
        no_replace: bool,
        /// Metadata entry to attach, as NAME=VALUE (repeatable)
        #[arg(long = "meta", value_name = "NAME=VALUE", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },

    /// Download a key into a file
    Get {
        /// Bucket name
        bucket: String,
        /// Key name
        key: String,
        /// Destination file
        file: PathBuf,
    },

    /// Delete a key
    Rm {
        /// Bucket name
        bucket: String,
        /// Key name
        key: String,
    },

    /// Check whether a key exists (exit status 1 when it does not)
    Stat {
        /// Bucket name
        bucket: String,
        /// Key name
        key: String,
    },

    /// Print a metadata value of a key
    Meta {
        /// Bucket name
        bucket: String,
        /// Key name
        key: String,
        /// Metadata entry name
        name: String,
    },

    /// Print the space usage of a bucket as JSON
    Usage {
        /// Bucket name
        bucket: String,
    },
}

impl Command {
    /// Runs the command against `client`.
    ///
    /// Returns `false` when the command completed but its subject was
    /// absent, which only `stat` reports.
    pub async fn execute(self, client: &NimbusClient) -> anyhow::Result<bool> {
        match self {
            Command::Buckets => {
                for (bucket, _) in client.get_all_buckets().await? {
                    println!("{}", bucket.name());
                }
            }
            Command::CreateBucket { name } => {
                client
                    .create_bucket(&name)
                    .await
                    .with_context(|| format!("failed to create bucket '{name}'"))?;
            }
            Command::DeleteBucket { name } => {
                client
                    .delete_bucket(&name)
                    .await
                    .with_context(|| format!("failed to delete bucket '{name}'"))?;
            }
            Command::Keys { bucket } => {
                let keys = client.get_bucket(bucket).get_all_keys().await?;
                for key in keys.iter().filter_map(|k| k.name()) {
                    println!("{key}");
                }
            }
            Command::Put {
                bucket,
                key,
                file,
                no_replace,
                meta,
            } => {
                let mut handle = client.get_bucket(bucket).get_key(&key);
                handle.update_metadata(meta);

                let size = handle
                    .set_contents_from_path(&file, !no_replace, Some(transfer_progress(&key)))
                    .await
                    .with_context(|| format!("failed to upload {}", file.display()))?;

                tracing::info!(target: TRACING_TARGET_TRANSFER, key = %key, size, "Upload complete");
            }
            Command::Get { bucket, key, file } => {
                let mut handle = client.get_bucket(bucket).get_key(&key);
                let size = handle
                    .get_contents_to_path(&file, Some(transfer_progress(&key)))
                    .await
                    .with_context(|| format!("failed to download '{key}'"))?;

                tracing::info!(target: TRACING_TARGET_TRANSFER, key = %key, size, "Download complete");
            }
            Command::Rm { bucket, key } => {
                client.get_bucket(bucket).delete_key(key).await?;
            }
            Command::Stat { bucket, key } => {
                let mut handle = client.get_bucket(bucket).get_key(key);
                if !handle.exists().await? {
                    return Ok(false);
                }
                match handle.size() {
                    Some(size) => println!("{size}"),
                    None => println!("exists"),
                }
            }
            Command::Meta { bucket, key, name } => {
                let mut handle = client.get_bucket(bucket).get_key(key);
                println!("{}", handle.get_metadata(&name).await?);
            }
            Command::Usage { bucket } => {
                let usage = client.get_bucket(bucket).get_space_used().await?;
                println!("{}", serde_json::to_string_pretty(&usage)?);
            }
        }

        Ok(true)
    }
}

/// Returns a progress callback that logs each reported byte count.
fn transfer_progress(key: &str) -> Box<dyn Progress> {
    let key = key.to_string();
    Box::new(move |done: u64, total: Option<u64>| {
        tracing::debug!(
            target: TRACING_TARGET_TRANSFER,
            key = %key,
            done,
            total = ?total,
            "Transfer progress"
        );
    })
}

/// Parses a `NAME=VALUE` metadata argument.
fn parse_meta(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{arg}'"))?;
    if name.is_empty() {
        return Err(format!("metadata name is empty in '{arg}'"));
    }
    Ok((name.to_string(), value.to_string()))
}
