//! Object storage abstraction for the incoming bucket.
//!
//! Provides a unified interface over S3 and the local filesystem, reduced to
//! what ingestion needs: listing landed objects with their sizes.

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use regex::Regex;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{InvalidUrlSnafu, IoSnafu, ObjectStoreSnafu, S3ConfigSnafu, StorageError};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

// URL patterns for supported storage backends
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)/?$";
const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^(?P<path>/.*)$";

#[derive(Debug, Clone, PartialEq, Eq)]
enum BackendConfig {
    S3 { bucket: String },
    Local { path: String },
}

fn matchers() -> &'static [(Regex, fn(&regex::Captures) -> BackendConfig)] {
    static MATCHERS: OnceLock<Vec<(Regex, fn(&regex::Captures) -> BackendConfig)>> =
        OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            (Regex::new(S3_URL).unwrap(), |caps| BackendConfig::S3 {
                bucket: caps["bucket"].to_string(),
            }),
            (Regex::new(FILE_URI).unwrap(), |caps| BackendConfig::Local {
                path: caps["path"].to_string(),
            }),
            (Regex::new(FILE_PATH).unwrap(), |caps| BackendConfig::Local {
                path: caps["path"].to_string(),
            }),
        ]
    })
}

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    object_store: Arc<dyn ObjectStore>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a provider for a storage URL with backend options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = matchers()
            .iter()
            .find_map(|(regex, build)| regex.captures(url).map(|caps| build(&caps)))
            .context(InvalidUrlSnafu { url })?;

        match config {
            BackendConfig::S3 { bucket } => Self::construct_s3(bucket, options).await,
            BackendConfig::Local { path } => Self::construct_local(path).await,
        }
    }

    async fn construct_s3(
        bucket: String,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);

        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(S3ConfigSnafu)?, value.clone());
        }
        builder = builder.with_retry(RetryConfig::default());

        let object_store: Arc<dyn ObjectStore> = Arc::new(builder.build().context(S3ConfigSnafu)?);

        Ok(Self {
            object_store,
            canonical_url: format!("s3://{bucket}"),
        })
    }

    async fn construct_local(path: String) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&path).await.context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&path).context(ObjectStoreSnafu)?);

        Ok(Self {
            object_store,
            canonical_url: format!("file://{path}"),
        })
    }

    /// Canonical URL of this provider's root.
    pub fn url(&self) -> &str {
        &self.canonical_url
    }

    /// List objects under a key prefix, returning `(path, size)` pairs.
    ///
    /// Paths are relative to the provider root. Ordering follows the
    /// backend's listing order.
    pub async fn list_with_sizes(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, u64)>, StorageError> {
        let prefix = prefix.map(Path::from);
        let files: Vec<(String, u64)> = self
            .object_store
            .list(prefix.as_ref())
            .map_ok(|meta| (meta.location.to_string(), meta.size as u64))
            .try_collect()
            .await
            .context(ObjectStoreSnafu)?;

        Ok(files)
    }
}
