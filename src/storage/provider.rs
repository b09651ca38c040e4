use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{ProviderError, ProviderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    /// Creation raced with an existing bucket we own.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    AlreadyExists,
}

/// Adapter over one vendor SDK. Implementations translate every SDK error
/// into a [`ProviderError`].
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn list_buckets(&self) -> Result<Vec<String>, ProviderError>;

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, ProviderError>;

    /// Prepares the client for a bucket that already existed before this
    /// run, e.g. one living in another region than the configured one.
    async fn attach_bucket(&self, _bucket: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<UploadStatus, ProviderError>;
}

/// A provider bound to a bucket that is known to exist.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Arc<dyn StorageProvider>,
    bucket: String,
}

impl ProviderHandle {
    /// Only the factory builds handles, after it has seen the bucket.
    pub(super) fn new(provider: Arc<dyn StorageProvider>, bucket: String) -> Self {
        Self { provider, bucket }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<UploadStatus, ProviderError> {
        self.provider
            .upload_file(&self.bucket, local_path, remote_key)
            .await
    }
}

/// Successfully initialised providers, keyed by backend. May be empty.
pub type ProviderSet = BTreeMap<ProviderKind, ProviderHandle>;
