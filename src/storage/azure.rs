use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::*;
use futures::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tracing::debug;

use super::chunks::{BLOCK_SIZE, block_id, read_block};
use super::provider::{BucketCreation, StorageProvider, UploadStatus};
use crate::config::AzureConfig;
use crate::errors::{ProviderError, ProviderKind, ProviderOperation};

const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";
const BLOB_ALREADY_EXISTS: &str = "BlobAlreadyExists";

/// Azure Blob Storage, addressed through a storage-account connection string.
pub struct AzureProvider {
    client: BlobServiceClient,
}

impl AzureProvider {
    pub fn connect(config: &AzureConfig) -> Result<Self, ProviderError> {
        let connection_string = ConnectionString::new(&config.connection_string)
            .map_err(|e| Self::error(ProviderOperation::Connect, e))?;
        let account = connection_string.account_name.ok_or_else(|| {
            Self::error(
                ProviderOperation::Connect,
                "connection string does not contain an AccountName",
            )
        })?;
        let credentials = connection_string
            .storage_credentials()
            .map_err(|e| Self::error(ProviderOperation::Connect, e))?;

        Ok(Self {
            client: BlobServiceClient::new(account, credentials),
        })
    }

    fn error(operation: ProviderOperation, cause: impl std::fmt::Display) -> ProviderError {
        ProviderError::new(ProviderKind::Azure, operation, cause)
    }
}

fn error_code(err: &azure_core::Error) -> Option<&str> {
    match err.kind() {
        ErrorKind::HttpResponse { error_code, .. } => error_code.as_deref(),
        _ => None,
    }
}

#[async_trait]
impl StorageProvider for AzureProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ProviderError> {
        let mut containers = Vec::new();
        let mut pages = self.client.list_containers().into_stream();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Self::error(ProviderOperation::ListBuckets, e))?;
            containers.extend(page.containers.into_iter().map(|c| c.name));
        }
        Ok(containers)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, ProviderError> {
        match self.client.container_client(bucket).create().await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(e) if error_code(&e) == Some(CONTAINER_ALREADY_EXISTS) => {
                Ok(BucketCreation::AlreadyExists)
            }
            Err(e) => Err(Self::error(ProviderOperation::CreateBucket, e)),
        }
    }

    /// Files up to one block go up in a single request; larger ones are
    /// sent block by block and committed with a block list.
    async fn upload_file(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<UploadStatus, ProviderError> {
        let read_error = |e: std::io::Error| {
            Self::error(
                ProviderOperation::Upload,
                format!("failed to read {}: {}", local_path.display(), e),
            )
        };
        let mut file = File::open(local_path).await.map_err(read_error)?;
        let blob = self
            .client
            .container_client(bucket)
            .blob_client(remote_key);

        let first = read_block(&mut file, BLOCK_SIZE).await.map_err(read_error)?;
        let committed = if first.len() < BLOCK_SIZE {
            blob.put_block_blob(first)
                .content_type("application/octet-stream")
                .await
                .map(|_| ())
        } else {
            let mut blocks = Vec::new();
            let mut block = first;
            while !block.is_empty() {
                let id = block_id(blocks.len());
                blob.put_block(id.clone(), block)
                    .await
                    .map_err(|e| Self::error(ProviderOperation::Upload, e))?;
                blocks.push(BlobBlockType::new_uncommitted(id));
                block = read_block(&mut file, BLOCK_SIZE).await.map_err(read_error)?;
            }
            debug!("Committing {} blocks for {}", blocks.len(), remote_key);
            blob.put_block_list(BlockList { blocks })
                .content_type("application/octet-stream")
                .await
                .map(|_| ())
        };

        match committed {
            Ok(()) => Ok(UploadStatus::Uploaded),
            Err(e) if error_code(&e) == Some(BLOB_ALREADY_EXISTS) => Ok(UploadStatus::AlreadyExists),
            Err(e) => Err(Self::error(ProviderOperation::Upload, e)),
        }
    }
}
