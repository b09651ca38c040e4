use async_trait::async_trait;
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::http::buckets::insert::{
    BucketCreationConfig, InsertBucketParam, InsertBucketRequest,
};
use google_cloud_storage::http::buckets::list::ListBucketsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::chunks::BLOCK_SIZE;
use super::provider::{BucketCreation, StorageProvider, UploadStatus};
use crate::config::GcpConfig;
use crate::errors::{ProviderError, ProviderKind, ProviderOperation};

const HTTP_CONFLICT: u16 = 409;

/// Google Cloud Storage, authenticated with a service-account key file.
pub struct GcpProvider {
    client: Client,
    project_id: String,
    location: String,
}

impl GcpProvider {
    pub async fn connect(config: &GcpConfig) -> Result<Self, ProviderError> {
        let credentials =
            CredentialsFile::new_from_file(config.credentials_path.to_string_lossy().into_owned())
                .await
                .map_err(|e| Self::error(ProviderOperation::Connect, e))?;
        let project_id = credentials.project_id.clone().ok_or_else(|| {
            Self::error(
                ProviderOperation::Connect,
                format!(
                    "credentials file {} has no project_id",
                    config.credentials_path.display()
                ),
            )
        })?;
        let client_config = ClientConfig::default()
            .with_credentials(credentials)
            .await
            .map_err(|e| Self::error(ProviderOperation::Connect, e))?;

        Ok(Self {
            client: Client::new(client_config),
            project_id,
            location: config.region.clone(),
        })
    }

    fn error(operation: ProviderOperation, cause: impl std::fmt::Display) -> ProviderError {
        ProviderError::new(ProviderKind::Gcp, operation, cause)
    }
}

#[async_trait]
impl StorageProvider for GcpProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gcp
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ProviderError> {
        let mut buckets = Vec::new();
        let mut page_token = None;
        loop {
            let response = self
                .client
                .list_buckets(&ListBucketsRequest {
                    project: self.project_id.clone(),
                    page_token: page_token.take(),
                    ..Default::default()
                })
                .await
                .map_err(|e| Self::error(ProviderOperation::ListBuckets, e))?;
            buckets.extend(response.items.into_iter().map(|b| b.name));
            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(buckets)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, ProviderError> {
        let request = InsertBucketRequest {
            name: bucket.to_string(),
            param: InsertBucketParam {
                project: self.project_id.clone(),
                ..Default::default()
            },
            bucket: BucketCreationConfig {
                location: self.location.clone(),
                ..Default::default()
            },
        };
        match self.client.insert_bucket(&request).await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(GcsError::Response(response)) if response.code == HTTP_CONFLICT => {
                Ok(BucketCreation::AlreadyExists)
            }
            Err(e) => Err(Self::error(ProviderOperation::CreateBucket, e)),
        }
    }

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
        let file = File::open(local_path).await.map_err(read_error)?;
        let length = file.metadata().await.map_err(read_error)?.len();

        let request = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        let mut media = Media::new(remote_key.to_string());
        media.content_length = Some(length);
        let upload_type = UploadType::Simple(media);
        self.client
            .upload_streamed_object(&request, ReaderStream::with_capacity(file, BLOCK_SIZE), &upload_type)
            .await
            .map_err(|e| Self::error(ProviderOperation::Upload, e))?;

        Ok(UploadStatus::Uploaded)
    }
}
