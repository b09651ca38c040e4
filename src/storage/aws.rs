// mongodumptool/src/storage/aws.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::provider::{BucketCreation, StorageProvider, UploadStatus};
use crate::config::AwsConfig;
use crate::errors::{ProviderError, ProviderKind, ProviderOperation};

/// Region in which S3 rejects an explicit location constraint.
const AWS_DEFAULT_LOCATION: &str = "us-east-1";
/// Legacy location constraint still reported for old Ireland buckets.
const AWS_LEGACY_EU_LOCATION: &str = "EU";
const AWS_LEGACY_EU_REGION: &str = "eu-west-1";

/// Region a bucket lives in, from its `GetBucketLocation` constraint.
/// `us-east-1` buckets report no constraint at all.
pub fn region_from_location(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => AWS_DEFAULT_LOCATION.to_string(),
        Some(AWS_LEGACY_EU_LOCATION) => AWS_LEGACY_EU_REGION.to_string(),
        Some(region) => region.to_string(),
    }
}

/// Amazon S3, or any S3-compatible endpoint when `endpoint_url` is set.
pub struct AwsProvider {
    client: s3::Client,
    region: String,
    custom_endpoint: bool,
    /// Clients for pre-existing buckets outside `region`.
    bucket_clients: Mutex<HashMap<String, s3::Client>>,
}

impl AwsProvider {
    pub async fn connect(aws_config: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(aws_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &aws_config.access_key_id,
                &aws_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &aws_config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints are usually S3-compatible stores that need path-style addressing.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(aws_config.endpoint_url.is_some())
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            region: aws_config.region.clone(),
            custom_endpoint: aws_config.endpoint_url.is_some(),
            bucket_clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, bucket: &str) -> s3::Client {
        let clients = self
            .bucket_clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients
            .get(bucket)
            .cloned()
            .unwrap_or_else(|| self.client.clone())
    }

    fn error(operation: ProviderOperation, cause: impl std::fmt::Display) -> ProviderError {
        ProviderError::new(ProviderKind::Aws, operation, cause)
    }
}

#[async_trait]
impl StorageProvider for AwsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aws
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ProviderError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| Self::error(ProviderOperation::ListBuckets, DisplayErrorContext(&e)))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, ProviderError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != AWS_DEFAULT_LOCATION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(e) => {
                if e
                    .as_service_error()
                    .is_some_and(|service| service.is_bucket_already_owned_by_you())
                {
                    debug!("Bucket {} already owned by this account", bucket);
                    Ok(BucketCreation::AlreadyExists)
                } else {
                    Err(Self::error(ProviderOperation::CreateBucket, DisplayErrorContext(&e)))
                }
            }
        }
    }

    /// S3 does not redirect signed requests across regions, so an existing
    /// bucket elsewhere gets its own client.
    async fn attach_bucket(&self, bucket: &str) -> Result<(), ProviderError> {
        if self.custom_endpoint {
            return Ok(());
        }
        let output = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Self::error(ProviderOperation::LocateBucket, DisplayErrorContext(&e)))?;
        let region = region_from_location(output.location_constraint().map(|c| c.as_str()));
        if region == self.region {
            return Ok(());
        }

        info!(
            "Bucket \"{}\" lives in {} rather than {}, using a client for that region.",
            bucket, region, self.region
        );
        let regional = s3::Client::from_conf(
            self.client
                .config()
                .to_builder()
                .region(Region::new(region))
                .build(),
        );
        self.bucket_clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(bucket.to_string(), regional);
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<UploadStatus, ProviderError> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            Self::error(
                ProviderOperation::Upload,
                format!("failed to read {}: {}", local_path.display(), e),
            )
        })?;

        self.client_for(bucket)
            .put_object()
            .bucket(bucket)
            .key(remote_key)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::error(ProviderOperation::Upload, DisplayErrorContext(&e)))?;

        Ok(UploadStatus::Uploaded)
    }
}
