use std::sync::Arc;
use tracing::{debug, error, info};

use super::aws::AwsProvider;
use super::azure::AzureProvider;
use super::gcp::GcpProvider;
use super::provider::{BucketCreation, ProviderHandle, ProviderSet, StorageProvider};
use crate::config::AppConfig;

/// Makes sure `bucket` exists on `provider` and returns a handle bound to it.
///
/// Existing buckets are detected by listing first, so creation is only
/// attempted for names that are actually missing. A creation that races
/// with another writer and reports "already yours" still yields a handle.
/// Every failure is logged and turned into `None`.
pub async fn ensure_bucket(
    provider: Arc<dyn StorageProvider>,
    bucket: &str,
    create_if_missing: bool,
) -> Option<ProviderHandle> {
    let kind = provider.kind();
    let existing = match provider.list_buckets().await {
        Ok(existing) => existing,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    if existing.iter().any(|name| name == bucket) {
        info!("Container \"{}\" already exists on {} and owned by you.", bucket, kind);
        if let Err(e) = provider.attach_bucket(bucket).await {
            error!("{}", e);
            return None;
        }
        return Some(ProviderHandle::new(provider, bucket.to_string()));
    }

    if !create_if_missing {
        error!(
            "Container \"{}\" does not exist on {} and bucket creation is disabled.",
            bucket, kind
        );
        return None;
    }

    match provider.create_bucket(bucket).await {
        Ok(BucketCreation::Created) => {
            info!("Container \"{}\" successfully created on {}.", bucket, kind);
            Some(ProviderHandle::new(provider, bucket.to_string()))
        }
        Ok(BucketCreation::AlreadyExists) => {
            info!("Container \"{}\" already exists on {} and owned by you.", bucket, kind);
            Some(ProviderHandle::new(provider, bucket.to_string()))
        }
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Ensures the bucket on every connected provider, keeping only the ones
/// that succeeded.
pub async fn build_handles(
    providers: Vec<Arc<dyn StorageProvider>>,
    bucket: &str,
    create_if_missing: bool,
) -> ProviderSet {
    let mut handles = ProviderSet::new();
    for provider in providers {
        let kind = provider.kind();
        if handles.contains_key(&kind) {
            continue;
        }
        if let Some(handle) = ensure_bucket(provider, bucket, create_if_missing).await {
            handles.insert(kind, handle);
        }
    }
    debug!(
        "Storage providers ready: {:?}",
        handles.keys().map(|k| k.as_str()).collect::<Vec<_>>()
    );
    handles
}

/// Connects every provider that has credentials configured. Providers
/// without credentials are skipped silently; connection failures are logged.
pub async fn connect_providers(config: &AppConfig) -> Vec<Arc<dyn StorageProvider>> {
    let mut providers: Vec<Arc<dyn StorageProvider>> = Vec::new();

    if let Some(azure) = &config.storage.azure {
        info!("Azure connection parameters found.");
        match AzureProvider::connect(azure) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => error!("{}", e),
        }
    }

    if let Some(aws) = &config.storage.aws {
        info!("AWS connection parameters found.");
        providers.push(Arc::new(AwsProvider::connect(aws).await));
    }

    if let Some(gcp) = &config.storage.gcp {
        info!("GCP connection parameters found.");
        match GcpProvider::connect(gcp).await {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => error!("{}", e),
        }
    }

    providers
}

/// Provider handles for this run: connect, then ensure the bucket.
pub async fn create_provider_handles(config: &AppConfig) -> ProviderSet {
    let providers = connect_providers(config).await;
    if providers.is_empty() {
        info!("No cloud storage credentials configured.");
        return ProviderSet::new();
    }
    build_handles(providers, &config.bucket, config.create_buckets).await
}
