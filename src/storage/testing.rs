use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::provider::{BucketCreation, StorageProvider, UploadStatus};
use crate::errors::{ProviderError, ProviderKind, ProviderOperation};

/// In-memory provider that records calls and can be told to fail.
pub struct FakeProvider {
    kind: ProviderKind,
    buckets: Mutex<Vec<String>>,
    objects: Mutex<Vec<(String, String)>>,
    create_calls: AtomicUsize,
    attach_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fail_list: bool,
    fail_attach: bool,
    fail_create: bool,
    create_reports_existing: bool,
    fail_upload: bool,
    existing_objects: Vec<String>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            buckets: Mutex::new(Vec::new()),
            objects: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            attach_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            fail_list: false,
            fail_attach: false,
            fail_create: false,
            create_reports_existing: false,
            fail_upload: false,
            existing_objects: Vec::new(),
        }
    }

    pub fn with_buckets(self, names: &[&str]) -> Self {
        *self.buckets.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn create_reports_existing(mut self) -> Self {
        self.create_reports_existing = true;
        self
    }

    pub fn fail_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn with_existing_object(mut self, key: &str) -> Self {
        self.existing_objects.push(key.to_string());
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn buckets(&self) -> Vec<String> {
        self.buckets.lock().unwrap().clone()
    }

    /// Keys stored so far, sorted.
    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_buckets(&self) -> Result<Vec<String>, ProviderError> {
        if self.fail_list {
            return Err(ProviderError::new(self.kind, ProviderOperation::ListBuckets, "invalid credentials"));
        }
        Ok(self.buckets())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(ProviderError::new(self.kind, ProviderOperation::CreateBucket, "access denied"));
        }
        if self.create_reports_existing {
            return Ok(BucketCreation::AlreadyExists);
        }
        self.buckets.lock().unwrap().push(bucket.to_string());
        Ok(BucketCreation::Created)
    }

    async fn attach_bucket(&self, _bucket: &str) -> Result<(), ProviderError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach {
            return Err(ProviderError::new(self.kind, ProviderOperation::LocateBucket, "bucket region unavailable"));
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<UploadStatus, ProviderError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload {
            return Err(ProviderError::new(self.kind, ProviderOperation::Upload, "connection reset"));
        }
        if self.existing_objects.iter().any(|k| k == remote_key) {
            return Ok(UploadStatus::AlreadyExists);
        }
        if !local_path.is_file() {
            return Err(ProviderError::new(self.kind, ProviderOperation::Upload, "missing local file"));
        }
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), remote_key.to_string()));
        Ok(UploadStatus::Uploaded)
    }
}
