use futures::future::join_all;
use std::path::{Component, Path};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::provider::{ProviderSet, UploadStatus};
use crate::errors::{ProviderKind, ReplicationError};

/// Result of one (provider, file) upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationOutcome {
    Uploaded,
    AlreadyExists,
    Failed(String),
}

impl ReplicationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ReplicationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct FileReplication {
    pub remote_key: String,
    pub outcomes: Vec<(ProviderKind, ReplicationOutcome)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderReplication {
    pub files: usize,
    pub uploads_succeeded: usize,
    pub uploads_failed: usize,
}

/// Remote key for `file`: its path relative to `strip_prefix` with `/`
/// separators, or the full local path when no prefix is given.
pub fn remote_key(file: &Path, strip_prefix: Option<&Path>) -> String {
    let relative = match strip_prefix {
        Some(prefix) => match file.strip_prefix(prefix) {
            Ok(relative) => relative,
            Err(_) => {
                warn!(
                    "{} is not below {}, using the full path as remote key",
                    file.display(),
                    prefix.display()
                );
                return file.to_string_lossy().into_owned();
            }
        },
        None => return file.to_string_lossy().into_owned(),
    };

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Copies local files to every provider in the set. Failures of one
/// provider or one file are logged and never stop the remaining attempts.
pub struct Replicator {
    handles: ProviderSet,
}

impl Replicator {
    pub fn new(handles: ProviderSet) -> Self {
        Self { handles }
    }

    /// Uploads one file to all providers concurrently. Errs only when the
    /// local file is missing; per-provider failures are in the outcomes.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_key: &str,
    ) -> Result<FileReplication, ReplicationError> {
        if !local_path.is_file() {
            error!("\"{}\" does not exist", local_path.display());
            return Err(ReplicationError::MissingLocalPath(local_path.to_path_buf()));
        }

        let attempts = self.handles.values().map(|handle| async move {
            let outcome = match handle.upload(local_path, remote_key).await {
                Ok(UploadStatus::Uploaded) => {
                    info!(
                        "\"{}\" was successfully uploaded to {} and stored as \"{}\" on \"{}\" bucket.",
                        local_path.display(),
                        handle.kind(),
                        remote_key,
                        handle.bucket()
                    );
                    ReplicationOutcome::Uploaded
                }
                Ok(UploadStatus::AlreadyExists) => {
                    info!(
                        "\"{}\" already exists in the \"{}\" bucket on {}.",
                        remote_key,
                        handle.bucket(),
                        handle.kind()
                    );
                    ReplicationOutcome::AlreadyExists
                }
                Err(e) => {
                    error!("{} ({})", e, remote_key);
                    ReplicationOutcome::Failed(e.to_string())
                }
            };
            (handle.kind(), outcome)
        });

        Ok(FileReplication {
            remote_key: remote_key.to_string(),
            outcomes: join_all(attempts).await,
        })
    }

    /// Uploads every regular file below `local_dir`, one file at a time.
    /// Succeeds whenever the directory exists, whatever the per-file results.
    pub async fn upload_folder(
        &self,
        local_dir: &Path,
        strip_prefix: Option<&Path>,
    ) -> Result<FolderReplication, ReplicationError> {
        if !local_dir.exists() {
            error!("\"{}\" folder does not exist. Please check.", local_dir.display());
            return Err(ReplicationError::MissingLocalPath(local_dir.to_path_buf()));
        }
        if !local_dir.is_dir() {
            error!("\"{}\" is not a folder. Please check.", local_dir.display());
            return Err(ReplicationError::NotADirectory(local_dir.to_path_buf()));
        }

        let mut summary = FolderReplication::default();
        if self.handles.is_empty() {
            info!("No storage providers available, nothing to replicate.");
            return Ok(summary);
        }

        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!("Failed to read entry below {}: {}", local_dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let key = remote_key(entry.path(), strip_prefix);
            summary.files += 1;
            match self.upload_file(entry.path(), &key).await {
                Ok(file) => {
                    for (kind, outcome) in &file.outcomes {
                        if outcome.is_success() {
                            summary.uploads_succeeded += 1;
                        } else {
                            debug!("{} did not receive \"{}\"", kind, file.remote_key);
                            summary.uploads_failed += 1;
                        }
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    summary.uploads_failed += self.handles.len();
                }
            }
        }

        info!(
            "\"{}\" replicated: {} files, {} uploads succeeded, {} failed",
            local_dir.display(),
            summary.files,
            summary.uploads_succeeded,
            summary.uploads_failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::factory::build_handles;
    use crate::storage::provider::StorageProvider;
    use crate::storage::testing::FakeProvider;
    use std::fs;
    use std::sync::Arc;

    async fn replicator_for(providers: Vec<Arc<FakeProvider>>) -> Replicator {
        let providers: Vec<Arc<dyn StorageProvider>> = providers
            .into_iter()
            .map(|p| p as Arc<dyn StorageProvider>)
            .collect();
        Replicator::new(build_handles(providers, "mongodump", true).await)
    }

    fn sample_tree() -> anyhow::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("sub"))?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::write(dir.path().join("sub/b.txt"), "b")?;
        Ok(dir)
    }

    #[test]
    fn test_remote_key_strips_prefix() {
        assert_eq!(
            remote_key(Path::new("/backups/dump-2024-01-15/shop/orders.bson.gz"), Some(Path::new("/backups"))),
            "dump-2024-01-15/shop/orders.bson.gz"
        );
        assert_eq!(
            remote_key(Path::new("/backups/dump/a.txt"), None),
            "/backups/dump/a.txt"
        );
        assert_eq!(
            remote_key(Path::new("/elsewhere/a.txt"), Some(Path::new("/backups"))),
            "/elsewhere/a.txt"
        );
    }

    #[tokio::test]
    async fn test_folder_keys_preserve_structure() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let fake = Arc::new(FakeProvider::new(ProviderKind::Aws));
        let replicator = replicator_for(vec![fake.clone()]).await;

        let summary = replicator.upload_folder(dir.path(), Some(dir.path())).await?;

        assert_eq!(fake.object_keys(), vec!["a.txt".to_string(), "sub/b.txt".to_string()]);
        assert_eq!(
            summary,
            FolderReplication {
                files: 2,
                uploads_succeeded: 2,
                uploads_failed: 0
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_one_provider_failing_does_not_block_others() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let broken = Arc::new(FakeProvider::new(ProviderKind::Azure).fail_upload());
        let healthy = Arc::new(FakeProvider::new(ProviderKind::Gcp));
        let replicator = replicator_for(vec![broken.clone(), healthy.clone()]).await;

        let file = replicator
            .upload_file(&dir.path().join("a.txt"), "a.txt")
            .await?;

        assert_eq!(file.outcomes.len(), 2);
        assert!(matches!(
            file.outcomes.iter().find(|(k, _)| *k == ProviderKind::Azure),
            Some((_, ReplicationOutcome::Failed(_)))
        ));
        assert!(matches!(
            file.outcomes.iter().find(|(k, _)| *k == ProviderKind::Gcp),
            Some((_, ReplicationOutcome::Uploaded))
        ));
        assert_eq!(healthy.object_keys(), vec!["a.txt".to_string()]);
        assert!(broken.object_keys().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_provider_is_retried_for_every_file() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let broken = Arc::new(FakeProvider::new(ProviderKind::Aws).fail_upload());
        let healthy = Arc::new(FakeProvider::new(ProviderKind::Azure));
        let replicator = replicator_for(vec![broken.clone(), healthy.clone()]).await;

        let summary = replicator.upload_folder(dir.path(), Some(dir.path())).await?;

        assert_eq!(broken.upload_calls(), 2);
        assert_eq!(healthy.object_keys().len(), 2);
        assert_eq!(summary.uploads_succeeded, 2);
        assert_eq!(summary.uploads_failed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_object_counts_as_success() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let fake = Arc::new(FakeProvider::new(ProviderKind::Azure).with_existing_object("a.txt"));
        let replicator = replicator_for(vec![fake]).await;

        let file = replicator.upload_file(&dir.path().join("a.txt"), "a.txt").await?;
        assert_eq!(file.outcomes, vec![(ProviderKind::Azure, ReplicationOutcome::AlreadyExists)]);
        assert!(file.outcomes[0].1.is_success());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_local_paths_are_errors() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let fake = Arc::new(FakeProvider::new(ProviderKind::Aws));
        let replicator = replicator_for(vec![fake.clone()]).await;

        assert!(matches!(
            replicator.upload_file(&dir.path().join("nope.txt"), "nope.txt").await,
            Err(ReplicationError::MissingLocalPath(_))
        ));
        assert!(matches!(
            replicator.upload_folder(&dir.path().join("nope"), None).await,
            Err(ReplicationError::MissingLocalPath(_))
        ));
        assert!(matches!(
            replicator.upload_folder(&dir.path().join("a.txt"), None).await,
            Err(ReplicationError::NotADirectory(_))
        ));
        assert_eq!(fake.upload_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_providers_is_a_noop_success() -> anyhow::Result<()> {
        let dir = sample_tree()?;
        let replicator = Replicator::new(ProviderSet::new());

        let summary = replicator.upload_folder(dir.path(), Some(dir.path())).await?;
        assert_eq!(summary, FolderReplication::default());
        Ok(())
    }
}
