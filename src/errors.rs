use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the dump half of the pipeline.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Invalid MongoDB connection URI: {0}")]
    InvalidUri(String),

    #[error("None of the MongoDB hosts are reachable: {0}")]
    Unreachable(String),

    #[error("mongodump executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to start mongodump: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("mongodump exited with status {}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ProcessFailed { code: Option<i32> },

    #[error("Failed to move dump folder {} to {}: {source}", .from.display(), .to.display())]
    Finalize {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cloud backends a dump can be replicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderKind {
    Azure,
    Aws,
    Gcp,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "azure",
            ProviderKind::Aws => "aws",
            ProviderKind::Gcp => "gcp",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Azure => "Azure",
            ProviderKind::Aws => "AWS",
            ProviderKind::Gcp => "GCP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    Connect,
    ListBuckets,
    CreateBucket,
    LocateBucket,
    Upload,
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderOperation::Connect => "connect",
            ProviderOperation::ListBuckets => "list buckets",
            ProviderOperation::CreateBucket => "create bucket",
            ProviderOperation::LocateBucket => "locate bucket",
            ProviderOperation::Upload => "upload",
        })
    }
}

/// Uniform error produced by every provider adapter. SDK error types never
/// leave the adapter that produced them.
#[derive(Error, Debug)]
#[error("{provider} {operation} failed: {cause}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub operation: ProviderOperation,
    pub cause: String,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, operation: ProviderOperation, cause: impl fmt::Display) -> Self {
        Self {
            provider,
            operation,
            cause: cause.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("\"{}\" does not exist", .0.display())]
    MissingLocalPath(PathBuf),

    #[error("\"{}\" is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Telegram request failed: {0}")]
    Telegram(String),

    #[error("Email delivery failed: {0}")]
    Email(String),
}
