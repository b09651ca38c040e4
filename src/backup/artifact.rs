// mongodumptool/src/backup/artifact.rs
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::errors::DumpError;
use crate::utils::size::human_size;

/// A finished dump directory, renamed to its dated final form.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpArtifact {
    pub path: PathBuf,
    pub size: Option<String>,
    pub created: NaiveDate,
}

/// `{working}-{YYYY-MM-DD}` next to the working directory.
pub fn dated_path(working_dir: &Path, date: NaiveDate) -> PathBuf {
    let mut name = working_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!("-{}", date.format("%Y-%m-%d")));
    working_dir.with_file_name(name)
}

/// Total size of every regular file below `path`, formatted with SI units.
/// `None` when any part of the tree cannot be read.
pub fn measure_size(path: &Path) -> Option<String> {
    let mut total: u64 = 0;
    for entry in WalkDir::new(path) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to compute size of {}: {}", path.display(), e);
                return None;
            }
        };
        if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(metadata) => total += metadata.len(),
                Err(e) => {
                    warn!("Failed to read metadata of {}: {}", entry.path().display(), e);
                    return None;
                }
            }
        }
    }

    let size = human_size(total);
    info!("Dump folder is stored at \"{}\" and \"{}\" large.", path.display(), size);
    Some(size)
}

/// Working and dated locations of one run's dump. The date is fixed when the
/// run starts so that finalize and cleanup always agree on the dated name.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    working: PathBuf,
    date: NaiveDate,
}

impl ArtifactPaths {
    pub fn new(working: PathBuf, date: NaiveDate) -> Self {
        Self { working, date }
    }

    pub fn working(&self) -> &Path {
        &self.working
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn dated(&self) -> PathBuf {
        dated_path(&self.working, self.date)
    }

    /// Moves the working directory to its dated name, replacing a same-day
    /// artifact left by an earlier run.
    pub fn finalize(&self) -> Result<PathBuf, DumpError> {
        let dated = self.dated();
        if dated.is_dir() {
            warn!("Dump folder \"{}\" already exists. Removing now.", dated.display());
            fs::remove_dir_all(&dated).map_err(|source| {
                error!("Failed to remove stale dump folder {}: {}", dated.display(), source);
                DumpError::Finalize {
                    from: self.working.clone(),
                    to: dated.clone(),
                    source,
                }
            })?;
        }

        fs::rename(&self.working, &dated).map_err(|source| {
            error!(
                "Failed to move {} to {}: {}",
                self.working.display(),
                dated.display(),
                source
            );
            DumpError::Finalize {
                from: self.working.clone(),
                to: dated.clone(),
                source,
            }
        })?;

        info!("Dump folder renamed and stored at \"{}\"", dated.display());
        Ok(dated)
    }

    /// Removes both the dated and the working directory if present. Safe to
    /// call any number of times; failures are logged and reported as `false`.
    pub fn cleanup(&self) -> bool {
        let mut clean = true;
        for dir in [self.dated(), self.working.clone()] {
            if dir.is_dir() {
                warn!("Performing cleanup steps - \"{}\" removed.", dir.display());
                if let Err(e) = fs::remove_dir_all(&dir) {
                    error!("Failed to remove {}: {}", dir.display(), e);
                    clean = false;
                }
            }
        }
        if !clean {
            error!("Application failed to perform cleanup steps");
        }
        clean
    }
}
