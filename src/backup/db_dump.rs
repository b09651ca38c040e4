// mongodumptool/src/backup/db_dump.rs
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, info};

use super::artifact::{ArtifactPaths, DumpArtifact, measure_size};
use super::connectivity::verify_uri;
use crate::config::AppConfig;
use crate::errors::DumpError;
use crate::utils::find_mongodump_executable;

/// Runs mongodump for one connection string into a working directory and
/// turns the result into a dated artifact.
pub struct MongoDump {
    uri: String,
    executable: Option<PathBuf>,
    paths: ArtifactPaths,
}

impl MongoDump {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_date(
            config.mongo_uri.clone(),
            config.output_folder.clone(),
            config.mongodump_path.clone(),
            Local::now().date_naive(),
        )
    }

    pub fn with_date(
        uri: String,
        output_folder: PathBuf,
        executable: Option<PathBuf>,
        date: NaiveDate,
    ) -> Self {
        Self {
            uri,
            executable,
            paths: ArtifactPaths::new(output_folder, date),
        }
    }

    /// Fails unless at least one host of the URI accepts a TCP connection.
    /// `mongodb+srv://` URIs skip the TCP check; mongodump resolves them.
    pub async fn check_connectivity(&self) -> Result<(), DumpError> {
        verify_uri(&self.uri).await
    }

    /// Runs `mongodump --uri=<uri> --gzip --out <working dir>`, logging its
    /// stdout line by line. Only exit status 0 counts as success.
    pub async fn dump(&self) -> Result<(), DumpError> {
        let executable = find_mongodump_executable(self.executable.as_deref())
            .map_err(|e| DumpError::ExecutableNotFound(format!("{:#}", e)))?;
        info!(
            "Running {} into {}",
            executable.display(),
            self.paths.working().display()
        );

        let mut child = Command::new(&executable)
            .arg(format!("--uri={}", self.uri))
            .arg("--gzip")
            .arg("--out")
            .arg(self.paths.working())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(DumpError::Spawn)?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).split(b'\n');
            loop {
                match lines.next_segment().await {
                    Ok(Some(line)) => {
                        let line = String::from_utf8_lossy(&line);
                        let line = line.trim_end();
                        if !line.is_empty() {
                            info!("{}", line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read mongodump output: {}", e);
                        break;
                    }
                }
            }
        }

        let status = child.wait().await.map_err(DumpError::Spawn)?;
        if status.success() {
            info!("mongodump finished successfully");
            Ok(())
        } else {
            error!("mongodump exited with {}", status);
            Err(DumpError::ProcessFailed {
                code: status.code(),
            })
        }
    }

    /// Renames the working directory to its dated name and measures it. A
    /// failed size computation degrades to `size: None`; a failed rename is
    /// an error.
    pub fn finalize(&self) -> Result<DumpArtifact, DumpError> {
        let path = self.paths.finalize()?;
        let size = measure_size(&path);
        Ok(DumpArtifact {
            path,
            size,
            created: self.paths.date(),
        })
    }

    pub fn cleanup(&self) -> bool {
        self.paths.cleanup()
    }
}
