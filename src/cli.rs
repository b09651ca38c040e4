use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::RawSettings;

/// Dump a MongoDB deployment and replicate it to Azure, AWS and GCP.
#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
#[clap(name = "mongodumptool", version)]
pub struct Cli {
    /// MongoDB connection string (MONGO_URI)
    #[clap(long, short)]
    pub uri: Option<String>,

    /// Dump output folder (MONGO_OUTPUT_FOLDER)
    #[clap(long, short)]
    pub out: Option<String>,

    /// Bucket or container name used on every provider (MONGO_DUMP_BUCKET)
    #[clap(long, short)]
    pub bucket: Option<String>,

    /// Environment file loaded before reading variables
    #[clap(long, short)]
    pub env: Option<PathBuf>,

    /// JSON config file
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Azure storage connection string
    #[clap(long)]
    pub azure: Option<String>,

    /// "aws_access_key_id=.. aws_secret_access_key=.. [aws_region=..] [aws_endpoint_url=..]"
    #[clap(long)]
    pub aws: Option<String>,

    /// "google_application_credentials=<file> [google_region=..]"
    #[clap(long)]
    pub gcp: Option<String>,

    /// Status report recipient
    #[clap(long)]
    pub email: Option<String>,

    /// SMTP relay used for the status report
    #[clap(long)]
    pub smtp: Option<String>,

    /// "telegram_token=.. telegram_chat_id=.."
    #[clap(long)]
    pub telegram: Option<String>,

    /// Path to the mongodump executable
    #[clap(long)]
    pub mongodump: Option<PathBuf>,

    /// Fail a provider instead of creating a missing bucket
    #[clap(long)]
    pub no_create_bucket: bool,

    /// Debug logging
    #[clap(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// The settings layer contributed by command-line flags.
    pub fn to_settings(&self) -> Result<RawSettings> {
        let mut settings = RawSettings {
            mongo_uri: self.uri.clone(),
            mongo_output_folder: self.out.clone(),
            mongo_dump_bucket: self.bucket.clone(),
            mongodump_path: self
                .mongodump
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            create_bucket: self.no_create_bucket.then_some(false),
            email: self.email.clone(),
            smtp_relay: self.smtp.clone(),
            azure_storage_connection_string: self.azure.clone(),
            ..Default::default()
        };

        for (flag, value) in [("--aws", &self.aws), ("--gcp", &self.gcp), ("--telegram", &self.telegram)] {
            if let Some(value) = value {
                settings
                    .apply_key_values(value)
                    .with_context(|| format!("Invalid value for {}", flag))?;
            }
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "mongodumptool",
            "-u",
            "mongodb://db:27017",
            "-o",
            "backup",
            "--bucket",
            "nightly",
            "--no-create-bucket",
            "-v",
        ])?;
        assert!(cli.verbose);

        let settings = cli.to_settings()?;
        assert_eq!(settings.mongo_uri.as_deref(), Some("mongodb://db:27017"));
        assert_eq!(settings.mongo_output_folder.as_deref(), Some("backup"));
        assert_eq!(settings.mongo_dump_bucket.as_deref(), Some("nightly"));
        assert_eq!(settings.create_bucket, Some(false));
        Ok(())
    }

    #[test]
    fn test_key_value_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "mongodumptool",
            "--aws",
            "aws_access_key_id=AKIA aws_secret_access_key=secret aws_region=eu-west-1",
            "--telegram",
            "telegram_token=123:abc telegram_chat_id=42",
        ])?;
        let settings = cli.to_settings()?;
        assert_eq!(settings.aws_access_key_id.as_deref(), Some("AKIA"));
        assert_eq!(settings.aws_secret_access_key.as_deref(), Some("secret"));
        assert_eq!(settings.aws_region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.telegram_chat_id.as_deref(), Some("42"));
        assert_eq!(settings.create_bucket, None);
        Ok(())
    }

    #[test]
    fn test_malformed_key_values_are_rejected() -> Result<()> {
        let cli = Cli::try_parse_from(["mongodumptool", "--gcp", "google_region"])?;
        assert!(cli.to_settings().is_err());

        let cli = Cli::try_parse_from(["mongodumptool", "--aws", "region=us-east-1"])?;
        assert!(cli.to_settings().is_err());
        Ok(())
    }
}
