// mongodumptool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_OUTPUT_FOLDER: &str = "dump";
pub const DEFAULT_BUCKET: &str = "mongodump";
pub const DEFAULT_AWS_REGION: &str = "us-west-2";
pub const DEFAULT_GCP_REGION: &str = "us";
pub const DEFAULT_SMTP_RELAY: &str = "localhost";

/// Flat, unvalidated settings as they come out of the environment, a JSON
/// config file or the command line. Every field is optional; empty strings
/// are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub mongo_uri: Option<String>,
    pub mongo_output_folder: Option<String>,
    pub mongo_dump_bucket: Option<String>,
    pub mongodump_path: Option<String>,
    pub create_bucket: Option<bool>,
    pub email: Option<String>,
    pub smtp_relay: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub azure_storage_connection_string: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub google_application_credentials: Option<String>,
    pub google_region: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an environment-like lookup keyed by the
    /// upper-case variable names (`MONGO_URI`, `AWS_REGION`, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        RawSettings {
            mongo_uri: get("MONGO_URI"),
            mongo_output_folder: get("MONGO_OUTPUT_FOLDER"),
            mongo_dump_bucket: get("MONGO_DUMP_BUCKET"),
            mongodump_path: get("MONGODUMP_PATH"),
            create_bucket: None,
            email: get("EMAIL"),
            smtp_relay: get("SMTP_RELAY"),
            telegram_token: get("TELEGRAM_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            azure_storage_connection_string: get("AZURE_STORAGE_CONNECTION_STRING"),
            aws_access_key_id: get("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            aws_region: get("AWS_REGION"),
            aws_endpoint_url: get("AWS_ENDPOINT_URL"),
            google_application_credentials: get("GOOGLE_APPLICATION_CREDENTIALS"),
            google_region: get("GOOGLE_REGION"),
        }
    }

    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw: RawSettings = serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        Ok(raw.normalized())
    }

    fn normalized(self) -> Self {
        RawSettings {
            mongo_uri: non_empty(self.mongo_uri),
            mongo_output_folder: non_empty(self.mongo_output_folder),
            mongo_dump_bucket: non_empty(self.mongo_dump_bucket),
            mongodump_path: non_empty(self.mongodump_path),
            create_bucket: self.create_bucket,
            email: non_empty(self.email),
            smtp_relay: non_empty(self.smtp_relay),
            telegram_token: non_empty(self.telegram_token),
            telegram_chat_id: non_empty(self.telegram_chat_id),
            azure_storage_connection_string: non_empty(self.azure_storage_connection_string),
            aws_access_key_id: non_empty(self.aws_access_key_id),
            aws_secret_access_key: non_empty(self.aws_secret_access_key),
            aws_region: non_empty(self.aws_region),
            aws_endpoint_url: non_empty(self.aws_endpoint_url),
            google_application_credentials: non_empty(self.google_application_credentials),
            google_region: non_empty(self.google_region),
        }
    }

    /// Layers `upper` on top of `self`; any field set in `upper` wins.
    pub fn overlay(self, upper: RawSettings) -> Self {
        let upper = upper.normalized();
        RawSettings {
            mongo_uri: upper.mongo_uri.or(self.mongo_uri),
            mongo_output_folder: upper.mongo_output_folder.or(self.mongo_output_folder),
            mongo_dump_bucket: upper.mongo_dump_bucket.or(self.mongo_dump_bucket),
            mongodump_path: upper.mongodump_path.or(self.mongodump_path),
            create_bucket: upper.create_bucket.or(self.create_bucket),
            email: upper.email.or(self.email),
            smtp_relay: upper.smtp_relay.or(self.smtp_relay),
            telegram_token: upper.telegram_token.or(self.telegram_token),
            telegram_chat_id: upper.telegram_chat_id.or(self.telegram_chat_id),
            azure_storage_connection_string: upper
                .azure_storage_connection_string
                .or(self.azure_storage_connection_string),
            aws_access_key_id: upper.aws_access_key_id.or(self.aws_access_key_id),
            aws_secret_access_key: upper.aws_secret_access_key.or(self.aws_secret_access_key),
            aws_region: upper.aws_region.or(self.aws_region),
            aws_endpoint_url: upper.aws_endpoint_url.or(self.aws_endpoint_url),
            google_application_credentials: upper
                .google_application_credentials
                .or(self.google_application_credentials),
            google_region: upper.google_region.or(self.google_region),
        }
    }

    /// True when any cloud-provider field is set, region and endpoint
    /// overrides included.
    pub fn has_cloud_settings(&self) -> bool {
        self.azure_storage_connection_string.is_some()
            || self.aws_access_key_id.is_some()
            || self.aws_secret_access_key.is_some()
            || self.aws_region.is_some()
            || self.aws_endpoint_url.is_some()
            || self.google_application_credentials.is_some()
            || self.google_region.is_some()
    }

    /// Drops every cloud-provider field so that only an upper layer decides
    /// which providers take part in the run.
    pub fn clear_cloud(&mut self) {
        self.azure_storage_connection_string = None;
        self.aws_access_key_id = None;
        self.aws_secret_access_key = None;
        self.aws_region = None;
        self.aws_endpoint_url = None;
        self.google_application_credentials = None;
        self.google_region = None;
    }

    /// Applies a space separated `key=value` list such as
    /// `aws_access_key_id=AKIA.. aws_secret_access_key=.. aws_region=eu-west-1`.
    pub fn apply_key_values(&mut self, argument: &str) -> Result<()> {
        for (key, value) in parse_key_values(argument)? {
            let slot = match key.as_str() {
                "aws_access_key_id" => &mut self.aws_access_key_id,
                "aws_secret_access_key" => &mut self.aws_secret_access_key,
                "aws_region" => &mut self.aws_region,
                "aws_endpoint_url" => &mut self.aws_endpoint_url,
                "google_application_credentials" => &mut self.google_application_credentials,
                "google_region" => &mut self.google_region,
                "telegram_token" => &mut self.telegram_token,
                "telegram_chat_id" => &mut self.telegram_chat_id,
                other => anyhow::bail!("Unknown option \"{}\" in \"{}\"", other, argument),
            };
            *slot = non_empty(Some(value));
        }
        Ok(())
    }
}

/// Splits `k1=v1 k2=v2` into lower-cased keys and raw values.
pub fn parse_key_values(argument: &str) -> Result<Vec<(String, String)>> {
    argument
        .split_whitespace()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected key=value, got \"{}\"", pair))?;
            if key.is_empty() {
                anyhow::bail!("Empty key in \"{}\"", pair);
            }
            Ok((key.to_lowercase(), value.to_string()))
        })
        .collect()
}

// Application's internal configuration structs
#[derive(Clone)]
pub struct AzureConfig {
    pub connection_string: String,
}

#[derive(Clone)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint_url: Option<String>,
}

#[derive(Clone)]
pub struct GcpConfig {
    pub credentials_path: PathBuf,
    pub region: String,
}

#[derive(Clone, Default)]
pub struct StorageConfig {
    pub azure: Option<AzureConfig>,
    pub aws: Option<AwsConfig>,
    pub gcp: Option<GcpConfig>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub to: String,
    pub smtp_relay: String,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

#[derive(Clone, Default)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
    pub telegram: Option<TelegramConfig>,
}

/// Immutable run configuration, built once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub output_folder: PathBuf,
    pub bucket: String,
    pub create_buckets: bool,
    pub mongodump_path: Option<PathBuf>,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Validates raw settings. Relative output folders are resolved against
    /// `base_dir`.
    pub fn from_settings(raw: RawSettings, base_dir: &Path) -> Result<Self> {
        let raw = raw.normalized();
        let mongo_uri = raw
            .mongo_uri
            .context("No MongoDB connection URI provided (MONGO_URI or --uri). Nothing to do")?;

        let output_folder = PathBuf::from(
            raw.mongo_output_folder
                .unwrap_or_else(|| DEFAULT_OUTPUT_FOLDER.to_string()),
        );
        let output_folder = if output_folder.is_absolute() {
            output_folder
        } else {
            base_dir.join(output_folder)
        };
        if output_folder.file_name().is_none() {
            anyhow::bail!(
                "Output folder {} must name a directory",
                output_folder.display()
            );
        }

        let azure = raw
            .azure_storage_connection_string
            .map(|connection_string| AzureConfig { connection_string });

        let aws = match (raw.aws_access_key_id, raw.aws_secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsConfig {
                access_key_id,
                secret_access_key,
                region: raw
                    .aws_region
                    .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
                endpoint_url: raw.aws_endpoint_url,
            }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("AWS credentials are incomplete (need both access key id and secret). AWS is disabled.");
                None
            }
            (None, None) => None,
        };

        let gcp = match raw.google_application_credentials.map(PathBuf::from) {
            Some(path) if path.is_file() => Some(GcpConfig {
                credentials_path: path,
                region: raw
                    .google_region
                    .unwrap_or_else(|| DEFAULT_GCP_REGION.to_string()),
            }),
            Some(path) => {
                warn!(
                    "GCP credentials file {} does not exist. GCP is disabled.",
                    path.display()
                );
                None
            }
            None => None,
        };

        let email = raw.email.map(|to| EmailConfig {
            to,
            smtp_relay: raw
                .smtp_relay
                .unwrap_or_else(|| DEFAULT_SMTP_RELAY.to_string()),
        });
        let telegram = match (raw.telegram_token, raw.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { token, chat_id }),
            _ => None,
        };

        Ok(AppConfig {
            mongo_uri,
            output_folder,
            bucket: raw
                .mongo_dump_bucket
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            create_buckets: raw.create_bucket.unwrap_or(true),
            mongodump_path: raw.mongodump_path.map(PathBuf::from),
            storage: StorageConfig { azure, aws, gcp },
            notifications: NotificationConfig { email, telegram },
        })
    }

    /// Logs the resolved configuration with credentials masked.
    pub fn log_summary(&self) {
        debug!("MongoDB URI set to \"{}\"", mask_uri(&self.mongo_uri));
        debug!("Output folder set to \"{}\"", self.output_folder.display());
        debug!("Bucket set to \"{}\" (create if missing: {})", self.bucket, self.create_buckets);
        debug!(
            "Providers configured: azure={}, aws={}, gcp={}",
            self.storage.azure.is_some(),
            self.storage.aws.is_some(),
            self.storage.gcp.is_some()
        );
        if let Some(aws) = &self.storage.aws {
            debug!("AWS region set to \"{}\"", aws.region);
        }
        if let Some(gcp) = &self.storage.gcp {
            debug!("GCP region set to \"{}\"", gcp.region);
        }
        debug!(
            "Notifications configured: email={:?}, telegram={}",
            self.notifications.email.as_ref().map(|e| e.to.as_str()),
            self.notifications.telegram.is_some()
        );
    }
}

/// Replaces the password of `user:password@` with `***`.
pub fn mask_uri(uri: &str) -> String {
    let (scheme, rest) = match uri.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, uri),
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let masked = match authority.rsplit_once('@') {
        Some((creds, hosts)) => match creds.split_once(':') {
            Some((user, _)) => format!("{}:***@{}", user, hosts),
            None => authority.to_string(),
        },
        None => authority.to_string(),
    };
    match scheme {
        Some(scheme) => format!("{}://{}{}", scheme, masked, tail),
        None => format!("{}{}", masked, tail),
    }
}

/// Stacks the three configuration layers. Any cloud flag, even a lone
/// region, masks every cloud setting of the lower layers.
fn layer_settings(env: RawSettings, file: Option<RawSettings>, flags: RawSettings) -> RawSettings {
    let mut settings = match file {
        Some(file) => env.overlay(file),
        None => env,
    };
    let flags = flags.normalized();
    if flags.has_cloud_settings() {
        debug!("Cloud settings passed as flags, ignoring other cloud settings");
        settings.clear_cloud();
    }
    settings.overlay(flags)
}

/// Resolves the final configuration: environment (optionally seeded from an
/// env file), then a JSON config file, then command-line flags. Cloud
/// credentials given as flags mask any lower-layer cloud credentials.
pub fn load(
    env_file: Option<&Path>,
    config_file: Option<&Path>,
    flags: RawSettings,
) -> Result<AppConfig> {
    if let Some(env_file) = env_file {
        if !env_file.is_file() {
            anyhow::bail!("Provided env file \"{}\" does not exist", env_file.display());
        }
        dotenv::from_path(env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
        debug!("Loaded environment from {}", env_file.display());
    }

    let file = match config_file {
        Some(config_file) => Some(RawSettings::load_from_json(config_file)?),
        None => None,
    };
    let settings = layer_settings(RawSettings::from_env(), file, flags);

    let cwd = env::current_dir().context("Failed to determine current directory")?;
    AppConfig::from_settings(settings, &cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_uri_is_fatal() {
        let raw = RawSettings::from_lookup(lookup_from(&[("MONGO_OUTPUT_FOLDER", "out")]));
        let result = AppConfig::from_settings(raw, Path::new("/tmp"));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_applied() -> anyhow::Result<()> {
        let raw = RawSettings::from_lookup(lookup_from(&[("MONGO_URI", "mongodb://localhost")]));
        let config = AppConfig::from_settings(raw, Path::new("/srv/backups"))?;

        assert_eq!(config.output_folder, PathBuf::from("/srv/backups/dump"));
        assert_eq!(config.bucket, "mongodump");
        assert!(config.create_buckets);
        assert!(config.storage.azure.is_none());
        assert!(config.storage.aws.is_none());
        assert!(config.storage.gcp.is_none());
        assert!(config.notifications.email.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_strings_count_as_unset() -> anyhow::Result<()> {
        let raw = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("MONGO_DUMP_BUCKET", ""),
            ("AZURE_STORAGE_CONNECTION_STRING", "  "),
        ]));
        let config = AppConfig::from_settings(raw, Path::new("/tmp"))?;
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert!(config.storage.azure.is_none());
        Ok(())
    }

    #[test]
    fn test_aws_requires_key_pair_and_defaults_region() -> anyhow::Result<()> {
        let partial = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
        ]));
        assert!(AppConfig::from_settings(partial, Path::new("/tmp"))?.storage.aws.is_none());

        let full = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]));
        let config = AppConfig::from_settings(full, Path::new("/tmp"))?;
        let aws = config.storage.aws.expect("aws configured");
        assert_eq!(aws.region, DEFAULT_AWS_REGION);
        Ok(())
    }

    #[test]
    fn test_gcp_requires_existing_credentials_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let creds = dir.path().join("sa.json");
        fs::write(&creds, "{}")?;

        let missing = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/nonexistent/sa.json"),
        ]));
        assert!(AppConfig::from_settings(missing, dir.path())?.storage.gcp.is_none());

        let present = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("GOOGLE_APPLICATION_CREDENTIALS", creds.to_str().unwrap()),
            ("GOOGLE_REGION", "europe-west1"),
        ]));
        let gcp = AppConfig::from_settings(present, dir.path())?.storage.gcp.expect("gcp configured");
        assert_eq!(gcp.credentials_path, creds);
        assert_eq!(gcp.region, "europe-west1");
        Ok(())
    }

    #[test]
    fn test_overlay_prefers_upper_layer() {
        let lower = RawSettings {
            mongo_uri: Some("mongodb://env".to_string()),
            mongo_dump_bucket: Some("env-bucket".to_string()),
            ..Default::default()
        };
        let upper = RawSettings {
            mongo_uri: Some("mongodb://flag".to_string()),
            mongo_dump_bucket: Some(String::new()),
            ..Default::default()
        };
        let merged = lower.overlay(upper);
        assert_eq!(merged.mongo_uri.as_deref(), Some("mongodb://flag"));
        assert_eq!(merged.mongo_dump_bucket.as_deref(), Some("env-bucket"));
    }

    #[test]
    fn test_region_only_flag_masks_lower_cloud_layers() -> anyhow::Result<()> {
        let env = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("AWS_ACCESS_KEY_ID", "ENVKEY"),
            ("AWS_SECRET_ACCESS_KEY", "ENVSECRET"),
            ("AZURE_STORAGE_CONNECTION_STRING", "AccountName=envaccount;AccountKey=a2V5"),
        ]));
        let mut flags = RawSettings::default();
        flags.apply_key_values("aws_region=eu-west-1")?;

        let settings = layer_settings(env, None, flags);
        assert_eq!(settings.aws_region.as_deref(), Some("eu-west-1"));
        assert!(settings.aws_access_key_id.is_none());
        assert!(settings.azure_storage_connection_string.is_none());
        let config = AppConfig::from_settings(settings, Path::new("/tmp"))?;
        assert!(config.storage.aws.is_none());
        assert!(config.storage.azure.is_none());
        Ok(())
    }

    #[test]
    fn test_non_cloud_flags_keep_lower_cloud_layers() -> anyhow::Result<()> {
        let env = RawSettings::from_lookup(lookup_from(&[
            ("MONGO_URI", "mongodb://localhost"),
            ("AWS_ACCESS_KEY_ID", "ENVKEY"),
            ("AWS_SECRET_ACCESS_KEY", "ENVSECRET"),
        ]));
        let file = RawSettings {
            google_region: Some("europe-west1".to_string()),
            ..Default::default()
        };
        let mut flags = RawSettings::default();
        flags.apply_key_values("telegram_token=t telegram_chat_id=1")?;

        let settings = layer_settings(env, Some(file), flags);
        assert_eq!(settings.aws_access_key_id.as_deref(), Some("ENVKEY"));
        assert_eq!(settings.google_region.as_deref(), Some("europe-west1"));
        assert_eq!(settings.telegram_token.as_deref(), Some("t"));
        Ok(())
    }

    #[test]
    fn test_key_values_applied() -> anyhow::Result<()> {
        let mut raw = RawSettings::default();
        raw.apply_key_values("AWS_ACCESS_KEY_ID=abc aws_secret_access_key=def aws_region=eu-central-1")?;
        assert_eq!(raw.aws_access_key_id.as_deref(), Some("abc"));
        assert_eq!(raw.aws_secret_access_key.as_deref(), Some("def"));
        assert_eq!(raw.aws_region.as_deref(), Some("eu-central-1"));

        assert!(raw.apply_key_values("aws_region").is_err());
        assert!(raw.apply_key_values("bogus=1").is_err());
        Ok(())
    }

    #[test]
    fn test_load_from_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"mongo_uri": "mongodb://db:27017", "mongo_dump_bucket": "nightly", "create_bucket": false, "email": ""}"#,
        )?;
        let raw = RawSettings::load_from_json(&path)?;
        assert_eq!(raw.mongo_uri.as_deref(), Some("mongodb://db:27017"));
        assert_eq!(raw.mongo_dump_bucket.as_deref(), Some("nightly"));
        assert_eq!(raw.create_bucket, Some(false));
        assert_eq!(raw.email, None);
        Ok(())
    }

    #[test]
    fn test_mask_uri_hides_password() {
        assert_eq!(
            mask_uri("mongodb://admin:s3cret@h1:27017,h2/?replicaSet=rs0"),
            "mongodb://admin:***@h1:27017,h2/?replicaSet=rs0"
        );
        assert_eq!(mask_uri("mongodb://localhost"), "mongodb://localhost");
    }
}
