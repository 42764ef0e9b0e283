//! Layered configuration: TOML file, then `CWTAIL__*` environment overrides.

// Local crates
use crate::retriever::options::{
    DEFAULT_NUM_RECORDS, DEFAULT_POLL_INTERVAL, DEFAULT_STREAM_FAN_OUT, GroupListingOptions,
    RetrievalOptions,
};

// External crates
use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "cwtail.toml";
/// Prefix of environment overrides, e.g. `CWTAIL__RETRIEVAL__NUM_RECORDS=50`.
pub const ENV_PREFIX: &str = "CWTAIL";

/// Effective cwtail configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// `[aws]`
    pub aws: AwsConfig,
    /// `[retrieval]`
    pub retrieval: RetrievalConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

impl Config {
    /// Load the configuration: file (explicit path, or `cwtail.toml` if
    /// present), then `CWTAIL__*` environment overrides.
    #[instrument(
        name = "config_loader",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                tracing::trace!(
                    configuration_file_path = %path.display(),
                    "Loading cwtail configuration file"
                );
                File::from(path).format(FileFormat::Toml).required(true)
            }
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match path {
                Some(path) => format!("Failed to read config file at {:?}", path),
                None => "Failed to assemble configuration".to_owned(),
            })?
            .try_deserialize::<Config>()
            .context("Failed to parse cwtail configuration")?;

        tracing::trace!("cwtail configuration loaded successfully");
        Ok(config)
    }

    /// Parse configuration from TOML text, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to parse TOML configuration")?
            .try_deserialize()
            .context("Failed to parse cwtail configuration")
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

/// Credentials and endpoint selection; `None` defers to the AWS default chain.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AwsConfig {
    /// Named profile from the shared AWS config files.
    pub profile: Option<String>,
    /// Region override.
    pub region: Option<String>,
}

/// Defaults for `tail` and `list`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Soft cap on records read per poll.
    pub num_records: usize,
    /// Delay between follow-mode polls.
    pub poll_interval_ms: u64,
    /// Most recently written streams considered per poll.
    pub stream_fan_out: usize,
    /// Page bound for `list`; unbounded when absent.
    pub max_group_pages: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_records: DEFAULT_NUM_RECORDS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            stream_fan_out: DEFAULT_STREAM_FAN_OUT,
            max_group_pages: None,
        }
    }
}

impl RetrievalConfig {
    /// Retrieval options for a tail run; validation is left to the engine.
    pub fn retrieval_options(&self, follow: bool) -> RetrievalOptions {
        RetrievalOptions {
            num_records: self.num_records,
            follow,
            poll_interval: Some(Duration::from_millis(self.poll_interval_ms)),
            stream_fan_out: self.stream_fan_out,
        }
    }

    /// Options for a `list` run.
    pub fn group_listing_options(&self) -> GroupListingOptions {
        GroupListingOptions {
            max_pages: self.max_group_pages,
        }
    }
}

/// Diagnostics output. Records always go to stdout, diagnostics never do.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human readable logs.
    pub json: bool,
    /// Also write daily rolling log files into this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.retrieval.num_records, 30);
        assert_eq!(cfg.retrieval.poll_interval_ms, 5000);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [aws]
            profile = "staging"
            region = "eu-west-1"

            [retrieval]
            num_records = 100
            poll_interval_ms = 1500
            max_group_pages = 3

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.aws.profile.as_deref(), Some("staging"));
        assert_eq!(cfg.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(cfg.retrieval.stream_fan_out, 10);
        assert!(cfg.logging.json);

        let options = cfg.retrieval.retrieval_options(true);
        assert_eq!(options.num_records, 100);
        assert!(options.follow);
        assert_eq!(options.poll_interval, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.retrieval.group_listing_options().max_pages, Some(3));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/cwtail.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/cwtail.toml"));
    }

    #[test]
    fn renders_back_to_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[retrieval]"));
        assert!(rendered.contains("num_records = 30"));
    }
}
