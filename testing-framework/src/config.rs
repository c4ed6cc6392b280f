use std::{fs::File, io::Write, path::Path, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use acceptance_common::{
    config::{Network, DEFAULT_MESSAGE_WAIT, DEFAULT_NETWORK, DEFAULT_STEP_TIMEOUT, VERSION},
    logger::LogLevel,
};

use crate::{scenarios::RunnerOptions, world::WorldSettings};

// Functions Helpers
fn default_features_dir() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/features").to_owned()
}

fn default_fixtures() -> String {
    "accounts.json".to_owned()
}

fn default_step_timeout() -> u64 {
    DEFAULT_STEP_TIMEOUT.as_secs()
}

fn default_message_wait() -> u64 {
    DEFAULT_MESSAGE_WAIT.as_secs()
}

#[derive(Parser, Debug, Serialize, Deserialize, Clone)]
#[clap(
    version = VERSION,
    about = "Run the Hedera acceptance scenarios against a public network"
)]
#[command(styles = acceptance_common::get_cli_styles())]
pub struct RunnerConfig {
    /// Network the scenarios run against
    #[clap(long, value_enum, default_value_t = DEFAULT_NETWORK)]
    #[serde(default)]
    pub network: Network,
    /// Directory holding the `.feature` files
    #[clap(long, default_value_t = default_features_dir())]
    #[serde(default = "default_features_dir")]
    pub features_dir: String,
    /// JSON file listing the pre-funded accounts, indexed by position
    #[clap(long, default_value_t = default_fixtures())]
    #[serde(default = "default_fixtures")]
    pub fixtures: String,
    /// Maximum duration of a single step, in seconds
    #[clap(long, default_value_t = default_step_timeout())]
    #[serde(default = "default_step_timeout")]
    pub step_timeout: u64,
    /// How long to wait for the first topic message, in seconds
    #[clap(long, default_value_t = default_message_wait())]
    #[serde(default = "default_message_wait")]
    pub message_wait: u64,
    /// Only run scenarios carrying this tag (repeatable)
    #[clap(long = "tag")]
    #[serde(default)]
    pub tags: Vec<String>,
    /// Only run scenarios whose name contains this text
    #[clap(long)]
    #[serde(default)]
    pub name: Option<String>,
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
}

impl RunnerConfig {
    /// Load a configuration previously written as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Error while opening config file {}", path.display()))?;
        let config = serde_json::from_reader(file)
            .with_context(|| format!("Error while reading config file {}", path.display()))?;
        Ok(config)
    }

    /// Write this configuration as a JSON template, refusing to overwrite
    pub fn write_template(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        let mut file = File::create(path).context("Error while creating config file")?;
        let json = serde_json::to_string_pretty(self).context("Error while serializing config file")?;
        file.write_all(json.as_bytes())
            .context("Error while writing config file")?;
        Ok(())
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            step_timeout: Duration::from_secs(self.step_timeout),
            tags: self.tags.clone(),
            name_filter: self.name.clone(),
        }
    }

    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            message_wait: Duration::from_secs(self.message_wait),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = RunnerConfig::parse_from(["acceptance-runner"]);
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.step_timeout, 120);
        assert_eq!(config.runner_options().step_timeout, Duration::from_secs(120));
        assert_eq!(config.world_settings().message_wait, Duration::from_secs(60));
        assert!(config.features_dir.ends_with("features"));
    }

    #[test]
    fn test_cli_filters() {
        let config = RunnerConfig::parse_from([
            "acceptance-runner",
            "--network",
            "previewnet",
            "--tag",
            "@token",
            "--tag",
            "topic",
            "--name",
            "multi party",
            "--log-level",
            "debug",
        ]);
        assert_eq!(config.network, Network::Previewnet);
        assert_eq!(config.log_level, LogLevel::Debug);

        let options = config.runner_options();
        assert_eq!(options.tags, vec!["@token", "topic"]);
        assert_eq!(options.name_filter.as_deref(), Some("multi party"));
    }

    #[test]
    fn test_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");

        let mut config = RunnerConfig::parse_from(["acceptance-runner", "--fixtures", "/tmp/accounts.json"]);
        config.config_file = Some(path.display().to_string());
        config.write_template(&path).unwrap();
        assert!(config.write_template(&path).is_err());

        let loaded = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.fixtures, "/tmp/accounts.json");
        // Never persisted
        assert_eq!(loaded.config_file, None);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        std::fs::write(&path, r#"{"network": "mainnet", "fixtures": "prod.json"}"#).unwrap();

        let loaded = RunnerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.network, Network::Mainnet);
        assert_eq!(loaded.step_timeout, 120);
        assert_eq!(loaded.log_level, LogLevel::Info);
        assert!(loaded.tags.is_empty());
    }
}
