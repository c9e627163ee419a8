//! Application configuration loading and validation.
//!
//! The top-level [`Config`] aggregates logging, button mapping, probe
//! listener and broker transport settings. It is resolved once at startup
//! and treated as immutable afterwards; there is no dynamic reconfiguration.
//!
//! On first run the packaged sample configuration is copied to the resolved
//! path, so a fresh install starts from a file the operator can edit rather
//! than an error.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::config::{buttons::ButtonsConfig, listener::ListenerConfig, logger::LoggerConfig};

pub mod buttons;
pub mod listener;
pub mod logger;

/// Packaged sample configuration, written on first run.
const SAMPLE_CONFIG: &str = include_str!("../../config.sample.toml");

/// Timestamped println macros for the window before the tracing subscriber
/// exists (configuration loading itself).
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors raised while resolving, reading or validating configuration.
/// All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Broker transport settings, owned by the transport crate.
pub type TransportConfig = pressbee_mqtt::Config;

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Button-to-topic mapping and revert timing.
    #[validate(nested)]
    pub buttons: ButtonsConfig,

    /// Probe listener settings.
    #[validate(nested)]
    pub listener: ListenerConfig,

    /// Broker transport settings.
    #[validate(nested)]
    pub transport: TransportConfig,
}

impl Config {
    /// Locates, materializes if absent, loads and validates the config file.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();
        Self::ensure_exists(&config_path)?;
        Self::load(&config_path)
    }

    /// Configuration file path: the `PRESSBEE_CONFIG` environment variable
    /// if set, otherwise `/etc/pressbee/config.toml`.
    fn get_config_path() -> PathBuf {
        if let Ok(config_path) = std::env::var("PRESSBEE_CONFIG") {
            let path = PathBuf::from(config_path);
            print_info!("Using config from PRESSBEE_CONFIG: {}", path.display());
            return path;
        }

        let fallback = Path::new("/etc/pressbee/config.toml");
        print_info!("Using default config path: {}", fallback.display());
        fallback.to_path_buf()
    }

    /// Writes the packaged sample configuration if no file exists yet.
    fn ensure_exists(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }

        print_warn!(
            "No configuration at {}, creating one from the packaged sample",
            path.display()
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, SAMPLE_CONFIG)?;
        Ok(())
    }

    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("sample must parse");
        config.validate().expect("sample must validate");
        assert!(!config.buttons.mapping.is_empty());
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Config(_))
        ));
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "buttons = 12").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                [buttons]
                revert_delay = 0
            "#,
        )
        .unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn ensure_exists_materializes_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh/config.toml");

        Config::ensure_exists(&path).unwrap();
        assert!(path.exists());

        // The materialized file must itself load cleanly.
        let config = Config::load(&path).unwrap();
        assert_eq!(config.buttons.revert_delay, 10);
    }

    #[test]
    fn round_trips_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                [logger]
                level = "debug"

                [buttons]
                revert_delay = 5

                [[buttons.mapping]]
                address = "ac:63:be:2a:11:b0"
                topic = "home/button/hall"

                [listener]
                bind = "0.0.0.0:6767"

                [transport]
                host = "broker.lan"
                base_topic = "pressbee"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logger.level, "debug");
        assert_eq!(config.buttons.revert_delay, 5);
        assert_eq!(
            config.buttons.topic_for("AC:63:BE:2A:11:B0"),
            Some("home/button/hall")
        );
        assert_eq!(config.listener.bind, "0.0.0.0:6767");
        assert_eq!(config.transport.host, "broker.lan");
        assert_eq!(config.transport.base_topic, "pressbee");
    }
}
