//! Configuration module for the line-echo server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// How the echo handler treats the lines it has already sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EchoMode {
    /// Echo each line and keep nothing.
    #[default]
    Plain,
    /// Echo each line and also append it to a per-connection transcript.
    Accumulate,
}

/// Framing used to split the inbound byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FramingType {
    /// `\n`-terminated lines.
    #[default]
    Line,
    /// `<length>\r\n<data>` frames.
    Length,
}

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "line-echo")]
#[command(author = "line-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A line-oriented TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:7007)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Longest line (or frame) accepted before the connection is closed
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Echo mode
    #[arg(long, value_enum)]
    pub mode: Option<EchoMode>,

    /// Inbound framing
    #[arg(long, value_enum)]
    pub framing: Option<FramingType>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub echo: EchoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
        }
    }
}

/// Echo handler configuration
#[derive(Debug, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub mode: EchoMode,
    #[serde(default)]
    pub framing: FramingType,
    /// Longest line accepted, in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            mode: EchoMode::default(),
            framing: FramingType::default(),
            max_line_length: default_max_line_length(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:7007".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_max_line_length() -> usize {
    64 * 1024 // 64 KiB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_connections: usize,
    pub max_line_length: usize,
    pub mode: EchoMode,
    pub framing: FramingType,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            max_line_length: cli
                .max_line_length
                .unwrap_or(toml_config.echo.max_line_length),
            mode: cli.mode.unwrap_or(toml_config.echo.mode),
            framing: cli.framing.unwrap_or(toml_config.echo.framing),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "127.0.0.1:7007");
        assert_eq!(config.server.max_connections, 1024);
        assert_eq!(config.echo.max_line_length, 64 * 1024);
        assert_eq!(config.echo.mode, EchoMode::Plain);
        assert_eq!(config.echo.framing, FramingType::Line);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "0.0.0.0:7007"
            max_connections = 16

            [echo]
            mode = "accumulate"
            framing = "length"
            max_line_length = 512

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:7007");
        assert_eq!(config.server.max_connections, 16);
        assert_eq!(config.echo.mode, EchoMode::Accumulate);
        assert_eq!(config.echo.framing, FramingType::Length);
        assert_eq!(config.echo.max_line_length, 512);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from([
            "line-echo",
            "--listen",
            "127.0.0.1:9000",
            "--mode",
            "accumulate",
            "--log-level",
            "trace",
        ]);
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "0.0.0.0:7007"
            max_connections = 8

            [echo]
            mode = "plain"

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.mode, EchoMode::Accumulate);
        assert_eq!(config.framing, FramingType::Line);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_default_log_level_defers_to_toml() {
        let cli = CliArgs::parse_from(["line-echo"]);
        let toml_config: TomlConfig = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.listen, "127.0.0.1:7007");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs::parse_from(["line-echo", "--config", "/nonexistent/line-echo.toml"]);
        match Config::from_cli(cli) {
            Err(ConfigError::FileRead(path, _)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/line-echo.toml"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
