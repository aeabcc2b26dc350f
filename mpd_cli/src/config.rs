use crate::paths;
use crate::terminal;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use mpd_client_core::protocol::UPDATE_INFO_INTERVAL_MS;
use mpd_client_core::{ClientConfig, MIN_BINARY_LIMIT, parse_ipv4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable prefix; `__` separates nested keys
const ENV_PREFIX: &str = "MPDINFO_";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// File whose first line is the MPD password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,

    #[serde(default)]
    pub connection: ClientConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_title: bool,
    pub show_artist: bool,
    pub show_album: bool,
    pub show_filename: bool,
    /// Progress bar with elapsed and total time
    pub show_progress: bool,
    /// Print mime type and size of fetched art
    pub show_art_info: bool,
    pub color: bool,
    /// Interval between forced status refreshes while watching
    pub update_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_title: true,
            show_artist: true,
            show_album: true,
            show_filename: true,
            show_progress: true,
            show_art_info: true,
            color: true,
            update_interval_ms: UPDATE_INFO_INTERVAL_MS,
        }
    }
}

/// Verbosity accepted by `--log-level` and the `log_level` key
#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    #[default]
    Warning,
    Debug,
    Verbose,
}

impl LogLevel {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            Self::Silent => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warning => log::LevelFilter::Warn,
            Self::Debug => log::LevelFilter::Debug,
            Self::Verbose => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "debug" => Ok(Self::Debug),
            "verbose" | "trace" => Ok(Self::Verbose),
            _ => anyhow::bail!(
                "Unknown log level '{s}' (expected silent, error, warning, debug or verbose)"
            ),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Debug => "debug",
            Self::Verbose => "verbose",
        };
        f.write_str(name)
    }
}

/// Command line values that take precedence over every config layer
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<LogLevel>,
    pub password_file: Option<PathBuf>,
    pub no_color: bool,
    pub no_title: bool,
    pub no_artist: bool,
    pub no_album: bool,
    pub no_filename: bool,
    pub no_progress: bool,
}

impl AppConfig {
    /// Apply CLI argument overrides to the configuration
    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(host) = &overrides.host {
            self.connection.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.connection.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(path) = &overrides.password_file {
            self.password_file = Some(path.clone());
        }
        if overrides.no_color {
            self.display.color = false;
        }

        let display = &mut self.display;
        for (hide, shown) in [
            (overrides.no_title, &mut display.show_title),
            (overrides.no_artist, &mut display.show_artist),
            (overrides.no_album, &mut display.show_album),
            (overrides.no_filename, &mut display.show_filename),
            (overrides.no_progress, &mut display.show_progress),
        ] {
            if hide {
                *shown = false;
            }
        }
    }
}

/// Configuration manager that handles platform paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with the default platform path
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Integer(i) => Ok(i.to_string()),
            toml::Value::Float(f) => Ok(f.to_string()),
            toml::Value::Boolean(b) => Ok(b.to_string()),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        }
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.validate_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, sections)) = parts.split_last() else {
            anyhow::bail!("Empty key");
        };

        let mut current = &mut config;
        for part in sections {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            if !table.contains_key(*part) {
                table.insert(part.to_string(), toml::Value::Table(toml::map::Map::new()));
            }
            current = table
                .get_mut(*part)
                .ok_or_else(|| anyhow::anyhow!("Invalid key path: {}", key))?;
        }

        let toml::Value::Table(table) = current else {
            anyhow::bail!("Cannot set value on non-table");
        };
        table.insert(last.to_string(), self.parse_config_value(key, value)?);

        self.write(&config)
    }

    /// List all configuration values
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        let value: toml::Value = toml::from_str(&toml_string)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    /// Write a complete config file. Refuses to overwrite unless `force`.
    pub fn init(&self, config: &AppConfig, force: bool) -> Result<()> {
        if self.config_path.exists() && !force {
            anyhow::bail!(
                "Config file already exists at {} (use --force to overwrite)",
                self.config_path.display()
            );
        }
        self.write(config)
    }

    fn write<T: Serialize>(&self, config: &T) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, toml_string)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))
    }

    /// Recursively collect all key-value pairs from TOML
    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            _ => {}
        }
    }

    /// Validate a configuration value
    fn validate_config_value(&self, key: &str, value: &str) -> Result<()> {
        match key {
            "connection.host" => {
                parse_ipv4(value)?;
            }
            "connection.port" => {
                let port: u16 = value
                    .parse()
                    .context("port must be an integer between 1 and 65535")?;
                if port == 0 {
                    anyhow::bail!("port must be an integer between 1 and 65535");
                }
            }
            "connection.binary_limit" => {
                let limit: usize = value
                    .parse()
                    .context("binary_limit must be a positive integer")?;
                if limit < MIN_BINARY_LIMIT {
                    anyhow::bail!("binary_limit must be at least {MIN_BINARY_LIMIT} bytes");
                }
            }
            k if k.ends_with("_ms") => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("{k} must be a positive integer"))?;
                if ms == 0 {
                    anyhow::bail!("{k} must be greater than 0");
                }
            }
            "log_level" => {
                value.parse::<LogLevel>()?;
            }
            k if k.starts_with("display.show_") || k == "display.color" => {
                let _: bool = value.parse().context("Value must be 'true' or 'false'")?;
            }
            _ => {} // No validation for unknown keys
        }
        Ok(())
    }

    /// Parse a value to the appropriate TOML type
    fn parse_config_value(&self, key: &str, value: &str) -> Result<toml::Value> {
        match key {
            k if k.ends_with("_ms") || k.ends_with("port") || k.ends_with("binary_limit") => {
                let num: i64 = value.parse().context("Expected integer value")?;
                Ok(toml::Value::Integer(num))
            }
            k if k.starts_with("display.") && !k.ends_with("_ms") => {
                let bool_val: bool = value
                    .parse()
                    .context("Expected boolean value (true/false)")?;
                Ok(toml::Value::Boolean(bool_val))
            }
            // Force string types for these fields
            "connection.host" | "password_file" => Ok(toml::Value::String(value.to_string())),
            "log_level" => Ok(toml::Value::String(value.parse::<LogLevel>()?.to_string())),
            _ => {
                if let Ok(b) = value.parse::<bool>() {
                    Ok(toml::Value::Boolean(b))
                } else if let Ok(i) = value.parse::<i64>() {
                    Ok(toml::Value::Integer(i))
                } else if let Ok(f) = value.parse::<f64>() {
                    Ok(toml::Value::Float(f))
                } else {
                    Ok(toml::Value::String(value.to_string()))
                }
            }
        }
    }
}

/// Setup wizard for the connection section
///
/// Prompts only when attached to a terminal; otherwise writes the defaults.
pub fn interactive_init(manager: &ConfigManager, force: bool) -> Result<()> {
    let path = manager.get_config_path();
    let interactive = terminal::is_interactive();

    let mut force = force;
    if path.exists() && !force && interactive {
        force = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()
            .context("Failed to read input")?;
        if !force {
            eprintln!("Setup cancelled.");
            return Ok(());
        }
    }

    let mut config = AppConfig::default();
    if interactive {
        eprintln!("{}", "mpdinfo setup".bold());
        eprintln!();

        config.connection.host = Input::new()
            .with_prompt("MPD host (IPv4)")
            .default(config.connection.host)
            .validate_with(|input: &String| -> Result<(), String> {
                parse_ipv4(input).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()
            .context("Failed to read host")?;

        config.connection.port = Input::new()
            .with_prompt("MPD port")
            .default(config.connection.port)
            .interact_text()
            .context("Failed to read port")?;

        let password_file: String = Input::new()
            .with_prompt("Password file (empty for none)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read password file")?;
        if !password_file.trim().is_empty() {
            config.password_file = Some(PathBuf::from(password_file.trim()));
        }
    }

    manager.init(&config, force)?;
    eprintln!("{}", "✓ Configuration saved".green());
    eprintln!("Config file: {}", path.display());
    Ok(())
}
