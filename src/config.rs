use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use toml::Value;

use crate::broadcast::{BroadcasterConfig, DispatchMode};

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FANOUT_CONFIG";

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a ConfigManager from an already parsed Configuration
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using the discovery hierarchy, or start empty
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from an explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Broadcaster settings from the `[broadcaster]` section
    pub fn get_broadcaster_config(&self) -> Result<BroadcasterConfig> {
        let mut config = BroadcasterConfig::default();

        if let Some(dispatch) = self.get_value("broadcaster", "dispatch") {
            config.dispatch = dispatch
                .parse::<DispatchMode>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid dispatch value in config")?;
        }

        if let Some(isolate_panics) = self.get_bool("broadcaster", "isolate-panics")? {
            config.isolate_panics = isolate_panics;
        }

        debug!("Broadcaster configuration: {:?}", config);
        Ok(config)
    }
}

/// Configuration file locations in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("fanout").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".fanout.toml"));
    }

    paths.push(PathBuf::from("./.fanout.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let table: toml::Table = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    flatten_toml_table(&table, "", &mut config);
    Ok(config)
}

/// Flatten nested tables into `section.subsection` names; top-level keys land in `base`
fn flatten_toml_table(table: &toml::Table, prefix: &str, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(subtable) => {
                let section_name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml_table(subtable, &section_name, config);
            }
            _ => {
                let section_name = if prefix.is_empty() { "base" } else { prefix };
                config
                    .entry(section_name.to_string())
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_toml_value_to_string_conversion() {
        assert_eq!(toml_value_to_string(&Value::String("parallel".to_string())), "parallel");
        assert_eq!(toml_value_to_string(&Value::Integer(42)), "42");
        assert_eq!(toml_value_to_string(&Value::Boolean(false)), "false");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
console-level = "warn"

[broadcaster]
dispatch = "parallel"
isolate-panics = false

[profile.ci]
console-level = "error"
"#;

        let config = parse_toml_config(toml_content).unwrap();

        assert_eq!(config["base"]["console-level"], "warn");
        assert_eq!(config["broadcaster"]["dispatch"], "parallel");
        assert_eq!(config["broadcaster"]["isolate-panics"], "false");
        assert_eq!(config["profile.ci"]["console-level"], "error");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(parse_toml_config("[broadcaster\ndispatch = ").is_err());
    }

    #[test]
    fn test_value_fallback_order() {
        let mut config = Configuration::new();
        config.insert(
            "base".to_string(),
            HashMap::from([
                ("console-level".to_string(), "info".to_string()),
                ("log-format".to_string(), "text".to_string()),
            ]),
        );
        config.insert(
            "broadcaster".to_string(),
            HashMap::from([("log-format".to_string(), "json".to_string())]),
        );
        config.insert(
            "quiet".to_string(),
            HashMap::from([("console-level".to_string(), "error".to_string())]),
        );

        let mut manager = ConfigManager::from_config(config);
        assert_eq!(manager.get_value("broadcaster", "log-format").unwrap(), "json");
        assert_eq!(manager.get_value("broadcaster", "console-level").unwrap(), "info");
        assert!(manager.get_value("broadcaster", "missing").is_none());

        manager.select_section("quiet".to_string());
        assert_eq!(manager.get_value("broadcaster", "console-level").unwrap(), "error");
    }

    #[test]
    fn test_type_conversion() {
        let mut config = Configuration::new();
        config.insert(
            "base".to_string(),
            HashMap::from([
                ("flag".to_string(), "TRUE".to_string()),
                ("bad-flag".to_string(), "maybe".to_string()),
                ("level".to_string(), "debug".to_string()),
                ("bad-level".to_string(), "loud".to_string()),
                ("log-file".to_string(), "/tmp/fanout.log".to_string()),
            ]),
        );
        let manager = ConfigManager::from_config(config);

        assert_eq!(manager.get_bool("base", "flag").unwrap(), Some(true));
        assert!(manager.get_bool("base", "bad-flag").is_err());
        assert_eq!(manager.get_bool("base", "missing").unwrap(), None);

        assert_eq!(manager.get_log_level("base", "level").unwrap(), Some(log::LevelFilter::Debug));
        assert!(manager.get_log_level("base", "bad-level").is_err());

        assert_eq!(manager.get_path("base", "log-file"), Some(PathBuf::from("/tmp/fanout.log")));
    }

    #[test]
    fn test_broadcaster_config_defaults() {
        let manager = ConfigManager::from_config(Configuration::new());
        assert_eq!(manager.get_broadcaster_config().unwrap(), BroadcasterConfig::default());
    }

    #[test]
    fn test_broadcaster_config_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            &temp_file,
            "[broadcaster]\ndispatch = \"parallel\"\nisolate-panics = false\n",
        )
        .unwrap();

        let manager = ConfigManager::load_from_file(temp_file.path().to_path_buf()).unwrap();
        let config = manager.get_broadcaster_config().unwrap();

        assert_eq!(manager.config_file_path(), Some(temp_file.path()));
        assert_eq!(config.dispatch, DispatchMode::Parallel);
        assert!(!config.isolate_panics);
    }

    #[test]
    fn test_broadcaster_config_invalid_dispatch() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "[broadcaster]\ndispatch = \"round-robin\"\n").unwrap();

        let manager = ConfigManager::load_from_file(temp_file.path().to_path_buf()).unwrap();
        assert!(manager.get_broadcaster_config().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigManager::load_from_file(PathBuf::from("/nonexistent/fanout.toml"));
        assert!(result.is_err());
    }
}
