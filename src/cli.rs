//! Command line handling for the fanout binary

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use log::{debug, LevelFilter};

use crate::broadcast::{BroadcasterConfig, DispatchMode};
use crate::config::ConfigManager;
use crate::logging::{self, LogConfig, LogDestination, LogFormat};

/// Broadcast messages to a set of in-process observers
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(about = "Broadcast messages to a set of in-process observers, in registration order")]
#[command(version)]
pub struct Args {
    /// Messages to broadcast, one notification round each
    #[arg(value_name = "MESSAGE", default_value = "hello")]
    pub messages: Vec<String>,

    /// Number of observers to register (Observer1..ObserverN)
    #[arg(short = 'n', long, value_name = "N", default_value_t = 2)]
    pub subscribers: usize,

    /// Dispatch to observers in parallel (still waits for all of them)
    #[arg(long)]
    pub parallel: bool,

    /// Print cumulative delivery statistics as JSON when done
    #[arg(long)]
    pub stats: bool,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}

/// Reject flag combinations clap cannot express
pub fn validate_args(args: &Args) -> Result<()> {
    let level_flags = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|flag| **flag)
        .count();
    if level_flags > 1 {
        return Err(anyhow::anyhow!("Only one of --verbose, --quiet and --debug may be given"));
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file"));
    }

    LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

pub fn load_configuration(args: &Args) -> Result<ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => ConfigManager::load_from_file(config_file.clone())?,
        None => ConfigManager::load()?,
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Build the logger configuration. Flags win over the config file's `[base]` values.
pub fn configure_logging(args: &Args, config: &ConfigManager) -> Result<LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config.get_log_level("base", "console-level")?.unwrap_or(LevelFilter::Info)
    };

    let format = if args.log_format != "text" {
        LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format_str) => LogFormat::from_str(format_str).map_err(|e| anyhow::anyhow!(e))?,
            None => LogFormat::Text,
        }
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));
    let file_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => config.get_log_level("base", "file-log-level")?,
    };

    let (destination, file_level) = match log_file {
        Some(path) => {
            let level = file_level.unwrap_or(console_level);
            debug!("File logging enabled: {} (level: {:?})", path.display(), level);
            (LogDestination::Both(path), Some(level))
        }
        None => (LogDestination::Console, None),
    };

    Ok(LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Broadcaster settings from the config file, with `--parallel` layered on top
pub fn configure_broadcaster(args: &Args, config: &ConfigManager) -> Result<BroadcasterConfig> {
    let broadcaster_config = config.get_broadcaster_config()?;
    if args.parallel {
        return Ok(broadcaster_config.with_dispatch(DispatchMode::Parallel));
    }
    Ok(broadcaster_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use std::collections::HashMap;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("fanout").chain(argv.iter().copied())).unwrap()
    }

    fn config(entries: &[(&str, &str, &str)]) -> ConfigManager {
        let mut config = Configuration::new();
        for (section, key, value) in entries {
            config
                .entry(section.to_string())
                .or_insert_with(HashMap::new)
                .insert(key.to_string(), value.to_string());
        }
        ConfigManager::from_config(config)
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        assert_eq!(args.messages, vec!["hello"]);
        assert_eq!(args.subscribers, 2);
        assert!(!args.parallel);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_messages_and_subscribers() {
        let args = args(&["-n", "3", "one", "two"]);
        assert_eq!(args.messages, vec!["one", "two"]);
        assert_eq!(args.subscribers, 3);
    }

    #[test]
    fn test_validation_rejects_conflicts() {
        assert!(validate_args(&args(&["--verbose", "--quiet"])).is_err());
        assert!(validate_args(&args(&["--log-file-level", "debug"])).is_err());
        assert!(validate_args(&args(&["--log-format", "xml"])).is_err());
    }

    #[test]
    fn test_logging_flags_override_config() {
        let config = config(&[("base", "console-level", "warn")]);

        let log_config = configure_logging(&args(&["--verbose"]), &config).unwrap();
        assert_eq!(log_config.console_level, LevelFilter::Debug);

        let log_config = configure_logging(&args(&[]), &config).unwrap();
        assert_eq!(log_config.console_level, LevelFilter::Warn);
        assert_eq!(log_config.destination, LogDestination::Console);
        assert_eq!(log_config.file_level, None);
    }

    #[test]
    fn test_log_file_from_config() {
        let config = config(&[
            ("base", "log-file", "/tmp/fanout.log"),
            ("base", "log-format", "json"),
        ]);

        let log_config = configure_logging(&args(&["--quiet"]), &config).unwrap();
        assert_eq!(log_config.format, LogFormat::Json);
        assert_eq!(log_config.destination, LogDestination::Both(PathBuf::from("/tmp/fanout.log")));
        // File level follows the console level when not given
        assert_eq!(log_config.file_level, Some(LevelFilter::Error));
    }

    #[test]
    fn test_parallel_flag_overrides_config() {
        let config = config(&[("broadcaster", "dispatch", "sequential")]);

        let broadcaster_config = configure_broadcaster(&args(&["--parallel"]), &config).unwrap();
        assert_eq!(broadcaster_config.dispatch, DispatchMode::Parallel);

        let broadcaster_config = configure_broadcaster(&args(&[]), &config).unwrap();
        assert_eq!(broadcaster_config.dispatch, DispatchMode::Sequential);
    }
}
