//! CLI argument definitions for loghive-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use loghive_core::config::LoghiveConfig;

/// loghive syslog ingestion daemon.
///
/// Receives syslog lines, attributes them to inventory devices,
/// parses them with per-device rules and writes daily search indices.
#[derive(Parser, Debug)]
#[command(name = "loghive-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to loghive.toml configuration file.
    #[arg(short, long, default_value = "/etc/loghive/loghive.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and inventory files and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut LoghiveConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_system_config_path() {
        let cli = DaemonCli::parse_from(["loghive-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/loghive/loghive.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_take_precedence_over_config() {
        let cli = DaemonCli::parse_from([
            "loghive-daemon",
            "--config",
            "/tmp/loghive.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
        ]);
        let mut config = LoghiveConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
    }

    #[test]
    fn missing_overrides_keep_config_values() {
        let cli = DaemonCli::parse_from(["loghive-daemon", "--validate"]);
        let mut config = LoghiveConfig::default();
        config.general.log_level = "warn".to_owned();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "warn");
        assert!(cli.validate);
    }
}
