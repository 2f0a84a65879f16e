//! Command line arguments layered over an optional TOML config file

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use tailscope_logs::state::DEFAULT_STATE_FILE;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "tailscope.toml";

pub const DEFAULT_LOG_COMMAND: &str = "adb logcat";
pub const DEFAULT_PS_COMMAND: &str = "adb shell ps";
pub const DEFAULT_IDLE_MS: u64 = 100;

/// Tailscope - colorized, filterable tail for device logs
#[derive(Parser, Debug, Default)]
#[command(name = "tailscope")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Text to highlight in every message
    #[arg(value_name = "HIGHLIGHT")]
    pub highlight: Option<String>,

    /// Command producing the log stream
    #[arg(long, value_name = "COMMAND")]
    pub log_command: Option<String>,

    /// Command listing device processes (pid in column 2, name last)
    #[arg(long, value_name = "COMMAND")]
    pub ps_command: Option<String>,

    /// File holding filters between runs
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Idle interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub idle_ms: Option<u64>,

    /// Match filters without collapsing whitespace
    #[arg(long)]
    pub keep_whitespace: bool,

    /// Render without ANSI colors
    #[arg(long)]
    pub no_color: bool,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Settings read from the TOML file; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub log_command: Option<String>,
    pub ps_command: Option<String>,
    pub state_file: Option<PathBuf>,
    pub idle_ms: Option<u64>,
    pub strip_whitespace: Option<bool>,
    pub highlight: Option<String>,
    pub color: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Effective settings after merging file and flags
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub log_command: String,
    pub ps_command: String,
    pub state_file: PathBuf,
    pub idle: Duration,
    pub strip_whitespace: bool,
    pub highlight: Option<String>,
    pub color: bool,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings: flags win over the config file, which wins over defaults.
    ///
    /// An explicit `--config` must exist; the default file is optional.
    pub fn resolve(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                FileConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => FileConfig::default(),
        };
        Ok(Self::merge(args, file))
    }

    fn merge(args: Args, file: FileConfig) -> Self {
        let idle_ms = args.idle_ms.or(file.idle_ms).unwrap_or(DEFAULT_IDLE_MS).max(1);

        Self {
            log_command: args
                .log_command
                .or(file.log_command)
                .unwrap_or_else(|| DEFAULT_LOG_COMMAND.to_string()),
            ps_command: args
                .ps_command
                .or(file.ps_command)
                .unwrap_or_else(|| DEFAULT_PS_COMMAND.to_string()),
            state_file: args
                .state_file
                .or(file.state_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            idle: Duration::from_millis(idle_ms),
            strip_whitespace: !args.keep_whitespace && file.strip_whitespace.unwrap_or(true),
            highlight: args.highlight.or(file.highlight).filter(|h| !h.is_empty()),
            color: !args.no_color && file.color.unwrap_or(true),
            log_file: args.log_file.or(file.log_file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::merge(Args::default(), FileConfig::default());
        assert_eq!(settings.log_command, "adb logcat");
        assert_eq!(settings.ps_command, "adb shell ps");
        assert_eq!(settings.state_file, PathBuf::from("hlogcat.json"));
        assert_eq!(settings.idle, Duration::from_millis(100));
        assert!(settings.strip_whitespace);
        assert!(settings.color);
        assert!(settings.highlight.is_none());
    }

    #[test]
    fn test_flags_override_file() {
        let args = Args::parse_from([
            "tailscope",
            "--log-command",
            "adb -s emulator-5554 logcat",
            "--no-color",
            "--idle-ms",
            "0",
            "wifi",
        ]);
        let file = FileConfig {
            log_command: Some("adb logcat -b all".into()),
            ps_command: Some("adb shell ps -A".into()),
            color: Some(true),
            ..Default::default()
        };

        let settings = Settings::merge(args, file);
        assert_eq!(settings.log_command, "adb -s emulator-5554 logcat");
        assert_eq!(settings.ps_command, "adb shell ps -A");
        assert!(!settings.color);
        assert_eq!(settings.idle, Duration::from_millis(1));
        assert_eq!(settings.highlight.as_deref(), Some("wifi"));
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tailscope.toml");
        fs::write(
            &path,
            "log_command = \"adb logcat -v threadtime\"\nstrip_whitespace = false\nidle_ms = 250\n",
        )
        .unwrap();

        let args = Args {
            config: Some(path),
            ..Default::default()
        };
        let settings = Settings::resolve(args).unwrap();
        assert_eq!(settings.log_command, "adb logcat -v threadtime");
        assert!(!settings.strip_whitespace);
        assert_eq!(settings.idle, Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "colour = false\n").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/tailscope.toml")),
            ..Default::default()
        };
        assert!(Settings::resolve(args).is_err());
    }
}
