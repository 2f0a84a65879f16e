//! Filter state persisted between runs
//!
//! The file is a JSON object:
//! `{"mode": true, "pid": {}, "module": {}, "process": {}, "any": {}}`
//! where each category maps a key to the letters of the levels it admits.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::filter::FilterConfig;

/// Default state file, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "hlogcat.json";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed filter state in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load filter state. A missing file is not an error and yields `None`.
pub fn load(path: &Path) -> Result<Option<FilterConfig>, StateError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StateError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Load filter state, falling back to an empty configuration
pub fn load_or_default(path: &Path) -> FilterConfig {
    match load(path) {
        Ok(Some(config)) => {
            tracing::debug!(path = %path.display(), rules = config.rule_count(), "filter state loaded");
            config
        }
        Ok(None) => FilterConfig::default(),
        Err(e) => {
            tracing::warn!(error = %e, "using empty filter state");
            FilterConfig::default()
        }
    }
}

/// Save filter state, overwriting the file
pub fn save(path: &Path, config: &FilterConfig) -> Result<(), StateError> {
    let content = serde_json::to_string_pretty(config).map_err(|source| StateError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, content).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterCategory, FilterEngine};
    use crate::process::{ProcessDirectory, StaticLister};
    use std::sync::Arc;
    use tailscope_types::{FilterMode, LevelSet, LogLevel, LogRecord};
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut config = FilterConfig {
            mode: FilterMode::Unmask,
            ..Default::default()
        };
        config.insert(FilterCategory::Module, "wifi", LevelSet::at_least(LogLevel::Warn));
        config.insert(FilterCategory::Pid, "1234", LevelSet::at_least(LogLevel::Debug));
        config.insert(FilterCategory::Process, "system_server", LevelSet::at_least(LogLevel::Info));
        config.insert(FilterCategory::Any, "timeout", LevelSet::at_least(LogLevel::Debug));

        save(&path, &config).unwrap();
        assert_eq!(load(&path).unwrap(), Some(config));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(load(&path).unwrap().is_none());

        let config = load_or_default(&path);
        assert_eq!(config.mode, FilterMode::Mask);
        assert!(config.is_empty());
    }

    #[test]
    fn test_legacy_file_without_process_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hlogcat.json");
        fs::write(&path, r#"{"mode": false, "pid": {"42": "D"}, "module": {}, "any": {}}"#).unwrap();

        let config = load(&path).unwrap().unwrap();
        assert_eq!(config.mode, FilterMode::Unmask);
        assert_eq!(config.get(FilterCategory::Pid, "42"), Some(LevelSet::at_least(LogLevel::Debug)));
        assert!(config.process.is_empty());
    }

    #[test]
    fn test_stored_letter_is_a_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hlogcat.json");
        fs::write(
            &path,
            r#"{"mode": true, "pid": {"1234": "D"}, "module": {}, "process": {}, "any": {}}"#,
        )
        .unwrap();

        let config = load(&path).unwrap().unwrap();
        let processes = ProcessDirectory::new(Arc::new(StaticLister::default()));
        let record = |level_code| LogRecord {
            date: "01-02".into(),
            time: "03:04:05.678".into(),
            pid: 1234,
            tid: 1234,
            level_code,
            tag: "Tag".into(),
            message: "m".into(),
        };

        let engine = FilterEngine::new();
        assert!(engine.is_displayable(&record('W'), &config, &processes));
        assert!(!engine.is_displayable(&record('V'), &config, &processes));
    }

    #[test]
    fn test_saved_threshold_is_one_letter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut config = FilterConfig::default();
        config.insert(FilterCategory::Pid, "1234", LevelSet::at_least(LogLevel::Debug));
        save(&path, &config).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["pid"]["1234"], "D");
        assert_eq!(raw["mode"], true);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load(&path), Err(StateError::Malformed { .. })));
        assert!(load_or_default(&path).is_empty());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut config = FilterConfig::default();
        config.insert(FilterCategory::Module, "a", LevelSet::at_least(LogLevel::Verbose));
        save(&path, &config).unwrap();

        config.remove(FilterCategory::Module, "a");
        save(&path, &config).unwrap();
        assert_eq!(load(&path).unwrap(), Some(FilterConfig::default()));
    }
}
