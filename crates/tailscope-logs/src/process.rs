use std::collections::HashMap;
use std::process::Command;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Empty process list command")]
    EmptyCommand,

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// Source of the pid -> process name table
pub trait ProcessLister: Send + Sync {
    fn list(&self) -> Result<HashMap<u32, String>, ProcessError>;
}

/// Lists processes by running an external `ps`-style command
#[derive(Clone, Debug)]
pub struct CommandLister {
    argv: Vec<String>,
}

impl CommandLister {
    /// Build from a whitespace separated command line, e.g. `adb shell ps`
    pub fn new(command: &str) -> Self {
        Self {
            argv: command.split_whitespace().map(String::from).collect(),
        }
    }
}

impl ProcessLister for CommandLister {
    fn list(&self) -> Result<HashMap<u32, String>, ProcessError> {
        let (program, args) = self.argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        let command = self.argv.join(" ");

        let output = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .map_err(|source| ProcessError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProcessError::Failed {
                command,
                status: output.status.to_string(),
            });
        }

        Ok(parse_process_table(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `ps` output: a header line, then rows whose second column is the pid
/// and whose last column is the process name. Rows that do not fit are skipped.
pub fn parse_process_table(table: &str) -> HashMap<u32, String> {
    table
        .lines()
        .skip(1)
        .filter_map(|row| {
            let columns: Vec<&str> = row.split_whitespace().collect();
            if columns.len() < 3 {
                return None;
            }
            let pid = columns[1].parse().ok()?;
            let name = columns.last()?;
            Some((pid, name.to_string()))
        })
        .collect()
}

/// Thread-safe, refreshable pid -> process name directory
#[derive(Clone)]
pub struct ProcessDirectory {
    names: Arc<RwLock<HashMap<u32, String>>>,
    lister: Arc<dyn ProcessLister>,
}

impl ProcessDirectory {
    pub fn new(lister: Arc<dyn ProcessLister>) -> Self {
        Self {
            names: Arc::new(RwLock::new(HashMap::new())),
            lister,
        }
    }

    /// Replace the whole table from the lister.
    ///
    /// On failure the previous table stays in place.
    pub fn refresh(&self) -> Result<usize, ProcessError> {
        let fresh = self.lister.list()?;
        let count = fresh.len();
        *self.names.write() = fresh;
        tracing::debug!(count, "process directory refreshed");
        Ok(count)
    }

    pub fn lookup(&self, pid: u32) -> Option<String> {
        self.names.read().get(&pid).cloned()
    }

    /// Run `f` against the name for `pid` without cloning it
    pub fn with_name<T>(&self, pid: u32, f: impl FnOnce(&str) -> T) -> Option<T> {
        self.names.read().get(&pid).map(|name| f(name))
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl std::fmt::Debug for ProcessDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessDirectory")
            .field("processes", &self.len())
            .finish()
    }
}

/// Lister with a fixed table, for wiring without a device
#[derive(Clone, Debug, Default)]
pub struct StaticLister(pub HashMap<u32, String>);

impl ProcessLister for StaticLister {
    fn list(&self) -> Result<HashMap<u32, String>, ProcessError> {
        Ok(self.0.clone())
    }
}
