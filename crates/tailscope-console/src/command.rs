use std::io::{self, Write};

use thiserror::Error;

use tailscope_logs::{FilterCategory, ProcessDirectory, SharedFilters};
use tailscope_types::{FilterMode, LevelSet, LogLevel};

use crate::theme::{print_help, Theme};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Error : missing argument - usage: {0}")]
    MissingArgument(&'static str),

    #[error("Error : too many arguments - usage: {0}")]
    TooManyArguments(&'static str),

    #[error("Error : unknown level [{0}] - use one of VDIWEFS")]
    InvalidLevel(String),

    #[error("Error : pid must be a number - [{0}]")]
    InvalidPid(String),

    #[error("Error : unknown mode [{0}] - use mask or unmask")]
    InvalidMode(String),
}

/// Interactive commands (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Show,
    Help,
    Exit,
    Mode(FilterMode),
    /// Install a rule admitting `levels`
    Add {
        category: FilterCategory,
        target: String,
        levels: LevelSet,
    },
    /// Remove a rule, no-op if absent
    Remove {
        category: FilterCategory,
        target: String,
    },
    /// Reload the process list
    Refresh,
}

impl Command {
    /// Parse a command line.
    ///
    /// Input is lowercased and split on whitespace. `Ok(None)` means the
    /// first word is not a command.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.to_lowercase();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match *name {
            "show" => Self::Show,
            "help" => Self::Help,
            "exit" => Self::Exit,
            "mask" => Self::Mode(FilterMode::Mask),
            "unmask" => Self::Mode(FilterMode::Unmask),
            "mode" => match args {
                [] => return Err(CommandError::MissingArgument("mode mask|unmask")),
                ["mask"] => Self::Mode(FilterMode::Mask),
                ["unmask"] => Self::Mode(FilterMode::Unmask),
                [other] => return Err(CommandError::InvalidMode(other.to_string())),
                _ => return Err(CommandError::TooManyArguments("mode mask|unmask")),
            },
            "refresh" => Self::Refresh,
            "module" => parse_add(FilterCategory::Module, args, "module TAG [LEVEL]")?,
            "process" => parse_add(FilterCategory::Process, args, "process NAME [LEVEL]")?,
            "pid" => parse_add(FilterCategory::Pid, args, "pid PID [LEVEL]")?,
            "any" => parse_add(FilterCategory::Any, args, "any TEXT [LEVEL]")?,
            "umodule" => parse_remove(FilterCategory::Module, args, "umodule TAG")?,
            "uprocess" => parse_remove(FilterCategory::Process, args, "uprocess NAME")?,
            "upid" => parse_remove(FilterCategory::Pid, args, "upid PID")?,
            "uany" => parse_remove(FilterCategory::Any, args, "uany TEXT")?,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn parse_add(
    category: FilterCategory,
    args: &[&str],
    usage: &'static str,
) -> Result<Command, CommandError> {
    let (target, level) = match args {
        [] => return Err(CommandError::MissingArgument(usage)),
        // `target:W` is accepted as well as `target W`
        [target] if category != FilterCategory::Any => match target.rsplit_once(':') {
            Some((target, level)) if !target.is_empty() => (target, Some(level)),
            _ => (*target, None),
        },
        [target] => (*target, None),
        [target, level] => (*target, Some(*level)),
        _ => return Err(CommandError::TooManyArguments(usage)),
    };

    let threshold = match level {
        None => LevelSet::DEFAULT_THRESHOLD,
        Some(level) => parse_level(level)?,
    };

    Ok(Command::Add {
        category,
        target: validate_target(category, target)?,
        levels: LevelSet::at_least(threshold),
    })
}

fn parse_remove(
    category: FilterCategory,
    args: &[&str],
    usage: &'static str,
) -> Result<Command, CommandError> {
    match args {
        [] => Err(CommandError::MissingArgument(usage)),
        [target] => Ok(Command::Remove {
            category,
            target: validate_target(category, target)?,
        }),
        _ => Err(CommandError::TooManyArguments(usage)),
    }
}

fn parse_level(level: &str) -> Result<LogLevel, CommandError> {
    let mut chars = level.chars();
    match (chars.next().and_then(LogLevel::from_letter), chars.next()) {
        (Some(level), None) => Ok(level),
        _ => Err(CommandError::InvalidLevel(level.to_uppercase())),
    }
}

/// Pids are stored in canonical form so `0042` matches pid 42
fn validate_target(category: FilterCategory, target: &str) -> Result<String, CommandError> {
    if category != FilterCategory::Pid {
        return Ok(target.to_string());
    }
    target
        .parse::<u32>()
        .map(|pid| pid.to_string())
        .map_err(|_| CommandError::InvalidPid(target.to_string()))
}

/// What the console does after a command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Stay in the command loop
    Continue,
    /// Leave interactive mode and resume the log
    Resume,
    /// Terminate the program
    Exit,
}

/// Executes command lines against the shared filter state
#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    filters: SharedFilters,
    processes: ProcessDirectory,
}

impl CommandDispatcher {
    pub fn new(filters: SharedFilters, processes: ProcessDirectory) -> Self {
        Self { filters, processes }
    }

    /// Parse and run one command line, reporting to `out`
    pub fn dispatch(&self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command, out),
            Ok(None) => Ok(Flow::Resume),
            Err(e) => {
                Theme::error(out, &e.to_string())?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn execute(&self, command: Command, out: &mut impl Write) -> io::Result<Flow> {
        match command {
            Command::Show => self.show(out)?,
            Command::Help => print_help(out)?,
            Command::Exit => {
                Theme::notice(out, "Exit tailscope")?;
                return Ok(Flow::Exit);
            }
            Command::Mode(mode) => {
                self.filters.write().mode = mode;
                self.filter_set(out)?;
            }
            Command::Add {
                category,
                target,
                levels,
            } => {
                self.filters.write().insert(category, target, levels);
                self.filter_set(out)?;
            }
            Command::Remove { category, target } => {
                self.filters.write().remove(category, &target);
                self.filter_set(out)?;
            }
            Command::Refresh => match self.processes.refresh() {
                Ok(count) => Theme::notice(out, &format!("{count} processes known"))?,
                Err(e) => Theme::error(out, &format!("Error : process list unavailable - {e}"))?,
            },
        }
        Ok(Flow::Continue)
    }

    fn filter_set(&self, out: &mut impl Write) -> io::Result<()> {
        Theme::title(out, "Filter is set")?;
        self.show(out)
    }

    /// Print the mode and every rule, grouped by category
    pub fn show(&self, out: &mut impl Write) -> io::Result<()> {
        let filters = self.filters.read();
        Theme::title(out, &format!("Filter Mode : {}", filters.mode.label()))?;

        for category in FilterCategory::ALL {
            Theme::title(out, &format!("{} Filter List", category.label()))?;
            for rule in filters.rules(category) {
                let threshold = rule
                    .levels
                    .minimum()
                    .map(|l| l.letter().to_string())
                    .unwrap_or_else(|| "-".to_string());
                Theme::text(out, &format!("-- [{}] : [{}] ({})", rule.pattern, threshold, rule.levels))?;
            }
        }
        Ok(())
    }
}
