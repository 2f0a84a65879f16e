//! Shared types for tailscope
//!
//! This crate contains data structures used across multiple tailscope crates.

use crossterm::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level, in ascending order of severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Silent,
}

impl LogLevel {
    /// All levels, least severe first
    pub const ALL: [LogLevel; 7] = [
        Self::Verbose,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
        Self::Silent,
    ];

    /// Resolve a single level letter (`VDIWEFS`), case-insensitive
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'V' => Some(Self::Verbose),
            'D' => Some(Self::Debug),
            'I' => Some(Self::Info),
            'W' => Some(Self::Warn),
            'E' => Some(Self::Error),
            'F' => Some(Self::Fatal),
            'S' => Some(Self::Silent),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Self::Verbose => 'V',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
            Self::Fatal => 'F',
            Self::Silent => 'S',
        }
    }

    /// Badge colors as `(foreground, background)`.
    ///
    /// `Silent` has no badge: lines carrying it are never rendered.
    pub fn badge_colors(&self) -> Option<(Color, Color)> {
        match self {
            Self::Verbose => Some((Color::White, Color::Black)),
            Self::Debug => Some((Color::Black, Color::DarkBlue)),
            Self::Info => Some((Color::Black, Color::DarkGreen)),
            Self::Warn => Some((Color::Black, Color::DarkYellow)),
            Self::Error | Self::Fatal => Some((Color::Black, Color::DarkRed)),
            Self::Silent => None,
        }
    }

    /// Whether messages at this level are emphasised
    pub fn is_severe(&self) -> bool {
        matches!(self, Self::Error | Self::Fatal)
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A set of log levels.
///
/// Persisted as the threshold letter when the set is "this level and
/// above" (`"D"` admits D I W E F S), otherwise as its letters in
/// `VDIWEFS` order. A single stored letter always reads as a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LevelSet(u8);

impl LevelSet {
    /// Threshold used when a filter command gives no level
    pub const DEFAULT_THRESHOLD: LogLevel = LogLevel::Debug;

    pub fn empty() -> Self {
        Self(0)
    }

    /// The given level and every level more severe than it
    pub fn at_least(min: LogLevel) -> Self {
        LogLevel::ALL
            .iter()
            .filter(|l| **l >= min)
            .fold(Self::empty(), |set, l| set.with(*l))
    }

    /// Build a set from level letters, ignoring anything that is not one
    pub fn from_letters(s: &str) -> Self {
        s.chars()
            .filter_map(LogLevel::from_letter)
            .fold(Self::empty(), |set, l| set.with(l))
    }

    pub fn with(self, level: LogLevel) -> Self {
        Self(self.0 | level.bit())
    }

    pub fn contains(&self, level: LogLevel) -> bool {
        self.0 & level.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Least severe member of the set
    pub fn minimum(&self) -> Option<LogLevel> {
        LogLevel::ALL.into_iter().find(|l| self.contains(*l))
    }

    pub fn iter(&self) -> impl Iterator<Item = LogLevel> + '_ {
        LogLevel::ALL.into_iter().filter(|l| self.contains(*l))
    }

    /// The minimum level, if the set is exactly that level and above
    pub fn threshold(&self) -> Option<LogLevel> {
        self.minimum().filter(|min| *self == Self::at_least(*min))
    }

    /// Read the stored form: one letter is a threshold, more are a literal set
    pub fn from_persisted(s: &str) -> Self {
        let mut letters = s.chars().filter_map(LogLevel::from_letter);
        match (letters.next(), letters.next()) {
            (Some(level), None) => Self::at_least(level),
            _ => Self::from_letters(s),
        }
    }

    /// The stored form, see [`LevelSet::from_persisted`]
    pub fn to_persisted(&self) -> String {
        match self.threshold() {
            Some(min) => min.letter().to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in self.iter() {
            write!(f, "{}", level.letter())?;
        }
        Ok(())
    }
}

impl From<String> for LevelSet {
    fn from(s: String) -> Self {
        Self::from_persisted(&s)
    }
}

impl From<LevelSet> for String {
    fn from(set: LevelSet) -> Self {
        set.to_persisted()
    }
}

/// How filter rules are applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum FilterMode {
    /// Allow-list: only matching, level-permitted records show
    #[default]
    Mask,
    /// Deny-list: matching records are suppressed
    Unmask,
}

impl FilterMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::Unmask => "unmask",
        }
    }
}

impl From<bool> for FilterMode {
    fn from(mask: bool) -> Self {
        if mask { Self::Mask } else { Self::Unmask }
    }
}

impl From<FilterMode> for bool {
    fn from(mode: FilterMode) -> Self {
        mode == FilterMode::Mask
    }
}

/// A single structured log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Month and day, `MM-DD`
    pub date: String,

    /// Wall clock time with milliseconds, `HH:MM:SS.mmm`
    pub time: String,

    pub pid: u32,
    pub tid: u32,

    /// Raw level letter as it appeared on the line
    pub level_code: char,

    /// Component label, whitespace-trimmed
    pub tag: String,

    pub message: String,
}

impl LogRecord {
    /// Resolved severity, `None` when the letter is not a known level
    pub fn level(&self) -> Option<LogLevel> {
        LogLevel::from_letter(self.level_code).filter(|_| self.level_code.is_ascii_uppercase())
    }
}
