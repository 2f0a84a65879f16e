use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tailscope_types::{FilterMode, LevelSet, LogRecord};

use crate::process::ProcessDirectory;

/// Filter configuration shared between the console and the pipeline
pub type SharedFilters = Arc<RwLock<FilterConfig>>;

/// The four independently addressable rule categories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    /// Substring of the record tag
    Module,
    /// Substring of the process name resolved from the pid
    Process,
    /// Exact pid
    Pid,
    /// Substring of the message, level-agnostic
    Any,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 4] = [Self::Module, Self::Process, Self::Pid, Self::Any];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Module => "Module",
            Self::Process => "Process",
            Self::Pid => "PID",
            Self::Any => "Any",
        }
    }
}

/// One installed rule: the value to look for and the levels it admits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterRule<'a> {
    pub pattern: &'a str,
    pub levels: LevelSet,
}

/// Filter mode plus the four rule tables, as persisted between runs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub pid: BTreeMap<String, LevelSet>,
    #[serde(default)]
    pub module: BTreeMap<String, LevelSet>,
    #[serde(default)]
    pub process: BTreeMap<String, LevelSet>,
    #[serde(default)]
    pub any: BTreeMap<String, LevelSet>,
}

impl FilterConfig {
    pub fn shared(self) -> SharedFilters {
        Arc::new(RwLock::new(self))
    }

    fn table(&self, category: FilterCategory) -> &BTreeMap<String, LevelSet> {
        match category {
            FilterCategory::Module => &self.module,
            FilterCategory::Process => &self.process,
            FilterCategory::Pid => &self.pid,
            FilterCategory::Any => &self.any,
        }
    }

    fn table_mut(&mut self, category: FilterCategory) -> &mut BTreeMap<String, LevelSet> {
        match category {
            FilterCategory::Module => &mut self.module,
            FilterCategory::Process => &mut self.process,
            FilterCategory::Pid => &mut self.pid,
            FilterCategory::Any => &mut self.any,
        }
    }

    /// Install or replace a rule
    pub fn insert(&mut self, category: FilterCategory, key: impl Into<String>, levels: LevelSet) {
        self.table_mut(category).insert(key.into(), levels);
    }

    /// Remove a rule, returning whether it existed
    pub fn remove(&mut self, category: FilterCategory, key: &str) -> bool {
        self.table_mut(category).remove(key).is_some()
    }

    pub fn get(&self, category: FilterCategory, key: &str) -> Option<LevelSet> {
        self.table(category).get(key).copied()
    }

    /// Rules of one category, ordered by key
    pub fn rules(&self, category: FilterCategory) -> impl Iterator<Item = FilterRule<'_>> {
        self.table(category).iter().map(|(pattern, levels)| FilterRule {
            pattern: pattern.as_str(),
            levels: *levels,
        })
    }

    /// True when no category holds a rule
    pub fn is_empty(&self) -> bool {
        FilterCategory::ALL.iter().all(|c| self.table(*c).is_empty())
    }

    pub fn rule_count(&self) -> usize {
        FilterCategory::ALL.iter().map(|c| self.table(*c).len()).sum()
    }
}

/// Outcome of matching one record against one category
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Hit {
    matched: bool,
    level_matched: bool,
}

impl Hit {
    fn or(self, other: Hit) -> Hit {
        Hit {
            matched: self.matched || other.matched,
            level_matched: self.level_matched || other.level_matched,
        }
    }
}

/// Decides whether records are displayed under a [`FilterConfig`]
#[derive(Clone, Debug)]
pub struct FilterEngine {
    strip_whitespace: bool,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self {
            strip_whitespace: true,
        }
    }

    /// Compare with internal whitespace kept.
    ///
    /// By default all whitespace is removed before matching, so a message
    /// `"wifi scan done"` is compared as `"wifiscandone"`.
    pub fn keep_whitespace(mut self) -> Self {
        self.strip_whitespace = false;
        self
    }

    pub fn is_displayable(
        &self,
        record: &LogRecord,
        config: &FilterConfig,
        processes: &ProcessDirectory,
    ) -> bool {
        if config.is_empty() {
            return true;
        }

        let level = record.level();
        let admits = |levels: LevelSet| level.is_some_and(|l| levels.contains(l));

        let tag = self.normalize(&record.tag);
        let pid = record.pid.to_string();
        let message = self.normalize(&record.message);

        let module = self.category_hit(
            config.rules(FilterCategory::Module),
            |rule| tag.contains(rule.as_str()),
            admits,
        );

        let by_pid = self.category_hit(config.rules(FilterCategory::Pid), |rule| *rule == pid, admits);

        // Any-message rules ignore levels: a match counts as level-matched too
        let any_matched = config
            .rules(FilterCategory::Any)
            .any(|rule| message.contains(self.normalize(rule.pattern).as_str()));
        let any = Hit {
            matched: any_matched,
            level_matched: any_matched,
        };

        let process = processes
            .with_name(record.pid, |name| {
                let name = self.normalize(name);
                self.category_hit(
                    config.rules(FilterCategory::Process),
                    |rule| name.contains(rule.as_str()),
                    admits,
                )
            })
            .unwrap_or_default();

        let hit = module.or(by_pid).or(any).or(process);

        match config.mode {
            FilterMode::Mask => hit.matched && hit.level_matched,
            FilterMode::Unmask => !hit.matched,
        }
    }

    /// Combine every rule of a category that matches `field`
    fn category_hit<'a>(
        &self,
        rules: impl Iterator<Item = FilterRule<'a>>,
        field_matches: impl Fn(&String) -> bool,
        admits: impl Fn(LevelSet) -> bool,
    ) -> Hit {
        rules
            .filter(|rule| field_matches(&self.normalize(rule.pattern)))
            .fold(Hit::default(), |hit, rule| {
                hit.or(Hit {
                    matched: true,
                    level_matched: admits(rule.levels),
                })
            })
    }

    fn normalize(&self, s: &str) -> String {
        if self.strip_whitespace {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect()
        } else {
            s.to_lowercase()
        }
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}
