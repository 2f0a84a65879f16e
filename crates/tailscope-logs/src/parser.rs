use regex::Regex;

use tailscope_types::LogRecord;

/// `MM-DD HH:MM:SS.mmm  pid  tid L tag: message`
const LINE_PATTERN: &str = r"^([0-9][0-9]-[0-9][0-9]) ([0-9][0-9]:[0-9][0-9]:[0-9][0-9]\.[0-9][0-9][0-9])\s+(\d+)\s+(\d+) ([A-Z]) ([^:]*)[: +](.*)$";

/// Parser for threadtime-formatted device log lines
#[derive(Clone, Debug)]
pub struct LineParser {
    pattern: Regex,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(LINE_PATTERN).expect("line pattern is a valid regex"),
        }
    }

    /// Parse a raw line into a record.
    ///
    /// Returns `None` for anything that does not have the record structure
    /// (stack traces, banners, binary noise). Those lines are passed through
    /// untouched by the caller.
    pub fn parse(&self, raw: &str) -> Option<LogRecord> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let caps = self.pattern.captures(line)?;

        // Ids too large for a u32 are not a real pid/tid
        let pid = caps[3].parse().ok()?;
        let tid = caps[4].parse().ok()?;

        Some(LogRecord {
            date: caps[1].to_string(),
            time: caps[2].to_string(),
            pid,
            tid,
            level_code: caps[5].chars().next()?,
            tag: caps[6].trim().to_string(),
            message: caps[7].to_string(),
        })
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}
