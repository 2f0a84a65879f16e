use std::fmt::{self, Write};

use crossterm::Command;
use crossterm::style::{Attribute, Color, SetAttribute, SetBackgroundColor, SetForegroundColor};
use unicode_width::UnicodeWidthChar;

use tailscope_types::{LogLevel, LogRecord};

/// Process colors, indexed by `pid % 6`
pub const PALETTE: [Color; 6] = [
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
    Color::Black,
];

/// Width of the `date time pid/tid` column
pub const HEADER_WIDTH: usize = 27;

/// Width of the right-aligned tag column
pub const TAG_WIDTH: usize = 25;

/// Width of the level badge
pub const BADGE_WIDTH: usize = 3;

/// Background drawn behind black process colors
const LEGIBLE_BACKGROUND: Color = Color::White;

/// Color for a process id
pub fn pid_color(pid: u32) -> Color {
    PALETTE[(pid % PALETTE.len() as u32) as usize]
}

/// A single styled run of text, always closed with a reset
#[derive(Clone, Copy, Debug, Default)]
struct Style {
    fg: Option<Color>,
    bg: Option<Color>,
    bold: bool,
    reverse: bool,
}

impl Style {
    fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    fn on(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && !self.bold && !self.reverse
    }
}

/// Renders parsed records as colorized terminal lines
#[derive(Clone, Debug)]
pub struct Renderer {
    color: bool,
    highlight: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            color: true,
            highlight: None,
        }
    }

    /// Emit the same column layout without escape sequences
    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    /// Emphasise every occurrence of `term` in messages
    pub fn with_highlight(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.highlight = (!term.is_empty()).then_some(term);
        self
    }

    /// Render a structured record.
    ///
    /// Returns `None` when the level letter has no badge; such lines are
    /// dropped rather than written with a corrupt prefix.
    pub fn render(&self, record: &LogRecord) -> Option<String> {
        let level = record.level()?;
        let badge = level.badge_colors()?;

        let mut out = String::with_capacity(HEADER_WIDTH + TAG_WIDTH + record.message.len() + 64);
        self.write_record(&mut out, record, level, badge).ok()?;
        Some(out)
    }

    /// Lines that did not parse are written exactly as received
    pub fn render_raw<'a>(&self, line: &'a str) -> &'a str {
        line
    }

    fn write_record(
        &self,
        out: &mut String,
        record: &LogRecord,
        level: LogLevel,
        (badge_fg, badge_bg): (Color, Color),
    ) -> fmt::Result {
        let color = pid_color(record.pid);
        let process_style = if color == Color::Black {
            Style::fg(color).on(LEGIBLE_BACKGROUND)
        } else {
            Style::fg(color)
        };

        self.paint(out, process_style, &header(record))?;
        out.push(' ');

        self.paint(out, process_style, &fit_tag(&record.tag, TAG_WIDTH))?;
        out.push(' ');

        let letter = level.letter().to_string();
        self.paint(out, Style::fg(badge_fg).on(badge_bg), &center(&letter, BADGE_WIDTH))?;
        out.push(' ');

        let message_style = if level.is_severe() {
            Style::fg(Color::DarkRed).bold()
        } else {
            Style::default()
        };
        self.write_message(out, &record.message, message_style)
    }

    fn write_message(&self, out: &mut String, message: &str, style: Style) -> fmt::Result {
        let Some(term) = &self.highlight else {
            return self.paint(out, style, message);
        };

        let mut pieces = message.split(term.as_str()).peekable();
        while let Some(piece) = pieces.next() {
            self.paint(out, style, piece)?;
            if pieces.peek().is_some() {
                self.paint(out, style.reversed(), term)?;
            }
        }
        Ok(())
    }

    fn paint(&self, out: &mut String, style: Style, text: &str) -> fmt::Result {
        if !self.color || style.is_plain() || text.is_empty() {
            out.push_str(text);
            return Ok(());
        }

        if let Some(fg) = style.fg {
            SetForegroundColor(fg).write_ansi(out)?;
        }
        if let Some(bg) = style.bg {
            SetBackgroundColor(bg).write_ansi(out)?;
        }
        if style.bold {
            SetAttribute(Attribute::Bold).write_ansi(out)?;
        }
        if style.reverse {
            SetAttribute(Attribute::Reverse).write_ansi(out)?;
        }
        out.write_str(text)?;
        SetAttribute(Attribute::Reset).write_ansi(out)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// `MM-DD HH:MM:SS.mmm pid/tid`, pid right- and tid left-justified to 3
fn header(record: &LogRecord) -> String {
    let stamp = format!(
        "{} {} {:>3}/{:<3}",
        record.date, record.time, record.pid, record.tid
    );
    format!("{stamp:<HEADER_WIDTH$}")
}

/// Keep the trailing columns of `tag` that fit in `width`, right-aligned
fn fit_tag(tag: &str, width: usize) -> String {
    let mut used = 0;
    let mut start = tag.len();
    for (idx, c) in tag.char_indices().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = idx;
    }

    let mut fitted = " ".repeat(width - used);
    fitted.push_str(&tag[start..]);
    fitted
}

/// Center `text` in `width` columns, extra space going to the right
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
