use std::io::{self, Write};

use crossterm::style::{Attribute, Color, Stylize};

/// Color theme for operator-facing console output
pub struct Theme;

impl Theme {
    pub const TITLE: Color = Color::DarkYellow;
    pub const TEXT: Color = Color::Grey;
    pub const NOTICE: Color = Color::DarkGreen;
    pub const ERROR: Color = Color::DarkRed;

    /// Section heading
    pub fn title(out: &mut impl Write, text: &str) -> io::Result<()> {
        writeln!(out, "{}", text.with(Self::TITLE).attribute(Attribute::Bold))
    }

    pub fn text(out: &mut impl Write, text: &str) -> io::Result<()> {
        writeln!(out, "{}", text.with(Self::TEXT))
    }

    /// State change notices (paused/resumed)
    pub fn notice(out: &mut impl Write, text: &str) -> io::Result<()> {
        writeln!(out, "{}", text.with(Self::NOTICE))
    }

    pub fn error(out: &mut impl Write, text: &str) -> io::Result<()> {
        writeln!(out, "{}", text.with(Self::ERROR).attribute(Attribute::Bold))
    }
}

/// Write the command reference
pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    Theme::title(out, "----------   Help  ----------")?;
    Theme::text(out, "/            : open the command line")?;
    Theme::text(out, "?            : show this help and keep the log running")?;
    Theme::text(out, "q, Ctrl+C    : exit")?;
    Theme::text(out, "")?;
    Theme::title(out, "---------- Command ----------")?;
    for (usage, description) in COMMAND_HELP {
        Theme::text(out, &format!("{usage:<26}: {description}"))?;
    }
    Theme::text(out, "")?;
    Theme::text(out, "Levels are V D I W E F S; a level admits itself and everything after it.")?;
    Theme::text(out, "Any unknown command resumes the log.")
}

const COMMAND_HELP: &[(&str, &str)] = &[
    ("show", "show all filter information"),
    ("help", "display this help"),
    ("exit", "exit tailscope"),
    ("mask", "only show lines matching a filter"),
    ("unmask", "hide lines matching a filter"),
    ("mode mask|unmask", "set the filter mode"),
    ("module TAG [LEVEL]", "filter on a tag substring"),
    ("process NAME [LEVEL]", "filter on a process name substring"),
    ("pid PID [LEVEL]", "filter on an exact pid"),
    ("any TEXT", "filter on a message substring"),
    ("umodule TAG", "remove a module filter"),
    ("uprocess NAME", "remove a process filter"),
    ("upid PID", "remove a pid filter"),
    ("uany TEXT", "remove an any filter"),
    ("refresh", "reload the process list"),
];
