//! Interactive console for tailscope
//!
//! This crate owns terminal input: single keystroke reads, the pause flag
//! shared with the pipeline, and the command language for editing filters.

mod command;
mod controller;
mod pause;
mod terminal;
mod theme;

pub use command::{Command, CommandDispatcher, CommandError, Flow};
pub use controller::{ConsoleController, ConsoleState, COMMAND_KEY, HELP_KEY, PROMPT};
pub use pause::PauseFlag;
pub use terminal::{Key, KeySource, LineSource, RawKeys, StdinLines};
pub use theme::{print_help, Theme};
