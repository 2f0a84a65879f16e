//! Log processing for tailscope
//!
//! This crate provides line parsing, rendering, filtering, process lookup,
//! stream reading and filter state persistence.

mod filter;
mod parser;
mod process;
mod render;
pub mod state;
mod stream;

pub use filter::{FilterCategory, FilterConfig, FilterEngine, FilterRule, SharedFilters};
pub use parser::LineParser;
pub use process::{
    parse_process_table, CommandLister, ProcessDirectory, ProcessError, ProcessLister,
    StaticLister,
};
pub use render::{pid_color, Renderer, BADGE_WIDTH, HEADER_WIDTH, PALETTE, TAG_WIDTH};
pub use state::StateError;
pub use stream::{LogProcess, StreamError, StreamReader};

// Re-export types used in our public API
pub use tailscope_types::{FilterMode, LevelSet, LogLevel, LogRecord};
