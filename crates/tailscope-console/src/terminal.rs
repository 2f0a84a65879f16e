use std::io::{self, BufRead, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

/// A single keystroke, as far as the console cares
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    /// Ctrl+C
    Interrupt,
    Other,
}

impl Key {
    pub fn from_event(event: &KeyEvent) -> Self {
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Self::Interrupt,
            KeyCode::Char(c) => Self::Char(c),
            KeyCode::Enter => Self::Enter,
            _ => Self::Other,
        }
    }

    /// Keys that end the program outside of command entry
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Interrupt | Self::Char('q') | Self::Char('Q'))
    }
}

/// Reads one keystroke without waiting for a newline
pub trait KeySource: Send {
    /// Wait up to `timeout` for a key press.
    ///
    /// The terminal mode in effect before the call is restored on every
    /// return path.
    fn read_key(&mut self, timeout: Duration) -> io::Result<Option<Key>>;
}

/// Reads a full command line
pub trait LineSource: Send {
    /// Show `prompt` and read one line; `None` at end of input
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Restores cooked mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best effort cleanup on drop
        let _ = disable_raw_mode();
    }
}

/// Keystrokes from the controlling terminal via crossterm
#[derive(Debug, Default)]
pub struct RawKeys;

impl KeySource for RawKeys {
    fn read_key(&mut self, timeout: Duration) -> io::Result<Option<Key>> {
        let _raw = RawModeGuard::enable()?;

        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            // Filter out release events (important for Windows)
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(Key::from_event(&key))),
            _ => Ok(None),
        }
    }
}

/// Command lines from stdin, prompt on stdout
#[derive(Debug, Default)]
pub struct StdinLines;

impl LineSource for StdinLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from_event(&ctrl_c), Key::Interrupt);

        let slash = KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE);
        assert_eq!(Key::from_event(&slash), Key::Char('/'));

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(Key::from_event(&esc), Key::Other);
    }

    #[test]
    fn test_quit_keys() {
        assert!(Key::Interrupt.is_quit());
        assert!(Key::Char('q').is_quit());
        assert!(Key::Char('Q').is_quit());
        assert!(!Key::Char('/').is_quit());
        assert!(!Key::Enter.is_quit());
    }
}
