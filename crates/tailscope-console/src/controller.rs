use std::io::{self, Write};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tailscope_logs::ProcessDirectory;

use crate::command::{CommandDispatcher, Flow};
use crate::pause::PauseFlag;
use crate::terminal::{Key, KeySource, LineSource};
use crate::theme::{print_help, Theme};

/// Prompt shown while reading a command line
pub const PROMPT: &str = "/ ";

/// Key that opens the command line without showing help first
pub const COMMAND_KEY: char = '/';

/// Key that prints help and keeps the log running
pub const HELP_KEY: char = '?';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleState {
    /// Log lines are flowing
    Streaming,
    /// Log is paused, commands are being read
    Interactive,
}

/// Owns terminal input: pause/resume and interactive commands.
///
/// Runs on its own blocking thread. The shared cancellation token is both
/// observed (the pipeline is shutting down) and triggered (the operator quit).
pub struct ConsoleController<K, L, W> {
    keys: K,
    lines: L,
    out: W,
    dispatcher: CommandDispatcher,
    processes: ProcessDirectory,
    pause: PauseFlag,
    shutdown: CancellationToken,
    poll_interval: Duration,
    state: ConsoleState,
}

impl<K, L, W> ConsoleController<K, L, W>
where
    K: KeySource,
    L: LineSource,
    W: Write + Send,
{
    pub fn new(
        keys: K,
        lines: L,
        out: W,
        dispatcher: CommandDispatcher,
        processes: ProcessDirectory,
        pause: PauseFlag,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            keys,
            lines,
            out,
            dispatcher,
            processes,
            pause,
            shutdown,
            poll_interval: Duration::from_millis(100),
            state: ConsoleState::Streaming,
        }
    }

    /// How long a key wait may block before the shutdown token is checked
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Run until the operator quits or shutdown is requested.
    ///
    /// A terminal failure ends the console only; the log keeps streaming.
    pub fn run(mut self) {
        if let Err(e) = self.run_loop() {
            tracing::warn!(error = %e, "console input stopped");
        }
        // Never leave the pipeline parked behind a dead console
        self.pause.resume();
        tracing::debug!("console stopped");
    }

    fn run_loop(&mut self) -> io::Result<()> {
        while !self.shutdown.is_cancelled() {
            let Some(key) = self.keys.read_key(self.poll_interval)? else {
                continue;
            };

            if key.is_quit() {
                self.quit()?;
                break;
            }
            if key == Key::Char(HELP_KEY) {
                self.quick_help()?;
                continue;
            }

            self.enter_interactive(key)?;
            match self.command_loop()? {
                Flow::Exit => {
                    self.shutdown.cancel();
                    break;
                }
                Flow::Resume | Flow::Continue => self.leave_interactive()?,
            }
        }
        Ok(())
    }

    fn enter_interactive(&mut self, key: Key) -> io::Result<()> {
        self.pause.pause();
        self.state = ConsoleState::Interactive;
        Theme::notice(&mut self.out, "LOG is PAUSED")?;

        if let Err(e) = self.processes.refresh() {
            tracing::warn!(error = %e, "process list refresh failed");
            Theme::error(&mut self.out, &format!("Error : process list unavailable - {e}"))?;
        }

        if key != Key::Char(COMMAND_KEY) {
            print_help(&mut self.out)?;
        }
        self.out.flush()
    }

    /// Read and run command lines until one ends interactive mode
    fn command_loop(&mut self) -> io::Result<Flow> {
        while !self.shutdown.is_cancelled() {
            let Some(line) = self.lines.read_line(PROMPT)? else {
                return Ok(Flow::Resume);
            };
            let flow = self.dispatcher.dispatch(&line, &mut self.out)?;
            self.out.flush()?;
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }
        Ok(Flow::Resume)
    }

    /// Help without a prompt; the log is held only while it prints
    fn quick_help(&mut self) -> io::Result<()> {
        self.pause.pause();
        let printed = print_help(&mut self.out).and_then(|_| self.out.flush());
        self.pause.resume();
        printed
    }

    fn leave_interactive(&mut self) -> io::Result<()> {
        Theme::notice(&mut self.out, "LOG is RESUMED")?;
        self.out.flush()?;
        self.state = ConsoleState::Streaming;
        self.pause.resume();
        Ok(())
    }

    fn quit(&mut self) -> io::Result<()> {
        Theme::notice(&mut self.out, "Exit tailscope")?;
        self.out.flush()?;
        self.shutdown.cancel();
        Ok(())
    }
}
