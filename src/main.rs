use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use tailscope_console::{CommandDispatcher, ConsoleController, PauseFlag, RawKeys, StdinLines};
use tailscope_logs::{state, CommandLister, FilterEngine, LogProcess, ProcessDirectory, Renderer};

mod config;
mod pipeline;

use config::{Args, Settings};
use pipeline::{Pipeline, StopReason};

/// Extra time, past one key poll, that shutdown waits for the console
const CONSOLE_GRACE: Duration = Duration::from_millis(500);

/// A key poll holds the terminal in raw mode, so the wait must outlast one
fn console_grace(idle: Duration) -> Duration {
    idle + CONSOLE_GRACE
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::resolve(args)?;

    init_tracing(settings.log_file.as_deref())?;

    // Run the application
    let result = run_app(settings).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

async fn run_app(settings: Settings) -> Result<()> {
    let filters = state::load_or_default(&settings.state_file).shared();
    let processes = ProcessDirectory::new(Arc::new(CommandLister::new(&settings.ps_command)));
    let dispatcher = CommandDispatcher::new(filters.clone(), processes.clone());

    dispatcher.show(&mut io::stdout())?;

    // Process rules need names before the first keystroke refreshes them
    {
        let processes = processes.clone();
        let refreshed = tokio::task::spawn_blocking(move || processes.refresh()).await?;
        if let Err(e) = refreshed {
            tracing::warn!(error = %e, "initial process list unavailable");
        }
    }

    let (mut log_process, mut reader) = LogProcess::spawn(&settings.log_command)
        .with_context(|| format!("Failed to start `{}`", settings.log_command))?;

    let pause = PauseFlag::new();
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received");
                shutdown.cancel();
            }
        });
    }

    // Without a terminal on stdin there is nothing to read keystrokes from
    let interactive = io::stdin().is_terminal();
    let console = interactive.then(|| {
        let controller = ConsoleController::new(
            RawKeys,
            StdinLines,
            io::stdout(),
            dispatcher.clone(),
            processes.clone(),
            pause.clone(),
            shutdown.clone(),
        )
        .with_poll_interval(settings.idle);

        // A plain thread: the runtime would otherwise wait on a pending read_line at exit
        let (done, stopped) = oneshot::channel();
        thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                controller.run();
                let _ = done.send(());
            })
            .map(|_| stopped)
    });
    let console = console.transpose().context("Failed to start console thread")?;

    let mut renderer = Renderer::new();
    if !settings.color {
        renderer = renderer.without_color();
    }
    if let Some(term) = &settings.highlight {
        renderer = renderer.with_highlight(term.as_str());
    }
    let engine = if settings.strip_whitespace {
        FilterEngine::new()
    } else {
        FilterEngine::new().keep_whitespace()
    };

    let mut pipeline = Pipeline::new(
        renderer,
        engine,
        filters.clone(),
        processes,
        pause,
        shutdown.clone(),
        io::stdout(),
    );
    if interactive {
        pipeline = pipeline.with_crlf();
    }

    let outcome = pipeline.run(&mut reader).await;
    match &outcome {
        Ok(StopReason::StreamEnded) => tracing::debug!(command = log_process.command(), "log stream ended"),
        Ok(StopReason::Cancelled) => tracing::debug!("shutdown requested"),
        Err(e) => tracing::error!(error = %e, "writing log output failed"),
    }
    tracing::debug!(stats = ?pipeline.stats(), "pipeline stopped");

    // Shutdown: persist filters, stop the console, then the log process
    let snapshot = filters.read().clone();
    if let Err(e) = state::save(&settings.state_file, &snapshot) {
        tracing::error!(error = %e, "filter state not saved");
        eprintln!("Warning: {e}");
    }

    shutdown.cancel();
    if let Some(console) = console {
        if tokio::time::timeout(console_grace(settings.idle), console).await.is_err() {
            tracing::debug!("console still waiting for input, not joined");
        }
    }

    if let Err(e) = log_process.kill().await {
        tracing::warn!(error = %e, "log process not stopped");
    }

    outcome.context("Failed to write log output")?;
    Ok(())
}
