//! The consume-render loop between the stream reader and the terminal

use std::io::{self, Write};

use tokio_util::sync::CancellationToken;

use tailscope_console::PauseFlag;
use tailscope_logs::{FilterEngine, LineParser, ProcessDirectory, Renderer, SharedFilters, StreamReader};

/// Why the pipeline stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The log process closed its output
    StreamEnded,
    /// Shutdown was requested (exit command, quit key, signal)
    Cancelled,
}

/// Counters reported at shutdown
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub shown: u64,
    pub filtered: u64,
    pub passed_through: u64,
    pub dropped: u64,
}

/// Parses, filters, renders and writes queued lines
pub struct Pipeline<W> {
    parser: LineParser,
    renderer: Renderer,
    engine: FilterEngine,
    filters: SharedFilters,
    processes: ProcessDirectory,
    pause: PauseFlag,
    shutdown: CancellationToken,
    out: W,
    line_ending: &'static str,
    stats: PipelineStats,
}

impl<W: Write> Pipeline<W> {
    pub fn new(
        renderer: Renderer,
        engine: FilterEngine,
        filters: SharedFilters,
        processes: ProcessDirectory,
        pause: PauseFlag,
        shutdown: CancellationToken,
        out: W,
    ) -> Self {
        Self {
            parser: LineParser::new(),
            renderer,
            engine,
            filters,
            processes,
            pause,
            shutdown,
            out,
            line_ending: "\n",
            stats: PipelineStats::default(),
        }
    }

    /// Terminate lines with `\r\n`, needed while the console holds the
    /// terminal in raw mode
    pub fn with_crlf(mut self) -> Self {
        self.line_ending = "\r\n";
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Run until the stream is exhausted or shutdown is requested.
    ///
    /// While paused nothing is taken from the reader; queued lines are
    /// written in arrival order once the pause clears.
    pub async fn run(&mut self, reader: &mut StreamReader) -> io::Result<StopReason> {
        loop {
            if self.pause.is_paused() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(StopReason::Cancelled),
                    _ = self.pause.resumed() => continue,
                }
            }

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Ok(StopReason::Cancelled),

                _ = self.pause.paused() => continue,

                line = reader.recv() => match line {
                    Some(line) => {
                        self.emit(&line)?;
                        self.drain(reader)?;
                    }
                    None => return Ok(StopReason::StreamEnded),
                },
            }
        }
    }

    /// Write everything already queued, stopping early if paused
    fn drain(&mut self, reader: &mut StreamReader) -> io::Result<()> {
        while !self.pause.is_paused() && !self.shutdown.is_cancelled() {
            let Some(line) = reader.try_recv() else {
                break;
            };
            self.emit(&line)?;
        }
        self.out.flush()
    }

    /// Parse, filter, render and write one line
    fn emit(&mut self, line: &str) -> io::Result<()> {
        let Some(record) = self.parser.parse(line) else {
            self.stats.passed_through += 1;
            let raw = self.renderer.render_raw(line);
            return write!(self.out, "{raw}{}", self.line_ending);
        };

        let displayable = {
            let filters = self.filters.read();
            self.engine.is_displayable(&record, &filters, &self.processes)
        };
        if !displayable {
            self.stats.filtered += 1;
            return Ok(());
        }

        match self.renderer.render(&record) {
            Some(rendered) => {
                self.stats.shown += 1;
                write!(self.out, "{rendered}{}", self.line_ending)
            }
            None => {
                self.stats.dropped += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tailscope_logs::{FilterCategory, FilterConfig, StaticLister};
    use tailscope_types::{LevelSet, LogLevel};
    use tokio::io::AsyncWriteExt;

    /// Writer whose contents stay readable while the pipeline owns it
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        filters: SharedFilters,
        pause: PauseFlag,
        shutdown: CancellationToken,
        out: SharedBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                filters: FilterConfig::default().shared(),
                pause: PauseFlag::new(),
                shutdown: CancellationToken::new(),
                out: SharedBuf::default(),
            }
        }

        fn pipeline(&self) -> Pipeline<SharedBuf> {
            Pipeline::new(
                Renderer::new().without_color(),
                FilterEngine::new(),
                self.filters.clone(),
                ProcessDirectory::new(Arc::new(StaticLister::default())),
                self.pause.clone(),
                self.shutdown.clone(),
                self.out.clone(),
            )
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_pass_through_and_stream_end() {
        let fixture = Fixture::new();
        let source: &[u8] = b"--------- beginning of main\n\tat Foo.bar(Foo.java:1)\n";
        let mut reader = StreamReader::spawn(source);

        let mut pipeline = fixture.pipeline();
        let reason = pipeline.run(&mut reader).await.unwrap();

        assert_eq!(reason, StopReason::StreamEnded);
        assert!(reader.is_exhausted());
        assert_eq!(
            fixture.out.lines(),
            vec!["--------- beginning of main", "\tat Foo.bar(Foo.java:1)"]
        );
        assert_eq!(pipeline.stats().passed_through, 2);
    }

    #[tokio::test]
    async fn test_filters_and_drops() {
        let fixture = Fixture::new();
        fixture
            .filters
            .write()
            .insert(FilterCategory::Pid, "1234", LevelSet::at_least(LogLevel::Debug));

        let source: &[u8] = b"\
01-02 03:04:05.678  1234  1234 W Tag: shown\n\
01-02 03:04:05.678  1234  1234 V Tag: below threshold\n\
01-02 03:04:05.678  4321  4321 E Tag: other pid\n\
01-02 03:04:05.678  1234  1234 S Tag: silent\n\
not a record\n";
        let mut reader = StreamReader::spawn(source);

        let mut pipeline = fixture.pipeline();
        pipeline.run(&mut reader).await.unwrap();

        let lines = fixture.out.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" W   shown"));
        assert_eq!(lines[1], "not a record");
        assert_eq!(
            pipeline.stats(),
            PipelineStats {
                shown: 1,
                filtered: 2,
                passed_through: 1,
                dropped: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_paused_lines_queue_and_flush_in_order() {
        let fixture = Fixture::new();
        fixture.pause.pause();

        let (mut writer, source) = tokio::io::duplex(4096);
        let mut reader = StreamReader::spawn(source);
        let mut pipeline = fixture.pipeline();
        let task = tokio::spawn(async move {
            let reason = pipeline.run(&mut reader).await;
            (reason, reader.is_exhausted())
        });

        for i in 0..100 {
            writer.write_all(format!("line {i}\n").as_bytes()).await.unwrap();
        }
        settle().await;
        assert!(fixture.out.lines().is_empty());

        fixture.pause.resume();
        settle().await;
        let expected: Vec<String> = (0..100).map(|i| format!("line {i}")).collect();
        assert_eq!(fixture.out.lines(), expected);

        // Pause again mid-stream: nothing new is written until resumed
        fixture.pause.pause();
        settle().await;
        writer.write_all(b"late\n").await.unwrap();
        settle().await;
        assert_eq!(fixture.out.lines().len(), 100);

        fixture.pause.resume();
        drop(writer);
        let (reason, exhausted) = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason.unwrap(), StopReason::StreamEnded);
        assert!(exhausted);
        assert_eq!(fixture.out.lines().last().map(String::as_str), Some("late"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_while_paused() {
        let fixture = Fixture::new();
        fixture.pause.pause();

        let (_writer, source) = tokio::io::duplex(64);
        let mut reader = StreamReader::spawn(source);
        let mut pipeline = fixture.pipeline();
        let task = tokio::spawn(async move { pipeline.run(&mut reader).await });

        fixture.shutdown.cancel();
        let reason = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reason, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn test_crlf_line_ending() {
        let fixture = Fixture::new();
        let source: &[u8] = b"raw\n";
        let mut reader = StreamReader::spawn(source);

        let mut pipeline = fixture.pipeline().with_crlf();
        pipeline.run(&mut reader).await.unwrap();
        assert_eq!(fixture.out.0.lock().as_slice(), b"raw\r\n");
    }
}
