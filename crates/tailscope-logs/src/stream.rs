use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Empty log command")]
    EmptyCommand,

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` has no stdout to read")]
    NoStdout(String),

    #[error("Failed to stop log process: {0}")]
    Kill(#[source] std::io::Error),
}

/// Background reader moving lines from a byte stream into a queue.
///
/// The queue is unbounded: lines are buffered while the consumer is paused,
/// never dropped.
pub struct StreamReader {
    /// Queued lines, in arrival order
    receiver: mpsc::UnboundedReceiver<String>,

    /// Reader task, finished once the source closes
    task: JoinHandle<()>,
}

impl StreamReader {
    /// Start reading `source` on a background task
    pub fn spawn<R>(source: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_lines(source, sender));
        Self { receiver, task }
    }

    /// Next queued line, waiting for one if the queue is empty.
    ///
    /// Returns `None` once the stream has closed and every line was taken.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Next queued line without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Number of lines waiting to be consumed
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// True once the source has closed and the queue is drained
    pub fn is_exhausted(&self) -> bool {
        self.task.is_finished() && self.receiver.is_empty()
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_lines<R>(source: R, sender: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut buf = Vec::with_capacity(512);
    let mut count: u64 = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                // Binary noise is kept, decoded lossily
                let line = String::from_utf8_lossy(&buf).into_owned();
                count += 1;
                if sender.send(line).is_err() {
                    // Consumer gone, nothing left to feed
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "log stream read failed");
                break;
            }
        }
    }

    tracing::debug!(lines = count, "log stream closed");
}

/// The external log-producing process
pub struct LogProcess {
    command: String,
    child: Child,
}

impl LogProcess {
    /// Spawn `command` (whitespace separated, e.g. `adb logcat`) with stdout
    /// captured, returning the process and a reader over its output
    pub fn spawn(command: &str) -> Result<(Self, StreamReader), StreamError> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let (program, args) = parts.split_first().ok_or(StreamError::EmptyCommand)?;

        // stdin stays with the console, the child must not read keystrokes
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamError::NoStdout(command.to_string()))?;

        tracing::debug!(command, pid = child.id(), "log process started");

        let process = Self {
            command: command.to_string(),
            child,
        };
        Ok((process, StreamReader::spawn(stdout)))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Terminate the process unconditionally
    pub async fn kill(&mut self) -> Result<(), StreamError> {
        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(%status, "log process already exited");
            return Ok(());
        }
        self.child.kill().await.map_err(StreamError::Kill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let source: &[u8] = b"first\nsecond\r\nthird";
        let mut reader = StreamReader::spawn(source);

        assert_eq!(reader.recv().await.as_deref(), Some("first"));
        assert_eq!(reader.recv().await.as_deref(), Some("second"));
        assert_eq!(reader.recv().await.as_deref(), Some("third"));
        assert_eq!(reader.recv().await, None);
        assert!(reader.is_exhausted());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_not_dropped() {
        let source: &[u8] = b"ok\n\xff\xfe binary\nafter\n";
        let mut reader = StreamReader::spawn(source);

        assert_eq!(reader.recv().await.as_deref(), Some("ok"));
        let binary = reader.recv().await.unwrap();
        assert!(binary.ends_with(" binary"));
        assert_eq!(reader.recv().await.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_buffers_while_unconsumed() {
        let (mut writer, source) = tokio::io::duplex(64);
        let mut reader = StreamReader::spawn(source);

        for i in 0..500 {
            writer.write_all(format!("line {i}\n").as_bytes()).await.unwrap();
        }
        drop(writer);

        // Wait for the reader to hit EOF without consuming anything
        while !reader.task.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(reader.pending(), 500);
        assert!(!reader.is_exhausted());

        for i in 0..500 {
            assert_eq!(reader.try_recv(), Some(format!("line {i}")));
        }
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(LogProcess::spawn("  "), Err(StreamError::EmptyCommand)));
    }
}
