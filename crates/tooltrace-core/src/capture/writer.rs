//! Durable JSONL log writer.
//!
//! One file per agent identity, `agent_stream_events_<display_name>.jsonl`,
//! truncated at the start of every run. All file I/O runs on tokio's
//! blocking pool so the stream consumer never waits on the disk.
//!
//! Each line is written with a single `write_all` of `json + "\n"` on an
//! unbuffered file, so a failure or crash never splits an earlier line.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::event::StreamEvent;

pub const LOG_FILE_PREFIX: &str = "agent_stream_events_";
pub const LOG_FILE_EXTENSION: &str = "jsonl";

/// Errors that end a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("invalid display name {0:?}: must be non-empty and contain no path separators")]
    InvalidDisplayName(String),

    #[error("failed to encode event #{index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("log writer task failed: {0}")]
    WriterTask(String),
}

/// File name for an agent identity.
pub fn log_file_name(display_name: &str) -> Result<String, CaptureError> {
    if display_name.is_empty() || display_name.contains(['/', '\\']) {
        return Err(CaptureError::InvalidDisplayName(display_name.to_string()));
    }
    Ok(format!("{LOG_FILE_PREFIX}{display_name}.{LOG_FILE_EXTENSION}"))
}

/// Full path of the log for `display_name` inside `dir`.
pub fn log_path(dir: &Path, display_name: &str) -> Result<PathBuf, CaptureError> {
    Ok(dir.join(log_file_name(display_name)?))
}

/// Encode one event as a newline-terminated JSON line.
pub fn encode_line(index: usize, event: &StreamEvent) -> Result<Vec<u8>, CaptureError> {
    let mut line = serde_json::to_vec(event).map_err(|source| CaptureError::Encode { index, source })?;
    line.push(b'\n');
    Ok(line)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CaptureError + '_ {
    move |source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Truncate/create the log for `display_name` and write every event, in
/// order, as one batch.
pub async fn write_log(
    dir: &Path,
    display_name: &str,
    events: &[StreamEvent],
) -> Result<PathBuf, CaptureError> {
    let path = log_path(dir, display_name)?;

    let mut lines = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        lines.push(encode_line(index, event)?);
    }

    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), CaptureError> {
        let mut file = File::create(&target).map_err(io_error(&target))?;
        for line in &lines {
            file.write_all(line).map_err(io_error(&target))?;
        }
        file.flush().map_err(io_error(&target))
    })
    .await
    .map_err(|e| CaptureError::WriterTask(e.to_string()))??;

    debug!(path = %path.display(), lines = events.len(), "wrote batch log");
    Ok(path)
}

/// Appends events to a log as they arrive.
///
/// Lines are handed to a writer on the blocking pool through an unbounded
/// channel; [`IncrementalWriter::append`] never blocks.
///
/// The queue is not bounded. If the disk stalls, queued lines stay in
/// memory until it recovers; the stream consumer is never slowed down and
/// no event is dropped. A single run emits a small, finite number of
/// events, so the queue stays short in practice.
#[derive(Debug)]
pub struct IncrementalWriter {
    path: PathBuf,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<Result<usize, CaptureError>>,
    sent: usize,
}

impl IncrementalWriter {
    /// Truncate/create the log for `display_name` and start the writer.
    ///
    /// Fails immediately if the file cannot be created.
    pub async fn create(dir: &Path, display_name: &str) -> Result<Self, CaptureError> {
        let path = log_path(dir, display_name)?;

        let target = path.clone();
        let file = tokio::task::spawn_blocking(move || File::create(&target))
            .await
            .map_err(|e| CaptureError::WriterTask(e.to_string()))?
            .map_err(io_error(&path))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let target = path.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<usize, CaptureError> {
            let mut file = file;
            let mut written = 0usize;
            while let Some(line) = rx.blocking_recv() {
                file.write_all(&line).map_err(io_error(&target))?;
                written += 1;
            }
            file.flush().map_err(io_error(&target))?;
            Ok(written)
        });

        Ok(Self {
            path,
            tx,
            task,
            sent: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one event for writing.
    ///
    /// An error here means the writer already stopped;
    /// [`IncrementalWriter::finish`] reports why.
    pub fn append(&mut self, event: &StreamEvent) -> Result<(), CaptureError> {
        let line = encode_line(self.sent, event)?;
        self.tx
            .send(line)
            .map_err(|_| CaptureError::WriterTask("log writer stopped accepting lines".to_string()))?;
        self.sent += 1;
        Ok(())
    }

    /// Close the channel, wait for every queued line to hit the file and
    /// return the number of lines written.
    pub async fn finish(self) -> Result<usize, CaptureError> {
        let Self { tx, task, .. } = self;
        drop(tx);
        task.await
            .map_err(|e| CaptureError::WriterTask(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventValue;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn file_name_uses_display_name() {
        assert_eq!(
            log_file_name("gemini_agent").unwrap(),
            "agent_stream_events_gemini_agent.jsonl"
        );
    }

    #[test]
    fn file_name_rejects_separators_and_empty() {
        assert!(matches!(
            log_file_name("../etc"),
            Err(CaptureError::InvalidDisplayName(_))
        ));
        assert!(log_file_name("a\\b").is_err());
        assert!(log_file_name("").is_err());
    }

    #[tokio::test]
    async fn batch_write_truncates_previous_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = vec![EventValue::map([("run", 1i64)]), EventValue::map([("run", 1i64)])];
        let second = vec![EventValue::map([("run", 2i64)])];

        write_log(dir.path(), "agent", &first).await.unwrap();
        let path = write_log(dir.path(), "agent", &second).await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines, vec![serde_json::json!({"run": 2})]);
    }

    #[tokio::test]
    async fn batch_write_of_nothing_creates_empty_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_log(dir.path(), "quiet", &[]).await.unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn incremental_lines_are_visible_before_finish() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = IncrementalWriter::create(dir.path(), "live").await.unwrap();
        writer.append(&EventValue::map([("n", 0i64)])).unwrap();
        writer.append(&EventValue::map([("n", 1i64)])).unwrap();

        // Wait for the writer to drain without closing it.
        let path = writer.path().to_path_buf();
        let mut seen = 0;
        for _ in 0..200 {
            seen = std::fs::read_to_string(&path).unwrap().lines().count();
            if seen == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(seen, 2, "lines should be flushed while the run is in progress");

        assert_eq!(writer.finish().await.unwrap(), 2);
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[tokio::test]
    async fn append_queues_every_line_without_awaiting() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = IncrementalWriter::create(dir.path(), "burst").await.unwrap();
        for n in 0..1_000i64 {
            writer.append(&EventValue::map([("n", n)])).unwrap();
        }
        let path = writer.path().to_path_buf();

        assert_eq!(writer.finish().await.unwrap(), 1_000);
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1_000);
        assert_eq!(lines[999], serde_json::json!({"n": 999}));
    }

    #[tokio::test]
    async fn incremental_create_truncates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent_stream_events_again.jsonl");
        std::fs::write(&path, "{\"old\":true}\n").unwrap();

        let writer = IncrementalWriter::create(dir.path(), "again").await.unwrap();
        assert_eq!(writer.finish().await.unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn create_in_missing_directory_fails_with_io() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("does/not/exist");
        let err = IncrementalWriter::create(&missing, "agent").await.unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }), "got {err:?}");

        let err = write_log(&missing, "agent", &[EventValue::Null]).await.unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }), "got {err:?}");
    }
}
