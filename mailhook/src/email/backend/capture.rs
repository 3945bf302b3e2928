//! Capture backend for development and tests
//!
//! Records every message as one JSON line in a per-transport log file
//! instead of delivering it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::email::{
    ComposedMessage, Delivery, MailerError, Receipt, Transport, TransportError,
};

/// Capture email backend
///
/// Appends each message, stamped with `sentAt`, to
/// `<dir>/email-<name>.jsonl`. Nothing leaves the machine.
///
/// # Examples
///
/// ```rust,no_run
/// use mailhook::email::{CaptureTransport, ComposedMessage, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let capture = CaptureTransport::new("default", ".tmp");
///
/// let message = ComposedMessage {
///     to: vec!["user@example.com".to_string()],
///     from: "noreply@myapp.com".to_string(),
///     html: Some("<h1>Hello</h1>".to_string()),
///     ..ComposedMessage::default()
/// };
/// capture.send(message).await?;
///
/// let recorded = CaptureTransport::read_log(capture.log_path()).await?;
/// assert_eq!(recorded.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CaptureTransport {
    name: String,
    dir: PathBuf,
    log_path: PathBuf,
    append: Mutex<()>,
}

impl CaptureTransport {
    /// Create a capture transport writing under `dir`
    ///
    /// The directory is created on first send, not here.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let dir = dir.into();
        let log_path = Self::log_path_for(&dir, &name);
        Self {
            name,
            dir,
            log_path,
            append: Mutex::new(()),
        }
    }

    /// Capture log location for a transport name
    #[must_use]
    pub fn log_path_for(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("email-{name}.jsonl"))
    }

    /// Capture log this transport appends to
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Read every record from a capture log
    ///
    /// A missing file reads as empty. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Io` if the file cannot be read and
    /// `TransportError::MalformedRecord` for a line that is not a message
    pub async fn read_log(path: impl AsRef<Path>) -> Result<Vec<ComposedMessage>, TransportError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| TransportError::MalformedRecord {
                    path: path.to_path_buf(),
                    line: index + 1,
                    source,
                })
            })
            .collect()
    }

    async fn append(&self, record: &[u8]) -> Result<(), TransportError> {
        // create_dir_all treats a directory created concurrently as success.
        fs::create_dir_all(&self.dir).await?;

        let _guard = self.append.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(record).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for CaptureTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_capture(&self) -> bool {
        true
    }

    async fn send(&self, mut message: ComposedMessage) -> Result<Receipt, MailerError> {
        let sent_at = Utc::now();
        message.sent_at = Some(sent_at);

        let mut record = serde_json::to_vec(&message)
            .map_err(|e| MailerError::transport(&self.name, e.into()))?;
        record.push(b'\n');

        self.append(&record)
            .await
            .map_err(|e| MailerError::transport(&self.name, e))?;

        info!(
            transport = %self.name,
            from = %message.from,
            to = ?message.to,
            subject = ?message.subject,
            log = %self.log_path.display(),
            "Captured email"
        );
        debug!(
            has_html = message.html.is_some(),
            has_text = message.text.is_some(),
            "Captured email details"
        );

        Ok(Receipt {
            transport: self.name.clone(),
            recipients: message.recipients(),
            delivery: Delivery::Captured {
                log: self.log_path.clone(),
                sent_at,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn message(to: &str) -> ComposedMessage {
        ComposedMessage {
            to: vec![to.to_string()],
            from: "noreply@myapp.com".to_string(),
            subject: Some("Test Email".to_string()),
            html: Some("<h1>This is HTML</h1>".to_string()),
            ..ComposedMessage::default()
        }
    }

    #[tokio::test]
    async fn test_capture_creates_directory_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let capture_dir = dir.path().join("nested").join(".tmp");
        let capture = CaptureTransport::new("default", &capture_dir);

        let before = Utc::now();
        let receipt = capture.send(message("user@example.com")).await.unwrap();

        assert!(receipt.is_captured());
        assert_eq!(receipt.transport, "default");
        assert_eq!(receipt.recipients, vec!["user@example.com"]);
        assert_eq!(capture.log_path(), capture_dir.join("email-default.jsonl"));

        capture.send(message("other@example.com")).await.unwrap();

        let records = CaptureTransport::read_log(capture.log_path()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to, vec!["user@example.com"]);
        assert_eq!(records[1].to, vec!["other@example.com"]);
        assert!(records[0].sent_at.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_capture_existing_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let capture = CaptureTransport::new("default", dir.path());
        assert!(capture.send(message("user@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_capture_logs_are_per_transport_name() {
        let dir = tempfile::tempdir().unwrap();
        let first = CaptureTransport::new("first", dir.path());
        let second = CaptureTransport::new("second", dir.path());

        first.send(message("a@example.com")).await.unwrap();
        second.send(message("b@example.com")).await.unwrap();

        let first_records = CaptureTransport::read_log(first.log_path()).await.unwrap();
        let second_records = CaptureTransport::read_log(second.log_path()).await.unwrap();
        assert_eq!(first_records.len(), 1);
        assert_eq!(second_records.len(), 1);
        assert_eq!(second_records[0].to, vec!["b@example.com"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_produce_distinct_lines() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Arc::new(CaptureTransport::new("default", dir.path().join("fresh")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let capture = Arc::clone(&capture);
            handles.push(tokio::spawn(async move {
                let mut msg = message(&format!("user{i}@example.com"));
                msg.text = Some("x".repeat(64 * 1024));
                capture.send(msg).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = CaptureTransport::read_log(capture.log_path()).await.unwrap();
        assert_eq!(records.len(), 16);

        let mut recipients: Vec<_> = records.iter().map(|r| r.to[0].clone()).collect();
        recipients.sort();
        recipients.dedup();
        assert_eq!(recipients.len(), 16);
    }

    #[tokio::test]
    async fn test_read_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = CaptureTransport::read_log(dir.path().join("email-none.jsonl"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_read_malformed_log_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("email-bad.jsonl");
        tokio::fs::write(&path, "{\"to\":[],\"from\":\"a@x.com\"}\n\nnot json\n")
            .await
            .unwrap();

        let err = CaptureTransport::read_log(&path).await.unwrap_err();
        assert!(matches!(err, TransportError::MalformedRecord { line: 3, .. }));
    }

    #[tokio::test]
    async fn test_capture_write_failure_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let capture = CaptureTransport::new("default", &blocker);
        let err = capture.send(message("user@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            MailerError::TransportIo {
                source: TransportError::Io(_),
                ..
            }
        ));
    }
}
