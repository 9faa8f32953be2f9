use flume::{bounded, Receiver, Sender};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::types::ActivityLog;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Queue capacity (max logs in memory before dropping)
    pub queue_capacity: usize,

    /// Records written per flush
    pub batch_size: usize,

    /// Max wait time before flushing a partial batch (milliseconds)
    pub batch_timeout_ms: u64,

    /// Daily rolling file directory; `None` routes records to the
    /// `activity` tracing target instead.
    pub directory: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            batch_size: 100,
            batch_timeout_ms: 1000,
            directory: None,
        }
    }
}

enum LogCommand {
    Record(ActivityLog),
    Flush(oneshot::Sender<()>),
}

enum ActivitySink {
    File(RollingFileAppender),
    Tracing,
}

impl ActivitySink {
    fn write_batch(&mut self, batch: &[ActivityLog]) -> std::io::Result<()> {
        match self {
            ActivitySink::File(appender) => {
                let mut buf = Vec::with_capacity(batch.len() * 192);
                for log in batch {
                    serde_json::to_writer(&mut buf, log)?;
                    buf.push(b'\n');
                }
                appender.write_all(&buf)?;
                appender.flush()
            }
            ActivitySink::Tracing => {
                for log in batch {
                    let line = serde_json::to_string(log)?;
                    info!(target: "activity", "{}", line);
                }
                Ok(())
            }
        }
    }
}

/// Async activity logger with queue mechanism.
///
/// `log` never blocks the session task; a single background worker drains the
/// queue in batches.
#[derive(Clone)]
pub struct ActivityLogger {
    sender: Option<Sender<LogCommand>>,
}

impl ActivityLogger {
    /// Initialize logger with its background worker. Must be called inside a
    /// tokio runtime.
    pub fn new(config: LoggerConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));

        let sink = match &config.directory {
            Some(dir) => ActivitySink::File(RollingFileAppender::new(
                Rotation::DAILY,
                dir,
                "activity.log",
            )),
            None => ActivitySink::Tracing,
        };

        info!(
            "Initializing ActivityLogger: queue={}, batch={}, timeout={}ms, dir={:?}",
            config.queue_capacity, config.batch_size, config.batch_timeout_ms, config.directory
        );

        tokio::spawn(Self::worker_loop(receiver, sink, config));

        Self {
            sender: Some(sender),
        }
    }

    /// Logger that discards everything.
    pub fn noop() -> Self {
        Self { sender: None }
    }

    /// Log activity (non-blocking, fire-and-forget)
    pub fn log(&self, activity: ActivityLog) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(LogCommand::Record(activity)) {
            warn!("Failed to enqueue activity log (queue full?): {}", e);
        }
    }

    /// Wait until everything queued before this call has been written.
    pub async fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };

        let (tx, rx) = oneshot::channel();
        if sender.send_async(LogCommand::Flush(tx)).await.is_err() {
            warn!("Activity logger worker is gone, nothing to flush");
            return;
        }
        let _ = rx.await;
    }

    #[cfg(test)]
    pub fn queue_len(&self) -> usize {
        self.sender.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    async fn worker_loop(receiver: Receiver<LogCommand>, mut sink: ActivitySink, config: LoggerConfig) {
        debug!("Activity logger worker started");

        let batch_size = config.batch_size.max(1);
        let batch_timeout = Duration::from_millis(config.batch_timeout_ms.max(1));
        let mut batch: Vec<ActivityLog> = Vec::with_capacity(batch_size);

        loop {
            let deadline = tokio::time::Instant::now() + batch_timeout;
            let mut flush_ack: Option<oneshot::Sender<()>> = None;
            let mut closed = false;

            while batch.len() < batch_size {
                match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                    Ok(Ok(LogCommand::Record(log))) => batch.push(log),
                    Ok(Ok(LogCommand::Flush(ack))) => {
                        flush_ack = Some(ack);
                        break;
                    }
                    Ok(Err(_)) => {
                        closed = true;
                        break;
                    }
                    // timeout, flush what we have
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                if let Err(e) = sink.write_batch(&batch) {
                    error!("Failed to write {} activity logs: {}", batch.len(), e);
                }
                batch.clear();
            }

            if let Some(ack) = flush_ack {
                let _ = ack.send(());
            }

            if closed {
                info!("Activity logger worker shutting down (channel closed)");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::types::ActivityType;
    use crate::models::chat::ConversationId;

    #[tokio::test]
    async fn test_batches_reach_rolling_file() {
        let dir = std::env::temp_dir().join(format!("activity-{}", uuid::Uuid::new_v4()));
        let logger = ActivityLogger::new(LoggerConfig {
            batch_size: 2,
            batch_timeout_ms: 50,
            directory: Some(dir.clone()),
            ..LoggerConfig::default()
        });

        let id = ConversationId::new("user-7");
        for kind in [ActivityType::TurnReceived, ActivityType::TurnCommitted, ActivityType::SessionClosed] {
            logger.log(ActivityLog::builder(&id, kind).build());
        }
        logger.flush().await;

        let mut lines = Vec::new();
        for entry in std::fs::read_dir(&dir).unwrap() {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("session_closed"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_noop_logger_accepts_everything() {
        let logger = ActivityLogger::noop();
        logger.log(ActivityLog::anonymous(ActivityType::SessionOpened).build());
        logger.flush().await;
        assert_eq!(logger.queue_len(), 0);
    }
}
