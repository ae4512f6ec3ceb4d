/// Background recommendation-log writer
///
/// Every emitted recommendation is appended to the external sink for
/// downstream feedback learning, but the write must never slow down or fail a
/// recommendation response. Entries are pushed onto an unbounded channel and
/// drained by a spawned task; sink errors are logged and dropped.
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{models::LogEntry, providers::RecommendationSink};

#[derive(Clone)]
pub struct RecommendationLogWriter {
    log_tx: mpsc::UnboundedSender<LogEntry>,
}

/// Handle for gracefully shutting down the log writer
pub struct LogWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl LogWriterHandle {
    /// Initiates a graceful shutdown of the log writer
    ///
    /// Sends a shutdown signal to the writer task and waits for it to flush
    /// all pending entries to the sink.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Recommendation log writer shutdown signal sent");
    }
}

impl RecommendationLogWriter {
    /// Creates a writer and spawns its background drain task
    pub fn spawn(sink: Arc<dyn RecommendationSink>) -> (Self, LogWriterHandle) {
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::writer_task(sink, log_rx, shutdown_rx).await;
        });

        (Self { log_tx }, LogWriterHandle { shutdown_tx })
    }

    /// Queue an entry without blocking
    ///
    /// A closed channel (writer already shut down) only produces a log line;
    /// the recommendation response is never affected.
    pub fn enqueue(&self, entry: LogEntry) {
        if let Err(e) = self.log_tx.send(entry) {
            tracing::error!(error = %e, "Failed to queue recommendation log entry");
        }
    }

    /// Background task draining log entries into the sink
    async fn writer_task(
        sink: Arc<dyn RecommendationSink>,
        mut log_rx: mpsc::UnboundedReceiver<LogEntry>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Recommendation log writer started");

        loop {
            tokio::select! {
                Some(entry) = log_rx.recv() => {
                    if let Err(e) = sink.append(&entry).await {
                        tracing::error!(error = %e, "Failed to append recommendation log entry");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Recommendation log writer shutting down, flushing remaining entries");

                    // Flush whatever is still queued
                    log_rx.close();
                    while let Some(entry) = log_rx.recv().await {
                        if let Err(e) = sink.append(&entry).await {
                            tracing::error!(error = %e, "Failed to flush log entry during shutdown");
                        }
                    }

                    tracing::info!("Recommendation log writer stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{ContentId, MediaType, RecMode, ScoreSignals, UserId};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CollectingSink {
        entries: Mutex<Vec<LogEntry>>,
        fail: bool,
    }

    #[async_trait]
    impl RecommendationSink for CollectingSink {
        async fn append(&self, entry: &LogEntry) -> crate::error::EngineResult<()> {
            if self.fail {
                return Err(EngineError::ExternalService("sink down".to_string()));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn entry(id: u64) -> LogEntry {
        LogEntry {
            user_id: UserId(1),
            content_id: ContentId(id),
            media_type: MediaType::Movie,
            mode: RecMode::Tonight,
            score: 0.8,
            explanation: "test".to_string(),
            signals: ScoreSignals::ColdStartPopularity,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_entries_reach_sink_after_shutdown_flush() {
        let sink = Arc::new(CollectingSink {
            entries: Mutex::new(Vec::new()),
            fail: false,
        });
        let (writer, handle) = RecommendationLogWriter::spawn(sink.clone());

        writer.enqueue(entry(1));
        writer.enqueue(entry(2));
        handle.shutdown().await;

        // Give the flush a moment to complete
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let collected = sink.entries.lock().unwrap();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].content_id, ContentId(1));
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_propagate() {
        let sink = Arc::new(CollectingSink {
            entries: Mutex::new(Vec::new()),
            fail: true,
        });
        let (writer, handle) = RecommendationLogWriter::spawn(sink.clone());

        // Neither call can panic or error even though every append fails
        writer.enqueue(entry(1));
        handle.shutdown().await;
    }
}
