//! Run log — append-only in-memory stage history with broadcast to observers.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::model::{AgentName, LogEntry, LogEvent};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Append-only log shared by every run of the process.
///
/// Each stage appends its records as one batch. The processor admits one run
/// at a time, so a run's batches are contiguous. The only removal is
/// [`RunLog::clear`].
///
/// Events are sent while the write lock is held, so subscribers see them in
/// the same order the mutations were applied.
pub struct RunLog {
    entries: RwLock<Vec<LogEntry>>,
    tx: broadcast::Sender<LogEvent>,
}

impl RunLog {
    /// Create an empty run log.
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            entries: RwLock::new(Vec::new()),
            tx,
        })
    }

    /// Subscribe to append/clear events.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    /// Append a batch of entries atomically. Returns the new total length.
    pub async fn append(&self, batch: Vec<LogEntry>) -> usize {
        if batch.is_empty() {
            return self.len().await;
        }

        let added = batch.len();
        let event = LogEvent::Appended {
            entries: batch.clone(),
        };
        let mut entries = self.entries.write().await;
        entries.extend(batch);
        let total = entries.len();

        // Broadcast — ok if no receivers are listening
        let _ = self.tx.send(event);
        drop(entries);

        debug!(added, total, "Run log entries appended");
        total
    }

    /// Snapshot of every entry, in append order.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().await.clone()
    }

    /// Snapshot of one agent's entries, in append order.
    pub async fn entries_for(&self, agent: AgentName) -> Vec<LogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.agent == agent)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Empty the log unconditionally. Returns how many entries were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        let _ = self.tx.send(LogEvent::Cleared { removed });
        drop(entries);

        info!(removed, "Run log cleared");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(agent: AgentName, n: usize) -> Vec<LogEntry> {
        (0..n)
            .map(|i| LogEntry::completed(agent, None, serde_json::json!({ "seq": i })))
            .collect()
    }

    #[tokio::test]
    async fn append_accumulates_in_order() {
        let log = RunLog::new();
        assert_eq!(log.append(batch(AgentName::Classifier, 2)).await, 2);
        assert_eq!(log.append(batch(AgentName::ActionRouter, 3)).await, 5);

        let entries = log.entries().await;
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].agent, AgentName::Classifier);
        assert_eq!(entries[4].agent, AgentName::ActionRouter);
        assert_eq!(entries[4].output["seq"], 2);
    }

    #[tokio::test]
    async fn clear_empties_regardless_of_size() {
        let log = RunLog::new();
        log.append(batch(AgentName::Classifier, 7)).await;
        assert_eq!(log.clear().await, 7);
        assert!(log.is_empty().await);
        assert_eq!(log.clear().await, 0);
    }

    #[tokio::test]
    async fn entries_for_filters_by_agent() {
        let log = RunLog::new();
        log.append(batch(AgentName::Classifier, 2)).await;
        log.append(batch(AgentName::ActionRouter, 1)).await;
        assert_eq!(log.entries_for(AgentName::ActionRouter).await.len(), 1);
        assert!(log.entries_for(AgentName::PdfAgent).await.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_appends_and_clears() {
        let log = RunLog::new();
        let mut rx = log.subscribe();

        log.append(batch(AgentName::JsonAgent, 2)).await;
        log.clear().await;

        match rx.recv().await.unwrap() {
            LogEvent::Appended { entries } => assert_eq!(entries.len(), 2),
            other => panic!("Expected Appended, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            LogEvent::Cleared { removed } => assert_eq!(removed, 2),
            other => panic!("Expected Cleared, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_events_replay_to_final_state() {
        let log = RunLog::new();
        let mut rx = log.subscribe();

        let mut tasks = Vec::new();
        for i in 0..40 {
            let appender = Arc::clone(&log);
            tasks.push(tokio::spawn(async move {
                appender.append(batch(AgentName::Classifier, 1 + i % 3)).await;
            }));
            if i % 5 == 0 {
                let log = Arc::clone(&log);
                tasks.push(tokio::spawn(async move {
                    log.clear().await;
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut replayed: Vec<LogEntry> = Vec::new();
        let mut events = 0;
        while let Ok(event) = rx.try_recv() {
            events += 1;
            match event {
                LogEvent::Appended { entries } => replayed.extend(entries),
                LogEvent::Cleared { removed } => {
                    assert_eq!(removed, replayed.len());
                    replayed.clear();
                }
                LogEvent::LogSync { .. } => panic!("store never sends LogSync"),
            }
        }

        assert_eq!(events, 48);
        assert_eq!(replayed, log.entries().await);
    }

    #[tokio::test]
    async fn empty_batch_is_not_broadcast() {
        let log = RunLog::new();
        let mut rx = log.subscribe();
        assert_eq!(log.append(Vec::new()).await, 0);
        assert!(rx.try_recv().is_err());
    }
}
