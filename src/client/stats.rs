use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a consumer's activity since the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderStats {
    pub client_id: String,
    pub topic: String,
    pub partition: i32,
    pub fetches: u64,
    pub messages: u64,
    pub bytes: u64,
    pub errors: u64,
    pub offset: i64,
    pub lag: i64,
}

impl std::fmt::Display for ReaderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reader Stats [{}] {}/{}: {} fetches, {} messages, {} bytes, {} errors, offset {}, lag {}",
            self.client_id,
            self.topic,
            self.partition,
            self.fetches,
            self.messages,
            self.bytes,
            self.errors,
            self.offset,
            self.lag
        )
    }
}

/// Snapshot of a producer's activity since the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    pub client_id: String,
    pub topic: String,
    pub writes: u64,
    pub messages: u64,
    pub bytes: u64,
    pub errors: u64,
}

impl std::fmt::Display for WriterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Writer Stats [{}] {}: {} writes, {} messages, {} bytes, {} errors",
            self.client_id, self.topic, self.writes, self.messages, self.bytes, self.errors
        )
    }
}

/// Resettable counters backing the stats snapshots.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) calls: AtomicU64,
    pub(crate) messages: AtomicU64,
    pub(crate) bytes: AtomicU64,
    pub(crate) errors: AtomicU64,
}

/// Values taken out of [`Counters`] by one snapshot.
pub(crate) struct CounterSnapshot {
    pub(crate) calls: u64,
    pub(crate) messages: u64,
    pub(crate) bytes: u64,
    pub(crate) errors: u64,
}

impl Counters {
    pub(crate) fn record_success(&self, messages: u64, bytes: u64) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.messages.fetch_add(messages, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads and resets every counter.
    pub(crate) fn take(&self) -> CounterSnapshot {
        CounterSnapshot {
            calls: self.calls.swap(0, Ordering::Relaxed),
            messages: self.messages.swap(0, Ordering::Relaxed),
            bytes: self.bytes.swap(0, Ordering::Relaxed),
            errors: self.errors.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_reset_on_take() {
        let counters = Counters::default();
        counters.record_success(3, 120);
        counters.record_error();

        let snapshot = counters.take();
        assert_eq!(snapshot.calls, 2);
        assert_eq!(snapshot.messages, 3);
        assert_eq!(snapshot.bytes, 120);
        assert_eq!(snapshot.errors, 1);

        let again = counters.take();
        assert_eq!(again.calls, 0);
        assert_eq!(again.messages, 0);
    }

    #[test]
    fn test_default_stats_are_zero() {
        let stats = WriterStats::default();
        assert_eq!(stats.writes, 0);
        assert!(stats.topic.is_empty());
        assert_eq!(ReaderStats::default().lag, 0);
    }
}
