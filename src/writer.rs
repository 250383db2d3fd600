use crate::client::{ClusterProducer, ProducerConnector, WriterStats};
use crate::config::WriterConfig;
use crate::core::{ClusterErrors, Context, Message, MqError, Result};
use crate::pool::{PoolStats, WorkerPool};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, Level, event, info_span};

/// How the writer picks its target cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Round-robin over every cluster; a failed write moves to the next cluster.
    #[default]
    MultiWrite,
    /// Cluster 0 is the primary; a failed write goes to one of the backups.
    PrimaryBackup,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiWrite => write!(f, "multi-write"),
            Self::PrimaryBackup => write!(f, "primary-backup"),
        }
    }
}

impl FromStr for WriteMode {
    type Err = MqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi-write" | "multi" => Ok(Self::MultiWrite),
            "primary-backup" | "backup" => Ok(Self::PrimaryBackup),
            other => Err(MqError::Config(format!("unknown write mode '{}'", other))),
        }
    }
}

/// Writer over several independent clusters.
///
/// Each [`write_messages`](Writer::write_messages) call makes at most two attempts: one
/// on the selected cluster and, if that fails, one on a different cluster.
pub struct Writer {
    mode: WriteMode,
    configs: Vec<WriterConfig>,
    /// Drives round-robin selection
    next: AtomicU64,
    producers: Vec<Arc<dyn ClusterProducer>>,
    pool: WorkerPool,
}

impl Writer {
    /// Opens one producer per config, in order.
    ///
    /// # Panics
    ///
    /// Panics if `configs` is empty.
    pub async fn new<C>(mode: WriteMode, configs: Vec<WriterConfig>, connector: &C) -> Result<Self>
    where
        C: ProducerConnector + ?Sized,
    {
        assert!(!configs.is_empty(), "must configure at least one cluster");

        let mut producers: Vec<Arc<dyn ClusterProducer>> = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            match connector.connect(config).await {
                Ok(producer) => producers.push(producer),
                Err(err) => {
                    event!(Level::ERROR, cluster = index, error = %err, "producer connect failed");
                    for (opened, producer) in producers.iter().enumerate() {
                        if let Err(close_err) = producer.close().await {
                            event!(Level::WARN, cluster = opened, error = %close_err, "producer close failed");
                        }
                    }
                    return Err(err.at_cluster(index));
                }
            }
        }

        let n = configs.len();
        event!(Level::DEBUG, clusters = n, mode = %mode, "writer opened");
        Ok(Self {
            mode,
            configs,
            next: AtomicU64::new(0),
            producers,
            pool: WorkerPool::new(n),
        })
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn configs(&self) -> &[WriterConfig] {
        &self.configs
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Writes a batch, failing over to another cluster once.
    ///
    /// The result of the second attempt is returned as-is, so a caller never sees the
    /// first failure when the retry also fails. Each attempt is bounded by the target
    /// cluster's `write_timeout` as well as by `ctx`. A retried batch may have been
    /// partially written by the first attempt, so duplicates are possible.
    pub async fn write_messages(&self, ctx: &Context, messages: &[Message]) -> Result<()> {
        let n = self.producers.len();
        let first = match self.mode {
            WriteMode::PrimaryBackup => 0,
            WriteMode::MultiWrite => self.advance() % n,
        };

        let span = info_span!(
            "fanout.writer.write",
            mode = %self.mode,
            cluster = first,
            messages = messages.len()
        );
        async move {
            let err = match self.attempt(ctx, first, messages).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if n == 1 {
                event!(Level::WARN, cluster = first, error = %err, "write failed, no cluster to retry on");
                return Err(err);
            }

            let retry = match self.mode {
                WriteMode::PrimaryBackup => 1 + self.advance() % (n - 1),
                WriteMode::MultiWrite => (first + 1) % n,
            };
            event!(
                Level::WARN,
                cluster = first,
                retry_cluster = retry,
                error = %err,
                "write failed, retrying on another cluster"
            );

            self.attempt(ctx, retry, messages).await
        }
        .instrument(span)
        .await
    }

    /// Stats of cluster `i` since the previous call; empty when `i` is out of range.
    pub fn stats(&self, i: usize) -> WriterStats {
        self.producers
            .get(i)
            .map(|producer| producer.stats())
            .unwrap_or_default()
    }

    /// Closes every producer, then stops the worker pool.
    ///
    /// Every producer gets a close attempt even when earlier ones fail.
    pub async fn close(&self) -> Result<()> {
        let span = info_span!("fanout.writer.close", clusters = self.producers.len());
        async {
            let mut errors = ClusterErrors::with_capacity(self.producers.len());
            for (index, producer) in self.producers.iter().enumerate() {
                let result = producer.close().await;
                if let Err(err) = &result {
                    event!(Level::WARN, cluster = index, error = %err, "producer close failed");
                }
                errors.push(result.err().map(|err| err.at_cluster(index)));
            }

            self.pool.stop().await;
            errors.into_result()
        }
        .instrument(span)
        .await
    }

    fn advance(&self) -> usize {
        (self.next.fetch_add(1, Ordering::SeqCst) + 1) as usize
    }

    async fn attempt(&self, ctx: &Context, index: usize, messages: &[Message]) -> Result<()> {
        let ctx = ctx.with_timeout(self.configs[index].write_timeout);
        ctx.run(self.producers[index].write_messages(&ctx, messages))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryClusters;

    #[test]
    fn test_write_mode_parsing() {
        assert_eq!("multi-write".parse::<WriteMode>().unwrap(), WriteMode::MultiWrite);
        assert_eq!("Primary-Backup".parse::<WriteMode>().unwrap(), WriteMode::PrimaryBackup);
        assert!("mirror".parse::<WriteMode>().is_err());
        assert_eq!(WriteMode::PrimaryBackup.to_string(), "primary-backup");
        assert_eq!(WriteMode::default(), WriteMode::MultiWrite);
    }

    #[test]
    fn test_write_mode_serde() {
        let json = serde_json::to_string(&WriteMode::PrimaryBackup).unwrap();
        assert_eq!(json, "\"primary-backup\"");
        let mode: WriteMode = serde_json::from_str("\"multi-write\"").unwrap();
        assert_eq!(mode, WriteMode::MultiWrite);
    }

    #[tokio::test]
    #[should_panic(expected = "at least one cluster")]
    async fn test_empty_configs_panic() {
        let clusters = InMemoryClusters::new();
        let _ = Writer::new(WriteMode::MultiWrite, Vec::new(), &clusters).await;
    }

    #[tokio::test]
    async fn test_connect_failure_closes_opened_producers() {
        let clusters = InMemoryClusters::new();
        let a = clusters.create("mem-a").await.unwrap();
        a.faults().fail_close(true);
        let configs = vec![
            WriterConfig::new(&["mem-a"], "events"),
            WriterConfig::new(&["missing"], "events"),
        ];

        let err = Writer::new(WriteMode::MultiWrite, configs, &clusters)
            .await
            .err()
            .unwrap();
        assert_eq!(err.cluster_index(), Some(1));
        assert!(matches!(
            err,
            MqError::AtCluster { ref source, .. } if matches!(**source, MqError::Connection(_))
        ));
        assert_eq!(a.faults().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_stats_out_of_range_is_empty() {
        let clusters = InMemoryClusters::new();
        clusters.create("mem-a").await.unwrap();
        let writer = Writer::new(
            WriteMode::PrimaryBackup,
            vec![WriterConfig::new(&["mem-a"], "events")],
            &clusters,
        )
        .await
        .unwrap();

        assert_eq!(writer.stats(1), WriterStats::default());
        assert_eq!(writer.mode(), WriteMode::PrimaryBackup);
        writer.close().await.unwrap();
        assert!(writer.pool_stats().stopped);
    }
}
