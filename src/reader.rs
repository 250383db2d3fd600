use crate::client::{ClusterConsumer, ConsumerConnector, ReaderStats};
use crate::config::ReaderConfig;
use crate::core::{ClusterErrors, Context, Message, MqError, Result};
use crate::pool::{PoolStats, WorkerPool};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{Instrument, Level, event, info_span};

/// Reader over several independent clusters.
///
/// Every [`read_message`](Reader::read_message) races one read per cluster and returns
/// as soon as any of them yields a message; the other reads are cancelled.
pub struct Reader {
    configs: Vec<ReaderConfig>,
    /// Rotates which cluster is tried first
    next: AtomicU64,
    consumers: Vec<Arc<dyn ClusterConsumer>>,
    pool: WorkerPool,
}

/// Shared by the read tasks of one `read_message` call.
struct ReadOutcome {
    messages: Vec<Message>,
    errors: ClusterErrors,
}

impl Reader {
    /// Opens one consumer per config, in order.
    ///
    /// # Panics
    ///
    /// Panics if `configs` is empty.
    pub async fn new<C>(configs: Vec<ReaderConfig>, connector: &C) -> Result<Self>
    where
        C: ConsumerConnector + ?Sized,
    {
        assert!(!configs.is_empty(), "must configure at least one cluster");

        let mut consumers: Vec<Arc<dyn ClusterConsumer>> = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            match connector.connect(config).await {
                Ok(consumer) => consumers.push(consumer),
                Err(err) => {
                    event!(Level::ERROR, cluster = index, error = %err, "consumer connect failed");
                    for (opened, consumer) in consumers.iter().enumerate() {
                        if let Err(close_err) = consumer.close().await {
                            event!(Level::WARN, cluster = opened, error = %close_err, "consumer close failed");
                        }
                    }
                    return Err(err.at_cluster(index));
                }
            }
        }

        let n = configs.len();
        event!(Level::DEBUG, clusters = n, "reader opened");
        Ok(Self {
            configs,
            next: AtomicU64::new(0),
            consumers,
            pool: WorkerPool::new(n),
        })
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn configs(&self) -> &[ReaderConfig] {
        &self.configs
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Reads the next message from whichever cluster delivers first.
    ///
    /// Blocks until at least one cluster yields a message or every cluster fails.
    /// Usually one message is returned; several may come back when clusters deliver
    /// at the same instant. Group-backed consumers commit what they return, so a
    /// message may be committed before the caller has processed it.
    ///
    /// Fails with the aggregated per-cluster errors when no cluster delivered, or with
    /// [`MqError::Canceled`] when every read was cancelled by the caller.
    pub async fn read_message(&self, ctx: &Context) -> Result<Vec<Message>> {
        let n = self.consumers.len();
        let ctx = ctx.child();
        let start = ((self.next.fetch_add(1, Ordering::SeqCst) + 1) % n as u64) as usize;

        let span = info_span!("fanout.reader.read", start, clusters = n);
        async move {
            let outcome = Arc::new(Mutex::new(ReadOutcome {
                messages: Vec::new(),
                errors: ClusterErrors::with_capacity(n),
            }));

            let mut handles = Vec::with_capacity(n);
            let mut rejected = None;
            for i in 0..n {
                let index = (start + i) % n;
                let consumer = Arc::clone(&self.consumers[index]);
                let task_ctx = ctx.clone();
                let outcome = Arc::clone(&outcome);

                let task = async move {
                    let result = task_ctx.run(consumer.read_message(&task_ctx)).await;
                    let mut outcome = outcome.lock().await;
                    match result {
                        Ok(message) => {
                            outcome.messages.push(message);
                            outcome.errors.push(None);
                            task_ctx.cancel();
                        }
                        Err(err) if err.is_canceled() => outcome.errors.push(None),
                        Err(err) => {
                            event!(Level::WARN, cluster = index, error = %err, "cluster read failed");
                            outcome.errors.push(Some(err.at_cluster(index)));
                        }
                    }
                };

                match self.pool.submit_with(&ctx, task) {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        rejected = Some(err);
                        ctx.cancel();
                        break;
                    }
                }
            }

            let mut abandoned = 0;
            for joined in join_all(handles).await {
                match joined {
                    Ok(Some(())) => {}
                    Ok(None) => abandoned += 1,
                    Err(err) => event!(Level::ERROR, error = %err, "read task panicked"),
                }
            }

            if let Some(err) = rejected {
                return Err(err);
            }

            let mut outcome = outcome.lock().await;
            // Reads that never got a pool slot before the context ended.
            for _ in 0..abandoned {
                outcome.errors.push(None);
            }
            if !outcome.messages.is_empty() {
                event!(
                    Level::DEBUG,
                    messages = outcome.messages.len(),
                    failed = outcome.errors.count(),
                    "read completed"
                );
                return Ok(std::mem::take(&mut outcome.messages));
            }

            let errors = std::mem::take(&mut outcome.errors);
            if errors.count() == 0 {
                return Err(ctx.err().unwrap_or(MqError::Canceled));
            }
            event!(Level::WARN, error = %errors, "every cluster failed to deliver");
            Err(MqError::Cluster(errors))
        }
        .instrument(span)
        .await
    }

    /// Lag of the last message read from cluster `i`; 0 when `i` is out of range.
    pub fn lag(&self, i: usize) -> i64 {
        self.consumers.get(i).map_or(0, |consumer| consumer.lag())
    }

    /// Current offset of cluster `i`; 0 when `i` is out of range.
    pub fn offset(&self, i: usize) -> i64 {
        self.consumers.get(i).map_or(0, |consumer| consumer.offset())
    }

    /// Fetches the current lag of cluster `i` from its brokers.
    pub async fn read_lag(&self, ctx: &Context, i: usize) -> Result<i64> {
        self.consumer(i)?.read_lag(ctx).await
    }

    /// Changes the offset the next read on cluster `i` starts from.
    pub async fn set_offset(&self, i: usize, offset: i64) -> Result<()> {
        self.consumer(i)?.set_offset(offset).await
    }

    /// Moves cluster `i` to the first message at or after `at`.
    pub async fn set_offset_at(&self, ctx: &Context, i: usize, at: DateTime<Utc>) -> Result<()> {
        self.consumer(i)?.set_offset_at(ctx, at).await
    }

    /// Stats of cluster `i` since the previous call; empty when `i` is out of range.
    pub fn stats(&self, i: usize) -> ReaderStats {
        self.consumers
            .get(i)
            .map(|consumer| consumer.stats())
            .unwrap_or_default()
    }

    /// Closes every consumer, then stops the worker pool.
    ///
    /// Every consumer gets a close attempt even when earlier ones fail.
    pub async fn close(&self) -> Result<()> {
        let span = info_span!("fanout.reader.close", clusters = self.consumers.len());
        async {
            let mut errors = ClusterErrors::with_capacity(self.consumers.len());
            for (index, consumer) in self.consumers.iter().enumerate() {
                let result = consumer.close().await;
                if let Err(err) = &result {
                    event!(Level::WARN, cluster = index, error = %err, "consumer close failed");
                }
                errors.push(result.err().map(|err| err.at_cluster(index)));
            }

            self.pool.stop().await;
            errors.into_result()
        }
        .instrument(span)
        .await
    }

    fn consumer(&self, i: usize) -> Result<&Arc<dyn ClusterConsumer>> {
        self.consumers.get(i).ok_or(MqError::IndexOutOfRange {
            index: i,
            clusters: self.consumers.len(),
        })
    }
}
