use super::stats::{Counters, ReaderStats, WriterStats};
use super::{ClusterConsumer, ClusterProducer, ConsumerConnector, ProducerConnector};
use crate::config::{ReaderConfig, WriterConfig};
use crate::core::{Context, FIRST_OFFSET, LAST_OFFSET, Message, MqError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Failures and latency injected into an in-memory cluster, plus call counters.
#[derive(Debug, Default)]
pub struct FaultPlan {
    failing_reads: AtomicUsize,
    failing_writes: AtomicUsize,
    unavailable: AtomicBool,
    failing_close: AtomicBool,
    read_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl FaultPlan {
    /// Makes the next `n` reads on this cluster fail.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` writes on this cluster fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Fails every read and write until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    /// Makes every client close on this cluster report a failure.
    pub fn fail_close(&self, fail: bool) {
        self.failing_close.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms.load(Ordering::SeqCst))
    }

    fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms.load(Ordering::SeqCst))
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_read(&self, cluster: &str) -> Result<()> {
        if self.is_unavailable() {
            return Err(MqError::Read(format!("cluster '{}' is unavailable", cluster)));
        }
        if Self::take_one(&self.failing_reads) {
            warn!("injected read failure on cluster '{}'", cluster);
            return Err(MqError::Read(format!(
                "injected read failure on cluster '{}'",
                cluster
            )));
        }
        Ok(())
    }

    fn check_write(&self, cluster: &str) -> Result<()> {
        if self.is_unavailable() {
            return Err(MqError::Write(format!("cluster '{}' is unavailable", cluster)));
        }
        if Self::take_one(&self.failing_writes) {
            warn!("injected write failure on cluster '{}'", cluster);
            return Err(MqError::Write(format!(
                "injected write failure on cluster '{}'",
                cluster
            )));
        }
        Ok(())
    }
}

/// Per-topic logs and committed group offsets of one cluster.
#[derive(Default)]
struct ClusterState {
    logs: HashMap<String, Vec<Message>>,
    group_offsets: HashMap<(String, String), i64>,
}

impl ClusterState {
    fn end_offset(&self, topic: &str) -> i64 {
        self.logs.get(topic).map_or(0, |log| log.len() as i64)
    }

    /// Turns the `FIRST_OFFSET` / `LAST_OFFSET` sentinels into absolute offsets.
    fn resolve(&self, topic: &str, offset: i64) -> i64 {
        match offset {
            FIRST_OFFSET => 0,
            LAST_OFFSET => self.end_offset(topic),
            absolute => absolute,
        }
    }
}

struct ClusterInner {
    name: String,
    state: Mutex<ClusterState>,
    appended: watch::Sender<u64>,
    faults: FaultPlan,
}

/// A broker cluster living in process memory.
///
/// Every topic has a single partition 0. Cloning shares the same cluster.
#[derive(Clone)]
pub struct InMemoryCluster {
    inner: Arc<ClusterInner>,
}

impl InMemoryCluster {
    pub fn new(name: impl Into<String>) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            inner: Arc::new(ClusterInner {
                name: name.into(),
                state: Mutex::new(ClusterState::default()),
                appended,
                faults: FaultPlan::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.inner.faults
    }

    /// Appends messages to a topic and returns their offsets.
    ///
    /// Topic, partition and offset are overwritten; a missing timestamp is set to now.
    pub async fn append(&self, topic: &str, messages: &[Message]) -> Vec<i64> {
        let offsets = {
            let mut state = self.inner.state.lock().await;
            let log = state.logs.entry(topic.to_string()).or_default();
            let now = Utc::now();
            messages
                .iter()
                .map(|message| {
                    let mut stored = message.clone();
                    stored.topic = topic.to_string();
                    stored.partition = 0;
                    stored.offset = log.len() as i64;
                    stored.time = Some(stored.time.unwrap_or(now));
                    let offset = stored.offset;
                    log.push(stored);
                    offset
                })
                .collect::<Vec<_>>()
        };

        if !offsets.is_empty() {
            self.inner
                .appended
                .send_modify(|total| *total += offsets.len() as u64);
        }
        offsets
    }

    /// Returns a copy of every message stored for `topic`.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        let state = self.inner.state.lock().await;
        state.logs.get(topic).cloned().unwrap_or_default()
    }

    pub async fn end_offset(&self, topic: &str) -> i64 {
        self.inner.state.lock().await.end_offset(topic)
    }

    /// Next offset the group will read from `topic`, if it has committed anything.
    pub async fn committed_offset(&self, group: &str, topic: &str) -> Option<i64> {
        let state = self.inner.state.lock().await;
        state
            .group_offsets
            .get(&(group.to_string(), topic.to_string()))
            .copied()
    }

    pub fn consumer(&self, config: &ReaderConfig) -> InMemoryConsumer {
        InMemoryConsumer {
            cluster: self.clone(),
            config: config.clone(),
            client_id: format!("{}-consumer-{}", self.name(), Uuid::new_v4()),
            offset: AtomicI64::new(config.start_offset),
            lag: AtomicI64::new(0),
            shutdown: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    pub fn producer(&self, config: &WriterConfig) -> InMemoryProducer {
        InMemoryProducer {
            cluster: self.clone(),
            config: config.clone(),
            client_id: format!("{}-producer-{}", self.name(), Uuid::new_v4()),
            shutdown: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    fn close_client(&self) -> Result<()> {
        self.inner.faults.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.faults.failing_close.load(Ordering::SeqCst) {
            return Err(MqError::Close(format!(
                "injected close failure on cluster '{}'",
                self.name()
            )));
        }
        Ok(())
    }
}

/// Consumer reading one topic of an [`InMemoryCluster`].
pub struct InMemoryConsumer {
    cluster: InMemoryCluster,
    config: ReaderConfig,
    client_id: String,
    offset: AtomicI64,
    lag: AtomicI64,
    shutdown: CancellationToken,
    counters: Counters,
}

impl InMemoryConsumer {
    fn group_key(&self) -> Option<(String, String)> {
        self.config
            .group_id
            .as_ref()
            .map(|group| (group.clone(), self.config.topic.clone()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            Err(MqError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_partition_reader(&self, operation: &str) -> Result<()> {
        if self.config.group_id.is_some() {
            return Err(MqError::Offset(format!(
                "{} is not available with consumer groups",
                operation
            )));
        }
        Ok(())
    }

    /// Takes the next message if one is stored, advancing the read position.
    async fn try_next(&self) -> Option<Message> {
        let topic = self.config.topic.as_str();
        let mut state = self.cluster.inner.state.lock().await;
        let end = state.end_offset(topic);

        let position = match self.group_key() {
            Some(key) => {
                let start = state.resolve(topic, self.config.start_offset);
                *state.group_offsets.entry(key).or_insert(start)
            }
            None => {
                let raw = self.offset.load(Ordering::SeqCst);
                let resolved = state.resolve(topic, raw);
                if resolved != raw {
                    self.offset.store(resolved, Ordering::SeqCst);
                }
                resolved
            }
        };

        let message = state.logs.get(topic)?.get(position as usize)?.clone();
        let next = position + 1;
        match self.group_key() {
            Some(key) => {
                state.group_offsets.insert(key, next);
            }
            None => self.offset.store(next, Ordering::SeqCst),
        }
        self.lag.store(end - next, Ordering::SeqCst);
        Some(message)
    }

    async fn next_message(&self, ctx: &Context) -> Result<Message> {
        self.ensure_open()?;
        self.cluster.faults().check_read(self.cluster.name())?;

        let delay = self.cluster.faults().read_delay();
        if !delay.is_zero() {
            ctx.run(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }

        let mut appended = self.cluster.inner.appended.subscribe();
        loop {
            appended.borrow_and_update();
            if let Some(message) = self.try_next().await {
                return Ok(message);
            }
            tokio::select! {
                changed = appended.changed() => {
                    if changed.is_err() {
                        return Err(MqError::Closed);
                    }
                }
                _ = self.shutdown.cancelled() => return Err(MqError::Closed),
                err = ctx.done() => return Err(err),
            }
        }
    }
}

#[async_trait]
impl ClusterConsumer for InMemoryConsumer {
    async fn read_message(&self, ctx: &Context) -> Result<Message> {
        self.cluster
            .inner
            .faults
            .read_calls
            .fetch_add(1, Ordering::SeqCst);

        let result = self.next_message(ctx).await;
        match &result {
            Ok(message) => self.counters.record_success(1, message.size() as u64),
            Err(err) if !err.is_canceled() => self.counters.record_error(),
            Err(_) => {}
        }
        result
    }

    fn lag(&self) -> i64 {
        if self.config.group_id.is_some() {
            return -1;
        }
        self.lag.load(Ordering::SeqCst)
    }

    fn offset(&self) -> i64 {
        if self.config.group_id.is_some() {
            return -1;
        }
        self.offset.load(Ordering::SeqCst)
    }

    async fn read_lag(&self, ctx: &Context) -> Result<i64> {
        self.ensure_open()?;
        self.ensure_partition_reader("read_lag")?;
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let state = self.cluster.inner.state.lock().await;
        let topic = self.config.topic.as_str();
        let position = state.resolve(topic, self.offset.load(Ordering::SeqCst));
        Ok((state.end_offset(topic) - position).max(0))
    }

    async fn set_offset(&self, offset: i64) -> Result<()> {
        self.ensure_open()?;
        self.ensure_partition_reader("set_offset")?;
        if offset < FIRST_OFFSET {
            return Err(MqError::Offset(format!("invalid offset {}", offset)));
        }
        self.offset.store(offset, Ordering::SeqCst);
        Ok(())
    }

    async fn set_offset_at(&self, ctx: &Context, at: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.ensure_partition_reader("set_offset_at")?;
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let state = self.cluster.inner.state.lock().await;
        let topic = self.config.topic.as_str();
        let offset = state
            .logs
            .get(topic)
            .and_then(|log| {
                log.iter()
                    .find(|message| message.time.is_some_and(|time| time >= at))
                    .map(|message| message.offset)
            })
            .unwrap_or_else(|| state.end_offset(topic));
        debug!(
            "consumer {} moved to offset {} for timestamp {}",
            self.client_id, offset, at
        );
        self.offset.store(offset, Ordering::SeqCst);
        Ok(())
    }

    fn stats(&self) -> ReaderStats {
        let snapshot = self.counters.take();
        ReaderStats {
            client_id: self.client_id.clone(),
            topic: self.config.topic.clone(),
            partition: self.config.partition,
            fetches: snapshot.calls,
            messages: snapshot.messages,
            bytes: snapshot.bytes,
            errors: snapshot.errors,
            offset: self.offset(),
            lag: self.lag(),
        }
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.cluster.close_client()
    }
}

/// Producer appending to one topic of an [`InMemoryCluster`].
pub struct InMemoryProducer {
    cluster: InMemoryCluster,
    config: WriterConfig,
    client_id: String,
    shutdown: CancellationToken,
    counters: Counters,
}

impl InMemoryProducer {
    async fn append(&self, ctx: &Context, messages: &[Message]) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(MqError::Closed);
        }
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        self.cluster.faults().check_write(self.cluster.name())?;

        let delay = self.cluster.faults().write_delay();
        ctx.run(async {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.cluster.append(&self.config.topic, messages).await;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ClusterProducer for InMemoryProducer {
    async fn write_messages(&self, ctx: &Context, messages: &[Message]) -> Result<()> {
        self.cluster
            .inner
            .faults
            .write_calls
            .fetch_add(1, Ordering::SeqCst);

        let result = self.append(ctx, messages).await;
        match &result {
            Ok(()) => {
                let bytes: usize = messages.iter().map(Message::size).sum();
                self.counters
                    .record_success(messages.len() as u64, bytes as u64);
            }
            Err(_) => self.counters.record_error(),
        }
        result
    }

    fn stats(&self) -> WriterStats {
        let snapshot = self.counters.take();
        WriterStats {
            client_id: self.client_id.clone(),
            topic: self.config.topic.clone(),
            writes: snapshot.calls,
            messages: snapshot.messages,
            bytes: snapshot.bytes,
            errors: snapshot.errors,
        }
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.cluster.close_client()
    }
}

/// Registry resolving broker addresses to in-memory clusters.
///
/// Acts as the connector for both readers and writers.
#[derive(Clone, Default)]
pub struct InMemoryClusters {
    brokers: Arc<Mutex<HashMap<String, InMemoryCluster>>>,
}

impl InMemoryClusters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cluster` as reachable through `broker`.
    pub async fn register(&self, broker: impl Into<String>, cluster: InMemoryCluster) -> Result<()> {
        let broker = broker.into();
        if broker.trim().is_empty() {
            return Err(MqError::Config(
                "broker address must not be empty".to_string(),
            ));
        }
        let mut brokers = self.brokers.lock().await;
        if let Some(existing) = brokers.get(&broker) {
            if !Arc::ptr_eq(&existing.inner, &cluster.inner) {
                return Err(MqError::Config(format!(
                    "broker '{}' already belongs to cluster '{}'",
                    broker,
                    existing.name()
                )));
            }
        }
        brokers.insert(broker, cluster);
        Ok(())
    }

    /// Creates a cluster named after `broker` and registers it.
    pub async fn create(&self, broker: &str) -> Result<InMemoryCluster> {
        let cluster = InMemoryCluster::new(broker);
        self.register(broker, cluster.clone()).await?;
        Ok(cluster)
    }

    pub async fn cluster(&self, broker: &str) -> Option<InMemoryCluster> {
        self.brokers.lock().await.get(broker).cloned()
    }

    async fn resolve(&self, addresses: &[String]) -> Result<InMemoryCluster> {
        let brokers = self.brokers.lock().await;
        let mut resolved: Option<&InMemoryCluster> = None;
        for address in addresses {
            let Some(cluster) = brokers.get(address) else {
                continue;
            };
            match resolved {
                Some(current) if !Arc::ptr_eq(&current.inner, &cluster.inner) => {
                    return Err(MqError::Connection(format!(
                        "brokers {:?} span clusters '{}' and '{}'",
                        addresses,
                        current.name(),
                        cluster.name()
                    )));
                }
                _ => resolved = Some(cluster),
            }
        }
        resolved.cloned().ok_or_else(|| {
            MqError::Connection(format!("no reachable broker among {:?}", addresses))
        })
    }
}

#[async_trait]
impl ConsumerConnector for InMemoryClusters {
    async fn connect(&self, config: &ReaderConfig) -> Result<Arc<dyn ClusterConsumer>> {
        config.validate().map_err(MqError::Config)?;
        if config.partition != 0 {
            return Err(MqError::Connection(format!(
                "in-memory clusters only serve partition 0, got {}",
                config.partition
            )));
        }
        let cluster = self.resolve(&config.brokers).await?;
        Ok(Arc::new(cluster.consumer(config)))
    }
}

#[async_trait]
impl ProducerConnector for InMemoryClusters {
    async fn connect(&self, config: &WriterConfig) -> Result<Arc<dyn ClusterProducer>> {
        config.validate().map_err(MqError::Config)?;
        let cluster = self.resolve(&config.brokers).await?;
        Ok(Arc::new(cluster.producer(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_config(group: Option<&str>) -> ReaderConfig {
        let config = ReaderConfig::new(&["mem-a"], "events");
        match group {
            Some(group) => config.group_id(group),
            None => config,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_offsets_and_time() {
        let cluster = InMemoryCluster::new("mem-a");
        let offsets = cluster
            .append("events", &[Message::from_value("a"), Message::from_value("b")])
            .await;

        assert_eq!(offsets, vec![0, 1]);
        let stored = cluster.messages("events").await;
        assert_eq!(stored[1].topic, "events");
        assert_eq!(stored[1].offset, 1);
        assert!(stored[1].time.is_some());
        assert_eq!(cluster.end_offset("events").await, 2);
    }

    #[tokio::test]
    async fn test_partition_consumer_reads_in_order() {
        let cluster = InMemoryCluster::new("mem-a");
        cluster
            .append("events", &[Message::from_value("a"), Message::from_value("b")])
            .await;

        let consumer = cluster.consumer(&reader_config(None));
        let ctx = Context::background();
        assert_eq!(consumer.read_message(&ctx).await.unwrap().value, b"a");
        assert_eq!(consumer.read_message(&ctx).await.unwrap().value, b"b");
        assert_eq!(consumer.offset(), 2);
        assert_eq!(consumer.lag(), 0);
    }

    #[tokio::test]
    async fn test_read_blocks_until_append() {
        let cluster = InMemoryCluster::new("mem-a");
        let consumer = cluster.consumer(&reader_config(None));

        let writer = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append("events", &[Message::from_value("late")]).await;
        });

        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        let message = consumer.read_message(&ctx).await.unwrap();
        assert_eq!(message.value, b"late");
    }

    #[tokio::test]
    async fn test_read_honours_context() {
        let cluster = InMemoryCluster::new("mem-a");
        let consumer = cluster.consumer(&reader_config(None));

        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let err = consumer.read_message(&ctx).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[tokio::test]
    async fn test_group_consumers_share_committed_offset() {
        let cluster = InMemoryCluster::new("mem-a");
        cluster
            .append("events", &[Message::from_value("a"), Message::from_value("b")])
            .await;

        let first = cluster.consumer(&reader_config(Some("g")));
        let second = cluster.consumer(&reader_config(Some("g")));
        let ctx = Context::background();

        assert_eq!(first.read_message(&ctx).await.unwrap().value, b"a");
        assert_eq!(second.read_message(&ctx).await.unwrap().value, b"b");
        assert_eq!(cluster.committed_offset("g", "events").await, Some(2));
        assert_eq!(first.offset(), -1);
        assert_eq!(first.lag(), -1);
        assert!(matches!(first.set_offset(0).await, Err(MqError::Offset(_))));
    }

    #[tokio::test]
    async fn test_set_offset_and_read_lag() {
        let cluster = InMemoryCluster::new("mem-a");
        let messages: Vec<Message> = (0..5).map(|i| Message::from_value(format!("m{}", i))).collect();
        cluster.append("events", &messages).await;

        let consumer = cluster.consumer(&reader_config(None));
        let ctx = Context::background();
        consumer.set_offset(3).await.unwrap();
        assert_eq!(consumer.read_lag(&ctx).await.unwrap(), 2);
        assert_eq!(consumer.read_message(&ctx).await.unwrap().value, b"m3");

        consumer.set_offset(LAST_OFFSET).await.unwrap();
        assert_eq!(consumer.read_lag(&ctx).await.unwrap(), 0);
        assert!(consumer.set_offset(-9).await.is_err());
    }

    #[tokio::test]
    async fn test_set_offset_at_timestamp() {
        let cluster = InMemoryCluster::new("mem-a");
        let base = Utc::now();
        let messages: Vec<Message> = (0..3)
            .map(|i| Message::from_value(format!("m{}", i)).with_time(base + chrono::Duration::seconds(i)))
            .collect();
        cluster.append("events", &messages).await;

        let consumer = cluster.consumer(&reader_config(None));
        let ctx = Context::background();
        consumer
            .set_offset_at(&ctx, base + chrono::Duration::milliseconds(500))
            .await
            .unwrap();
        assert_eq!(consumer.offset(), 1);

        consumer
            .set_offset_at(&ctx, base + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(consumer.offset(), 3);
    }

    #[tokio::test]
    async fn test_injected_faults_and_counters() {
        let cluster = InMemoryCluster::new("mem-a");
        let producer = cluster.producer(&WriterConfig::new(&["mem-a"], "events"));
        let ctx = Context::background();

        cluster.faults().fail_next_writes(1);
        assert!(producer.write_messages(&ctx, &[Message::from_value("x")]).await.is_err());
        assert!(producer.write_messages(&ctx, &[Message::from_value("x")]).await.is_ok());
        assert_eq!(cluster.faults().write_calls(), 2);

        let stats = producer.stats();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.messages, 1);

        cluster.faults().set_unavailable(true);
        let consumer = cluster.consumer(&reader_config(None));
        assert!(matches!(consumer.read_message(&ctx).await, Err(MqError::Read(_))));
        assert_eq!(consumer.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_closed_clients_reject_calls() {
        let cluster = InMemoryCluster::new("mem-a");
        let consumer = cluster.consumer(&reader_config(None));
        let producer = cluster.producer(&WriterConfig::new(&["mem-a"], "events"));
        let ctx = Context::background();

        consumer.close().await.unwrap();
        producer.close().await.unwrap();
        assert!(matches!(consumer.read_message(&ctx).await, Err(MqError::Closed)));
        assert!(matches!(
            producer.write_messages(&ctx, &[Message::from_value("x")]).await,
            Err(MqError::Closed)
        ));

        cluster.faults().fail_close(true);
        assert!(matches!(consumer.close().await, Err(MqError::Close(_))));
        assert_eq!(cluster.faults().close_calls(), 3);
    }

    #[tokio::test]
    async fn test_registry_resolution() {
        let clusters = InMemoryClusters::new();
        let a = clusters.create("mem-a:9092").await.unwrap();
        clusters.register("mem-a:9093", a.clone()).await.unwrap();
        clusters.create("mem-b:9092").await.unwrap();

        assert!(clusters.register("mem-a:9092", InMemoryCluster::new("other")).await.is_err());
        assert!(clusters.register(" ", InMemoryCluster::new("blank")).await.is_err());

        let config = ReaderConfig::new(&["unknown:1", "mem-a:9093"], "events");
        assert!(ConsumerConnector::connect(&clusters, &config).await.is_ok());

        let unreachable = ReaderConfig::new(&["unknown:1"], "events");
        assert!(matches!(
            ConsumerConnector::connect(&clusters, &unreachable).await,
            Err(MqError::Connection(_))
        ));

        let split = WriterConfig::new(&["mem-a:9092", "mem-b:9092"], "events");
        assert!(matches!(
            ProducerConnector::connect(&clusters, &split).await,
            Err(MqError::Connection(_))
        ));
    }
}
