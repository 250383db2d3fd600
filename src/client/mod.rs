//! Boundary to the per-cluster message-queue clients.
//!
//! The reader and writer only orchestrate; everything that talks to a broker sits
//! behind [`ClusterConsumer`] and [`ClusterProducer`]. Implementations must be safe to
//! call concurrently: a read or write can be in flight while accessors are invoked.

pub mod memory;
pub mod stats;

use crate::config::{ReaderConfig, WriterConfig};
use crate::core::{Context, Message, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use memory::{FaultPlan, InMemoryCluster, InMemoryClusters, InMemoryConsumer, InMemoryProducer};
pub use stats::{ReaderStats, WriterStats};

/// A consumer bound to one cluster.
#[async_trait]
pub trait ClusterConsumer: Send + Sync {
    /// Blocks until the next message is available or `ctx` is done.
    ///
    /// Group-backed consumers commit the offset of the returned message.
    async fn read_message(&self, ctx: &Context) -> Result<Message>;

    /// Lag of the last message returned, or -1 for group-backed consumers.
    fn lag(&self) -> i64;

    /// Current absolute offset, or -1 for group-backed consumers.
    fn offset(&self) -> i64;

    /// Fetches the end of the partition and returns the distance to the current offset.
    async fn read_lag(&self, ctx: &Context) -> Result<i64>;

    /// Moves the read position. Accepts `FIRST_OFFSET` and `LAST_OFFSET`.
    async fn set_offset(&self, offset: i64) -> Result<()>;

    /// Moves the read position to the first message at or after `at`.
    async fn set_offset_at(&self, ctx: &Context, at: DateTime<Utc>) -> Result<()>;

    /// Counters since the previous call.
    fn stats(&self) -> ReaderStats;

    async fn close(&self) -> Result<()>;
}

/// A producer bound to one cluster.
#[async_trait]
pub trait ClusterProducer: Send + Sync {
    async fn write_messages(&self, ctx: &Context, messages: &[Message]) -> Result<()>;

    /// Counters since the previous call.
    fn stats(&self) -> WriterStats;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<()>;
}

/// Opens consumers from reader configs.
#[async_trait]
pub trait ConsumerConnector: Send + Sync {
    async fn connect(&self, config: &ReaderConfig) -> Result<Arc<dyn ClusterConsumer>>;
}

/// Opens producers from writer configs.
#[async_trait]
pub trait ProducerConnector: Send + Sync {
    async fn connect(&self, config: &WriterConfig) -> Result<Arc<dyn ClusterProducer>>;
}
