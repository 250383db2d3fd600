// ============================================================================
// fanout-mq Library
// ============================================================================

pub mod core;
pub mod client;
pub mod config;
pub mod pool;
pub mod reader;
pub mod writer;
pub mod sync;

// Re-export main types for convenience
pub use core::{ClusterErrors, Context, FIRST_OFFSET, Header, LAST_OFFSET, Message, MqError, Result};
pub use config::{FanoutConfig, ReaderConfig, RequiredAcks, WriterConfig};
pub use pool::{PoolStats, WorkerPool};
pub use reader::Reader;
pub use writer::{WriteMode, Writer};

// Re-export client boundary
pub use client::{
    ClusterConsumer, ClusterProducer, ConsumerConnector, ProducerConnector, ReaderStats,
    WriterStats,
    memory::{FaultPlan, InMemoryCluster, InMemoryClusters},
};

use tracing::{Level, event};

// ============================================================================
// High-level Client API
// ============================================================================

/// Reader and writer opened together from one [`FanoutConfig`].
///
/// Either side is optional: a config without readers yields a write-only client and
/// the other way round.
///
/// # Examples
///
/// ```
/// use fanout_mq::{Client, Context, FanoutConfig, InMemoryClusters, Message};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clusters = InMemoryClusters::new();
/// clusters.create("mem-a:9092").await?;
/// clusters.create("mem-b:9092").await?;
///
/// let config = FanoutConfig::from_json(r#"{
///     "mode": "multi-write",
///     "readers": [
///         {"brokers": ["mem-a:9092"], "topic": "events", "group_id": "docs"},
///         {"brokers": ["mem-b:9092"], "topic": "events", "group_id": "docs"}
///     ],
///     "writers": [
///         {"brokers": ["mem-a:9092"], "topic": "events"},
///         {"brokers": ["mem-b:9092"], "topic": "events"}
///     ]
/// }"#)?;
///
/// let client = Client::connect(&config, &clusters).await?;
/// let ctx = Context::background();
/// client.write(&ctx, &[Message::new("k", "hello")]).await?;
///
/// let messages = client.read(&ctx).await?;
/// assert_eq!(messages[0].value, b"hello");
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    reader: Option<Reader>,
    writer: Option<Writer>,
}

impl Client {
    /// Opens the reader and writer described by `config`.
    pub async fn connect<C>(config: &FanoutConfig, connector: &C) -> Result<Self>
    where
        C: ConsumerConnector + ProducerConnector,
    {
        config.validate()?;

        let writer = if config.writers.is_empty() {
            None
        } else {
            Some(Writer::new(config.mode, config.writers.clone(), connector).await?)
        };

        let reader = if config.readers.is_empty() {
            None
        } else {
            match Reader::new(config.readers.clone(), connector).await {
                Ok(reader) => Some(reader),
                Err(err) => {
                    if let Some(writer) = &writer {
                        if let Err(close_err) = writer.close().await {
                            event!(Level::WARN, error = %close_err, "writer close failed");
                        }
                    }
                    return Err(err);
                }
            }
        };

        Ok(Self { reader, writer })
    }

    pub fn reader(&self) -> Option<&Reader> {
        self.reader.as_ref()
    }

    pub fn writer(&self) -> Option<&Writer> {
        self.writer.as_ref()
    }

    /// Reads through the fan-in reader.
    pub async fn read(&self, ctx: &Context) -> Result<Vec<Message>> {
        match &self.reader {
            Some(reader) => reader.read_message(ctx).await,
            None => Err(MqError::Config("client has no reader clusters".to_string())),
        }
    }

    /// Writes through the failover writer.
    pub async fn write(&self, ctx: &Context, messages: &[Message]) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.write_messages(ctx, messages).await,
            None => Err(MqError::Config("client has no writer clusters".to_string())),
        }
    }

    /// Closes the writer, then the reader, aggregating both outcomes.
    pub async fn close(&self) -> Result<()> {
        let mut errors = ClusterErrors::with_capacity(2);
        if let Some(writer) = &self.writer {
            errors.push(writer.close().await.err());
        }
        if let Some(reader) = &self.reader {
            errors.push(reader.close().await.err());
        }
        errors.into_result()
    }
}
