use crate::core::{FIRST_OFFSET, MqError, Result};
use crate::writer::WriteMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const URL_SCHEME: &str = "mq://";

/// Connection settings for one cluster on the read side.
///
/// Mirrors what a consumer needs: where the brokers are, which topic to follow and
/// whether offsets are tracked by a consumer group or by partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Broker addresses of the cluster
    pub brokers: Vec<String>,

    /// Topic to consume
    pub topic: String,

    /// Consumer group; offsets are committed to the cluster when set
    #[serde(default)]
    pub group_id: Option<String>,

    /// Partition to read when no group is used
    #[serde(default)]
    pub partition: i32,

    /// Minimum batch size the broker should accumulate before answering a fetch
    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,

    /// Maximum batch size per fetch
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum time a fetch waits for `min_bytes`
    #[serde(default = "default_max_wait", with = "duration_ms")]
    pub max_wait: Duration,

    /// Where a consumer without committed offsets starts
    #[serde(default = "default_start_offset")]
    pub start_offset: i64,
}

fn default_min_bytes() -> usize {
    1
}

fn default_max_bytes() -> usize {
    1024 * 1024
}

fn default_max_wait() -> Duration {
    Duration::from_secs(10)
}

fn default_start_offset() -> i64 {
    FIRST_OFFSET
}

impl ReaderConfig {
    pub fn new<S: AsRef<str>>(brokers: &[S], topic: &str) -> Self {
        Self {
            brokers: brokers.iter().map(|b| b.as_ref().to_string()).collect(),
            topic: topic.to_string(),
            group_id: None,
            partition: 0,
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
            max_wait: default_max_wait(),
            start_offset: default_start_offset(),
        }
    }

    /// Set the consumer group
    pub fn group_id(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    /// Set the partition
    pub fn partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    pub fn min_bytes(mut self, min_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the start offset (`FIRST_OFFSET`, `LAST_OFFSET` or an absolute offset)
    pub fn start_offset(mut self, offset: i64) -> Self {
        self.start_offset = offset;
        self
    }

    /// Parse from connection string
    ///
    /// Format: "mq://broker1:9092,broker2:9092/topic?group=name&partition=0"
    ///
    /// # Examples
    ///
    /// ```
    /// # use fanout_mq::ReaderConfig;
    /// let config = ReaderConfig::from_url("mq://kafka-a:9092,kafka-b:9092/orders?group=billing")
    ///     .unwrap();
    /// assert_eq!(config.brokers.len(), 2);
    /// assert_eq!(config.group_id.as_deref(), Some("billing"));
    /// ```
    pub fn from_url(url: &str) -> std::result::Result<Self, String> {
        let parsed = ParsedUrl::parse(url)?;
        let mut config = Self::new(&parsed.brokers, &parsed.topic);

        for (key, value) in parsed.params {
            match key.as_str() {
                "group" => config.group_id = Some(value),
                "partition" => {
                    config.partition = value
                        .parse()
                        .map_err(|_| format!("Invalid partition '{}'", value))?
                }
                "start" => {
                    config.start_offset = match value.as_str() {
                        "first" => FIRST_OFFSET,
                        "last" => crate::core::LAST_OFFSET,
                        other => other
                            .parse()
                            .map_err(|_| format!("Invalid start offset '{}'", other))?,
                    }
                }
                other => return Err(format!("Unknown reader parameter '{}'", other)),
            }
        }

        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}/{}", URL_SCHEME, self.brokers.join(","), self.topic);
        match &self.group_id {
            Some(group) => url.push_str(&format!("?group={}", group)),
            None => url.push_str(&format!("?partition={}", self.partition)),
        }
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_endpoint(&self.brokers, &self.topic)?;

        if self.group_id.as_deref().is_some_and(|g| g.trim().is_empty()) {
            return Err("group_id cannot be blank".to_string());
        }

        if self.group_id.is_some() && self.partition != 0 {
            return Err("either partition or group_id may be specified, but not both".to_string());
        }

        if self.partition < 0 {
            return Err("partition must be >= 0".to_string());
        }

        if self.min_bytes > self.max_bytes {
            return Err("min_bytes cannot exceed max_bytes".to_string());
        }

        if self.start_offset < FIRST_OFFSET {
            return Err(format!("invalid start offset {}", self.start_offset));
        }

        Ok(())
    }
}

/// Acknowledgement level a producer waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredAcks {
    None,
    One,
    #[default]
    All,
}

/// Connection settings for one cluster on the write side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Broker addresses of the cluster
    pub brokers: Vec<String>,

    /// Topic to produce to
    pub topic: String,

    /// Messages buffered per partition before a flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Time a partial batch waits before being flushed
    #[serde(default = "default_batch_timeout", with = "duration_ms")]
    pub batch_timeout: Duration,

    /// Upper bound for one write attempt against this cluster
    #[serde(default = "default_write_timeout", with = "duration_ms")]
    pub write_timeout: Duration,

    #[serde(default)]
    pub required_acks: RequiredAcks,
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

impl WriterConfig {
    pub fn new<S: AsRef<str>>(brokers: &[S], topic: &str) -> Self {
        Self {
            brokers: brokers.iter().map(|b| b.as_ref().to_string()).collect(),
            topic: topic.to_string(),
            batch_size: default_batch_size(),
            batch_timeout: default_batch_timeout(),
            write_timeout: default_write_timeout(),
            required_acks: RequiredAcks::default(),
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Set the per-attempt write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn required_acks(mut self, acks: RequiredAcks) -> Self {
        self.required_acks = acks;
        self
    }

    /// Parse from connection string
    ///
    /// Format: "mq://broker1:9092,broker2:9092/topic?acks=all&timeout_ms=5000"
    pub fn from_url(url: &str) -> std::result::Result<Self, String> {
        let parsed = ParsedUrl::parse(url)?;
        let mut config = Self::new(&parsed.brokers, &parsed.topic);

        for (key, value) in parsed.params {
            match key.as_str() {
                "acks" => {
                    config.required_acks = match value.as_str() {
                        "none" | "0" => RequiredAcks::None,
                        "one" | "1" => RequiredAcks::One,
                        "all" | "-1" => RequiredAcks::All,
                        other => return Err(format!("Invalid acks '{}'", other)),
                    }
                }
                "timeout_ms" => {
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| format!("Invalid timeout_ms '{}'", value))?;
                    config.write_timeout = Duration::from_millis(ms);
                }
                "batch_size" => {
                    config.batch_size = value
                        .parse()
                        .map_err(|_| format!("Invalid batch_size '{}'", value))?
                }
                other => return Err(format!("Unknown writer parameter '{}'", other)),
            }
        }

        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        let acks = match self.required_acks {
            RequiredAcks::None => "none",
            RequiredAcks::One => "one",
            RequiredAcks::All => "all",
        };
        format!(
            "{}{}/{}?acks={}&timeout_ms={}",
            URL_SCHEME,
            self.brokers.join(","),
            self.topic,
            acks,
            self.write_timeout.as_millis()
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_endpoint(&self.brokers, &self.topic)?;

        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }

        if self.write_timeout.is_zero() {
            return Err("write_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

fn validate_endpoint(brokers: &[String], topic: &str) -> std::result::Result<(), String> {
    if brokers.is_empty() {
        return Err("at least one broker address is required".to_string());
    }

    if brokers.iter().any(|b| b.trim().is_empty()) {
        return Err("broker address cannot be empty".to_string());
    }

    if topic.trim().is_empty() {
        return Err("topic cannot be empty".to_string());
    }

    Ok(())
}

struct ParsedUrl {
    brokers: Vec<String>,
    topic: String,
    params: Vec<(String, String)>,
}

impl ParsedUrl {
    fn parse(url: &str) -> std::result::Result<Self, String> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| format!("URL must start with '{}'", URL_SCHEME))?;

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let (hosts, topic) = path
            .split_once('/')
            .ok_or_else(|| "Invalid broker/topic format".to_string())?;

        let brokers: Vec<String> = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if brokers.is_empty() {
            return Err("URL must name at least one broker".to_string());
        }
        if topic.is_empty() || topic.contains('/') {
            return Err("Invalid topic".to_string());
        }

        let mut params = Vec::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid parameter '{}'", pair))?;
                params.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            brokers,
            topic: topic.to_string(),
            params,
        })
    }
}

/// Full deployment description: every cluster for both sides plus the write mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutConfig {
    #[serde(default)]
    pub mode: WriteMode,

    #[serde(default)]
    pub readers: Vec<ReaderConfig>,

    #[serde(default)]
    pub writers: Vec<WriterConfig>,
}

impl FanoutConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            MqError::Config(format!("cannot read '{}': {}", path.display(), err))
        })?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.readers.is_empty() && self.writers.is_empty() {
            return Err(MqError::Config(
                "at least one reader or writer cluster is required".to_string(),
            ));
        }
        for (index, reader) in self.readers.iter().enumerate() {
            reader
                .validate()
                .map_err(|e| MqError::Config(format!("reader cluster {}: {}", index, e)))?;
        }
        for (index, writer) in self.writers.iter().enumerate() {
            writer
                .validate()
                .map_err(|e| MqError::Config(format!("writer cluster {}: {}", index, e)))?;
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LAST_OFFSET;

    #[test]
    fn test_reader_builder_pattern() {
        let config = ReaderConfig::new(&["localhost:9092"], "events")
            .group_id("analytics")
            .max_wait(Duration::from_millis(250))
            .start_offset(LAST_OFFSET);

        assert_eq!(config.brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(config.group_id.as_deref(), Some("analytics"));
        assert_eq!(config.max_wait, Duration::from_millis(250));
        assert_eq!(config.start_offset, LAST_OFFSET);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reader_validate() {
        assert!(ReaderConfig::new::<&str>(&[], "t").validate().is_err());
        assert!(ReaderConfig::new(&["b:1"], " ").validate().is_err());

        let both = ReaderConfig::new(&["b:1"], "t").group_id("g").partition(3);
        assert!(both.validate().is_err());

        let bytes = ReaderConfig::new(&["b:1"], "t").min_bytes(10).max_bytes(5);
        assert!(bytes.validate().is_err());

        let bad_start = ReaderConfig::new(&["b:1"], "t").start_offset(-7);
        assert!(bad_start.validate().is_err());
    }

    #[test]
    fn test_reader_from_url() {
        let config =
            ReaderConfig::from_url("mq://kafka-a:9092,kafka-b:9092/orders?group=billing").unwrap();
        assert_eq!(config.brokers, vec!["kafka-a:9092", "kafka-b:9092"]);
        assert_eq!(config.topic, "orders");
        assert_eq!(config.group_id.as_deref(), Some("billing"));

        let config = ReaderConfig::from_url("mq://k:9092/orders?partition=2&start=last").unwrap();
        assert_eq!(config.partition, 2);
        assert_eq!(config.start_offset, LAST_OFFSET);
    }

    #[test]
    fn test_invalid_urls() {
        assert!(ReaderConfig::from_url("kafka://k/t").is_err());
        assert!(ReaderConfig::from_url("mq://k").is_err());
        assert!(ReaderConfig::from_url("mq:///t").is_err());
        assert!(ReaderConfig::from_url("mq://k/t?partition=x").is_err());
        assert!(ReaderConfig::from_url("mq://k/t?color=blue").is_err());
        assert!(WriterConfig::from_url("mq://k/t?acks=most").is_err());
    }

    #[test]
    fn test_reader_url_round_trip() {
        let config = ReaderConfig::new(&["a:1", "b:2"], "t").group_id("g");
        let parsed = ReaderConfig::from_url(&config.to_url()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_writer_from_url_and_validate() {
        let config = WriterConfig::from_url("mq://k:9092/events?acks=one&timeout_ms=1500").unwrap();
        assert_eq!(config.required_acks, RequiredAcks::One);
        assert_eq!(config.write_timeout, Duration::from_millis(1500));
        assert!(config.validate().is_ok());

        assert!(
            WriterConfig::new(&["k:9092"], "events")
                .batch_size(0)
                .validate()
                .is_err()
        );
        assert!(
            WriterConfig::new(&["k:9092"], "events")
                .write_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_fanout_config_from_json() {
        let json = r#"{
            "mode": "primary-backup",
            "readers": [
                {"brokers": ["a:9092"], "topic": "events", "group_id": "g"},
                {"brokers": ["b:9092"], "topic": "events", "group_id": "g", "max_wait": 500}
            ],
            "writers": [
                {"brokers": ["a:9092"], "topic": "events", "write_timeout": 2000}
            ]
        }"#;

        let config = FanoutConfig::from_json(json).unwrap();
        assert_eq!(config.mode, WriteMode::PrimaryBackup);
        assert_eq!(config.readers.len(), 2);
        assert_eq!(config.readers[1].max_wait, Duration::from_millis(500));
        assert_eq!(config.readers[0].start_offset, FIRST_OFFSET);
        assert_eq!(config.writers[0].write_timeout, Duration::from_secs(2));
        assert_eq!(config.writers[0].required_acks, RequiredAcks::All);
    }

    #[test]
    fn test_fanout_config_rejects_invalid_cluster() {
        let json = r#"{"readers": [{"brokers": [], "topic": "events"}]}"#;
        let err = FanoutConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("reader cluster 0"));

        assert!(FanoutConfig::from_json("{}").is_err());
        assert!(FanoutConfig::from_json("not json").is_err());
    }
}
