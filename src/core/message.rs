use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset sentinel resolving to the first available message of a partition.
pub const FIRST_OFFSET: i64 = -2;

/// Offset sentinel resolving to the end of a partition (only new messages).
pub const LAST_OFFSET: i64 = -1;

/// A key/value header attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

/// A message read from or written to a cluster.
///
/// `topic`, `partition`, `offset` and `time` are filled in by the cluster on write;
/// callers usually set only the key, value and headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<Header>,
    pub time: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Creates a keyless message.
    pub fn from_value(value: impl Into<Vec<u8>>) -> Self {
        Self::new(Vec::new(), value)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(Header {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|header| header.key == key)
            .map(|header| header.value.as_slice())
    }

    /// Payload size in bytes: key, value and headers.
    pub fn size(&self) -> usize {
        self.key.len()
            + self.value.len()
            + self
                .headers
                .iter()
                .map(|header| header.key.len() + header.value.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = Message::new("k-1", "hello").with_header("trace", "abc");
        assert_eq!(msg.key, b"k-1");
        assert_eq!(msg.value, b"hello");
        assert_eq!(msg.header("trace"), Some(&b"abc"[..]));
        assert_eq!(msg.header("missing"), None);
        assert_eq!(msg.size(), 3 + 5 + 5 + 3);
    }

    #[test]
    fn test_keyless_message() {
        let msg = Message::from_value("payload");
        assert!(msg.key.is_empty());
        assert_eq!(msg.time, None);
    }
}
