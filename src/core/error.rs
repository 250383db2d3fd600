use super::cluster_errors::ClusterErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MqError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("cluster index {index} out of range ({clusters} clusters configured)")]
    IndexOutOfRange { index: usize, clusters: usize },

    #[error("client is closed")]
    Closed,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Offset error: {0}")]
    Offset(String),

    #[error("Close error: {0}")]
    Close(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("worker pool stopped")]
    PoolStopped,

    #[error("cluster {index}: {source}")]
    AtCluster {
        index: usize,
        #[source]
        source: Box<MqError>,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterErrors),

    #[error("barrier is broken")]
    BrokenBarrier,
}

pub type Result<T> = std::result::Result<T, MqError>;

impl MqError {
    /// Reports whether this failure was caused by context cancellation.
    ///
    /// Looks through `AtCluster` wrappers so a tagged cancellation still classifies.
    pub fn is_canceled(&self) -> bool {
        match self {
            Self::Canceled => true,
            Self::AtCluster { source, .. } => source.is_canceled(),
            _ => false,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::AtCluster { source, .. } => source.is_deadline_exceeded(),
            _ => false,
        }
    }

    /// Tags the error with the index of the cluster it came from.
    pub fn at_cluster(self, index: usize) -> Self {
        Self::AtCluster {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the cluster index this error was tagged with, if any.
    pub fn cluster_index(&self) -> Option<usize> {
        match self {
            Self::AtCluster { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MqError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
