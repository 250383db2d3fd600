use super::error::MqError;
use std::fmt;

/// Per-cluster outcomes of one fan-out operation.
///
/// Holds one slot per attempted cluster, `None` for a success. Rendering is bounded:
/// however many clusters failed, only the first two causes are printed.
#[derive(Debug, Default)]
pub struct ClusterErrors {
    slots: Vec<Option<MqError>>,
}

impl ClusterErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Records the outcome of one attempt.
    pub fn push(&mut self, slot: Option<MqError>) {
        self.slots.push(slot);
    }

    /// Records the outcome of one attempt from its result.
    pub fn push_result<T>(&mut self, result: Result<T, MqError>) {
        self.slots.push(result.err());
    }

    /// Number of failed attempts.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Total number of attempts recorded.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over the failures in the order they were recorded.
    pub fn errors(&self) -> impl Iterator<Item = &MqError> {
        self.slots.iter().flatten()
    }

    /// Returns `Ok(())` when no attempt failed, otherwise the aggregate as an error.
    pub fn into_result(self) -> Result<(), MqError> {
        if self.count() == 0 {
            Ok(())
        } else {
            Err(MqError::Cluster(self))
        }
    }
}

impl FromIterator<Option<MqError>> for ClusterErrors {
    fn from_iter<I: IntoIterator<Item = Option<MqError>>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ClusterErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut failures = self.errors();
        write!(f, "cluster errors ({}/{})", self.count(), self.len())?;
        match (failures.next(), failures.next()) {
            (None, _) => Ok(()),
            (Some(first), None) => write!(f, ", error: {}", first),
            (Some(first), Some(second)) => {
                write!(f, ", the first two errors: {}; {}", first, second)
            }
        }
    }
}

impl std::error::Error for ClusterErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors()
            .next()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
