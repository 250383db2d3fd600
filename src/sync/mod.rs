//! Synchronization helpers for code coordinating around the reader and writer.

pub mod barrier;
pub mod reentrant;

pub use barrier::CyclicDoubleBarrier;
pub use reentrant::{ReentrantGuard, ReentrantMutex};
