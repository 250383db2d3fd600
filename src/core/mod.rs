pub mod cluster_errors;
pub mod context;
pub mod error;
pub mod message;

pub use cluster_errors::ClusterErrors;
pub use context::Context;
pub use error::{MqError, Result};
pub use message::{FIRST_OFFSET, Header, LAST_OFFSET, Message};
