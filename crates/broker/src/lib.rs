//! Worker backend abstraction for the relay gateway.
//!
//! Defines the dispatch/status/cancel interface the gateway drives, the
//! plugin catalog, and an in-process backend implementation.

pub mod error;
pub mod local;
pub mod traits;

pub use error::{BrokerError, BrokerResult};
pub use local::{EchoWorker, LocalBackend, Worker};
pub use traits::{ArtifactPayload, PluginCatalog, TaskSpec, TaskStatus, WorkerBackend};
