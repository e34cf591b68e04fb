//! HTTP API server for the relay computation gateway.
//!
//! This crate provides the HTTP control plane:
//! - Plugin discovery
//! - Computation submission and demo previews
//! - Correlation-keyed state retrieval and cancellation
//! - Artifact listing and signed downloads
//! - WebSocket event watch

pub mod admission;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod lifecycle;
pub mod routes;
pub mod sender;
pub mod state;

pub use error::ApiError;
pub use hub::{NotificationHub, SubscriptionMessage};
pub use lifecycle::Lifecycle;
pub use routes::create_router;
pub use sender::BackendSender;
pub use state::AppState;
