//! Core types shared across the relay gateway crates.
//!
//! This crate holds the computation state machine, input fingerprinting,
//! plugin catalog entries, notification payloads, and configuration.

pub mod computation;
pub mod config;
pub mod event;
pub mod fingerprint;
pub mod plugin;

pub use computation::{CacheClass, ComputationState};
pub use event::StateEvent;
pub use fingerprint::input_fingerprint;
pub use plugin::PluginInfo;
