//! Request handlers.

pub mod artifacts;
pub mod computations;
pub mod health;
pub mod plugins;

pub use artifacts::{download_artifact, list_artifacts, serve_object};
pub use computations::{
    cancel_computation, get_computation_state, list_computations, watch_computations,
};
pub use health::health_check;
pub use plugins::{get_plugin, list_plugins, run_demo, submit_computation};
