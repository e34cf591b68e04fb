//! Plugin catalog entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A computation plugin advertised by the worker backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Stable identifier, unique within the catalog.
    pub plugin_id: String,
    /// Semantic version of the plugin implementation.
    pub version: String,
    /// Human-readable description shown in catalog listings.
    pub description: String,
    /// JSON Schema describing the accepted input parameters.
    pub input_schema: Value,
    /// Canonical demo parameters, if the plugin ships a demo preview.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_params: Option<Value>,
}

impl PluginInfo {
    /// Whether this plugin supports the demo endpoint.
    pub fn has_demo(&self) -> bool {
        self.demo_params.is_some()
    }
}
