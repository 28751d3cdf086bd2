//! Analytics configuration.
//!
//! The configuration is data only: an event sink identifier and static
//! parameters that the client runtime interprets. Custom event handling code
//! lives in its own module, referenced by path, and is imported by the
//! generated entry modules rather than copied into them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::page::ParseError;
use crate::script::to_script_json;

/// Analytics settings shared by the browser and server entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
    /// Track clicks and page views automatically
    #[serde(default, alias = "auto_events")]
    pub auto_events: bool,

    /// Event sink identifier understood by the runtime (e.g. "gtag", "beacon")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<String>,

    /// Static parameters passed to the sink
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,

    /// Module whose default export handles events.
    /// Never serialized; the entries import it by path.
    #[serde(default, skip_serializing)]
    pub handler: Option<PathBuf>,
}

impl AnalyticsConfig {
    /// Load the analytics file. A relative `handler` is resolved against the
    /// directory containing the file.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.display().to_string(),
            source,
        })?;

        if source.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut config: AnalyticsConfig = serde_yaml::from_str(&source)?;

        if let Some(handler) = config.handler.take() {
            let resolved = if handler.is_relative() {
                path.parent().unwrap_or(Path::new("")).join(handler)
            } else {
                handler
            };
            config.handler = Some(resolved);
        }

        tracing::debug!(
            "Loaded analytics from {} (handler: {})",
            path.display(),
            config.handler.is_some()
        );
        Ok(config)
    }

    /// Data-only JavaScript literal for this configuration.
    pub fn to_js_literal(&self) -> Result<String, serde_json::Error> {
        to_script_json(self)
    }
}
