/// Connector configuration
///
/// Loaded from a JSON file (missing file means defaults) and passed explicitly
/// into the connector; nothing here is global.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

/// Default bound of the filtered-scan row queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Base folder every store locator is resolved under
    pub source_dir: Option<PathBuf>,

    /// Capacity of the producer/consumer queue used by filtered scans
    pub queue_capacity: usize,

    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_filter: "info".to_string(),
        }
    }
}

impl ConnectorConfig {
    /// Load configuration from a JSON file; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let config: ConnectorConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration from {}", path.display()))?;

        Ok(config)
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(source_dir.into());
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Queue bound actually used by scans (never zero)
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}
