//! Dual graph configuration
//!
//! Settings can be built in code or loaded from YAML:
//!
//! ```yaml
//! schema: bare
//! vertex_capacity: 1024
//! transaction_capacity: 4096
//! attribute_capacity: 32
//! slow_write_wait_warn_ms: 500
//! ```

use crate::graph::{schema_by_name, Graph, GraphCapacity};
use crate::locking::{DualGraph, LockOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unknown schema '{0}' (expected 'none' or 'bare')")]
    UnknownSchema(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for a new dual graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualGraphConfig {
    /// Built-in schema to install: `none` or `bare`
    pub schema: String,
    /// Initial vertex table size
    pub vertex_capacity: usize,
    /// Initial transaction table size
    pub transaction_capacity: usize,
    /// Initial attribute table size
    pub attribute_capacity: usize,
    /// Warn when a write lock takes longer than this to acquire (0 disables)
    pub slow_write_wait_warn_ms: u64,
}

impl Default for DualGraphConfig {
    fn default() -> Self {
        let capacity = GraphCapacity::default();
        Self {
            schema: "none".to_string(),
            vertex_capacity: capacity.vertices,
            transaction_capacity: capacity.transactions,
            attribute_capacity: capacity.attributes,
            slow_write_wait_warn_ms: 1_000,
        }
    }
}

impl DualGraphConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: DualGraphConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loading dual graph config from {}", path.display());
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn validate(&self) -> ConfigResult<()> {
        if schema_by_name(&self.schema).is_none() {
            return Err(ConfigError::UnknownSchema(self.schema.clone()));
        }
        Ok(())
    }

    pub fn capacity(&self) -> GraphCapacity {
        GraphCapacity {
            vertices: self.vertex_capacity,
            transactions: self.transaction_capacity,
            attributes: self.attribute_capacity,
        }
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            slow_write_wait: (self.slow_write_wait_warn_ms > 0)
                .then(|| Duration::from_millis(self.slow_write_wait_warn_ms)),
        }
    }

    /// An empty graph with the configured schema and capacities
    pub fn build_graph(&self) -> ConfigResult<Graph> {
        let schema =
            schema_by_name(&self.schema).ok_or_else(|| ConfigError::UnknownSchema(self.schema.clone()))?;
        Ok(Graph::with_capacity(schema, self.capacity()))
    }

    /// An empty dual graph with the configured settings
    pub fn build(&self) -> ConfigResult<DualGraph> {
        Ok(DualGraph::with_options(self.build_graph()?, self.lock_options()))
    }
}
