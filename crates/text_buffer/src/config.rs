use std::{fs, path::Path};

use rope::{MAX_LEAF_SIZE, RopeConfig};
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_REBALANCE_INTERVAL: usize = 256;

/// Tuning for a [`TextBuffer`](crate::TextBuffer). Missing TOML keys fall back
/// to the defaults.
///
/// ```toml
/// max_leaf_size = 4096
/// rebalance_interval = 256  # edits between rebalances, 0 disables
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    pub max_leaf_size: usize,
    pub rebalance_interval: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            max_leaf_size: MAX_LEAF_SIZE,
            rebalance_interval: DEFAULT_REBALANCE_INTERVAL,
        }
    }
}

impl BufferConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn rope_config(&self) -> RopeConfig {
        RopeConfig::new(self.max_leaf_size)
    }
}
