//! Configuration for the company store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the persisted company file
pub const DEFAULT_DATA_FILE: &str = "./data/companies.json";

/// Configuration for file-backed storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the company collection
    pub data_file: PathBuf,

    /// Write indented JSON
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            pretty: true,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with a custom data file
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_file.as_os_str().is_empty() {
            return Err("Store data_file must not be empty".to_string());
        }

        if self.data_file.is_dir() {
            return Err(format!("Store data_file {:?} is a directory", self.data_file));
        }

        Ok(())
    }
}
