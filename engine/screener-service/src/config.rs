//! Screener configuration management

use anyhow::{Context, Result};
use company_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "screener.toml";

/// Default undervaluation (percent) for a company to count as a buy candidate
pub const DEFAULT_MIN_UNDERVALUATION_PCT: f64 = 30.0;

/// Main screener configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Company store configuration
    pub store: StoreConfig,

    /// Screening policy
    pub screening: ScreeningConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Screening policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Minimum combined undervaluation for `--candidates` (inclusive)
    pub min_undervaluation_pct: f64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_undervaluation_pct: DEFAULT_MIN_UNDERVALUATION_PCT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ScreenerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: ScreenerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate().map_err(|e| anyhow::anyhow!(e))?;

        if !self.screening.min_undervaluation_pct.is_finite() {
            return Err(anyhow::anyhow!(
                "Invalid min_undervaluation_pct: {}",
                self.screening.min_undervaluation_pct
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            _ => return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format)),
        }

        Ok(())
    }
}

/// Load configuration from a file and environment variables
///
/// An explicit `path` must exist; otherwise `screener.toml` in the working
/// directory is used when present, and defaults when not.
pub fn load_config(path: Option<&Path>) -> Result<ScreenerConfig> {
    let mut config = match path {
        Some(path) => ScreenerConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ScreenerConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => ScreenerConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Override configuration from environment variables
///
/// `lookup` resolves a variable name to its value.
pub fn apply_env_overrides(
    config: &mut ScreenerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(data_file) = lookup("SCREENER_DATA_FILE") {
        config.store.data_file = PathBuf::from(data_file);
    }

    if let Some(threshold) = lookup("SCREENER_MIN_UNDERVALUATION") {
        config.screening.min_undervaluation_pct = threshold
            .trim()
            .parse()
            .with_context(|| format!("Invalid SCREENER_MIN_UNDERVALUATION: {threshold:?}"))?;
    }

    if let Some(level) = lookup("SCREENER_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = lookup("SCREENER_LOG_FORMAT") {
        config.logging.format = format;
    }

    Ok(())
}
