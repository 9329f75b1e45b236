use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::DEFAULT_PRICE_SLOT;
use crate::model::DEFAULT_STRICT_MARGIN;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Run settings. Every field has a default, so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Wall-clock limit per sub-problem solve, in seconds
    pub time_limit_secs: f64,
    /// Solver threads; only 1 is supported
    pub threads: usize,
    /// Amount added to a revenue floor to make it strict
    pub strict_margin: f64,
    /// Tolerance for the scan stopping test and assignment audits
    pub tolerance: f64,
    pub max_scan_iterations: usize,
    /// MIP search node limit per sub-problem
    pub max_nodes: usize,
    /// Directory receiving one `.lp` file per solved sub-problem
    pub export_dir: Option<PathBuf>,
    /// Break slot whose price is charged
    pub price_slot: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 3600.0,
            threads: 1,
            strict_margin: DEFAULT_STRICT_MARGIN,
            tolerance: 1e-6,
            max_scan_iterations: 10_000,
            max_nodes: 1_000_000,
            export_dir: None,
            price_slot: DEFAULT_PRICE_SLOT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if !(self.time_limit_secs.is_finite() && self.time_limit_secs > 0.0) {
            return Err(invalid("time_limit_secs", "must be a positive number of seconds"));
        }
        if self.threads != 1 {
            return Err(invalid("threads", "sub-problems are solved on a single thread"));
        }
        if !(self.strict_margin.is_finite() && self.strict_margin > 0.0) {
            return Err(invalid("strict_margin", "must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(invalid("tolerance", "must be finite and non-negative"));
        }
        if self.tolerance >= self.strict_margin {
            return Err(invalid("tolerance", "must be smaller than strict_margin"));
        }
        if self.max_scan_iterations == 0 {
            return Err(invalid("max_scan_iterations", "must be at least 1"));
        }
        if self.max_nodes == 0 {
            return Err(invalid("max_nodes", "must be at least 1"));
        }
        if self.price_slot.trim().is_empty() {
            return Err(invalid("price_slot", "must not be empty"));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threads, 1);
        assert_eq!(config.time_limit(), Duration::from_secs(3600));
        assert_eq!(config.price_slot, "normal_1");
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            time_limit_secs = 60
            export_dir = "models"
            max_scan_iterations = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.time_limit(), Duration::from_secs(60));
        assert_eq!(config.export_dir, Some(PathBuf::from("models")));
        assert_eq!(config.max_scan_iterations, 25);
        assert_eq!(config.strict_margin, DEFAULT_STRICT_MARGIN);
    }

    #[test]
    fn test_rejects_unknown_and_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("timeout = 3.0"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("threads = 4"),
            Err(ConfigError::Invalid { field: "threads", .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("strict_margin = 1e-9"),
            Err(ConfigError::Invalid { field: "tolerance", .. })
        ));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "price_slot = \"premium\"").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.price_slot, "premium");

        assert!(matches!(
            EngineConfig::load("/nonexistent/spotalloc.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
