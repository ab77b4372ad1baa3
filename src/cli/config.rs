//! Configuration file
//!
//! Optional JSON file; every field has a default, and flags given on the
//! command line override what the file says.
//!
//! ```json
//! {
//!   "scan_mode": "degraded",
//!   "log_level": "info",
//!   "kinds": ["volume", "brick"],
//!   "churn": { "seed": 42, "fault_rate": 0.0, "nodes": 3, "device_size": 2000 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entries::EntityKind;
use crate::exhume::{RecoveryOptions, ScanMode};
use crate::observability::Severity;
use crate::orchestrator::MemoryConfig;

use super::errors::{CliError, CliResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// "degraded" or "strict"
    #[serde(default)]
    pub scan_mode: ScanMode,

    /// Minimum log severity: trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Kinds to scan; all of them when omitted
    #[serde(default)]
    pub kinds: Option<Vec<String>>,

    #[serde(default)]
    pub churn: ChurnConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnConfig {
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub fault_rate: f64,

    #[serde(default = "default_nodes")]
    pub nodes: usize,

    #[serde(default = "default_device_size")]
    pub device_size: u64,
}

fn default_log_level() -> Severity {
    Severity::Info
}
fn default_nodes() -> usize {
    3
}
fn default_device_size() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::default(),
            log_level: default_log_level(),
            kinds: None,
            churn: ChurnConfig::default(),
        }
    }
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            fault_rate: 0.0,
            nodes: default_nodes(),
            device_size: default_device_size(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Loads `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        self.kinds()?;
        self.churn.validate()
    }

    /// Configured kinds in the order given, or every kind.
    pub fn kinds(&self) -> CliResult<Vec<EntityKind>> {
        match &self.kinds {
            None => Ok(EntityKind::SCAN_ORDER.to_vec()),
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<EntityKind>()
                        .map_err(|e: String| CliError::config_error(format!("Invalid kinds: {}", e)))
                })
                .collect(),
        }
    }

    pub fn recovery_options(&self) -> CliResult<RecoveryOptions> {
        Ok(RecoveryOptions {
            mode: self.scan_mode,
            kinds: self.kinds()?,
        })
    }
}

impl ChurnConfig {
    pub fn validate(&self) -> CliResult<()> {
        if !(0.0..=1.0).contains(&self.fault_rate) {
            return Err(CliError::config_error(format!(
                "fault_rate must be within [0, 1], got {}",
                self.fault_rate
            )));
        }
        if self.nodes < 3 {
            return Err(CliError::config_error(format!(
                "nodes must be at least 3, got {}",
                self.nodes
            )));
        }
        if self.device_size == 0 {
            return Err(CliError::config_error("device_size must be > 0"));
        }
        Ok(())
    }

    /// Cluster shape for the reference orchestrator; faults share the seed.
    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            nodes: self.nodes,
            device_size: self.device_size,
            fault_rate: self.fault_rate,
            fault_seed: self.seed,
        }
    }
}
