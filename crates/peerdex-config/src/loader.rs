//! Top-level node configuration and its TOML loader.

use crate::components::{
    DhtConfig, IndexingConfig, LoggingConfig, OnlineCautionConfig, PipelineConfig,
    ResourceConfig, StageConfig,
};
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Complete configuration of a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Log output
    pub logging: LoggingConfig,
    /// Indexing stage sizing
    pub pipeline: PipelineConfig,
    /// Indexing policy
    pub indexing: IndexingConfig,
    /// Resource observer limits
    pub resources: ResourceConfig,
    /// Online caution delays
    pub caution: OnlineCautionConfig,
    /// DHT distribution
    pub dht: DhtConfig,
}

impl NodeConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: NodeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Loading node configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the control loops cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_stage("pipeline.parse", &self.pipeline.parse)?;
        validate_stage("pipeline.condense", &self.pipeline.condense)?;
        validate_stage("pipeline.structure_analysis", &self.pipeline.structure_analysis)?;
        validate_stage("pipeline.store", &self.pipeline.store)?;

        let res = &self.resources;
        if res.interval_secs == 0 {
            return Err(ConfigError::invalid("resources.interval_secs", "must be positive"));
        }
        if res.disk_free.min_undershot_mib > res.disk_free.min_steadystate_mib {
            return Err(ConfigError::invalid(
                "resources.disk_free.min_undershot_mib",
                "hard limit must not exceed the steady-state value",
            ));
        }
        if res.disk_used.max_overshot_mib < res.disk_used.max_steadystate_mib {
            return Err(ConfigError::invalid(
                "resources.disk_used.max_overshot_mib",
                "hard limit must not be below the steady-state value",
            ));
        }
        if res.memory.min_undershot_mib > res.memory.min_steadystate_mib {
            return Err(ConfigError::invalid(
                "resources.memory.min_undershot_mib",
                "hard limit must not exceed the steady-state value",
            ));
        }

        let dht = &self.dht;
        if dht.interval_secs == 0 {
            return Err(ConfigError::invalid("dht.interval_secs", "must be positive"));
        }
        if dht.transmission_workers == 0 {
            return Err(ConfigError::invalid("dht.transmission_workers", "must be positive"));
        }
        if dht.max_transmission_attempts == 0 {
            return Err(ConfigError::invalid(
                "dht.max_transmission_attempts",
                "must allow at least one attempt",
            ));
        }
        for (field, load) in [
            ("dht.accumulate_max_connection_load", dht.accumulate_max_connection_load),
            ("dht.transmit_max_connection_load", dht.transmit_max_connection_load),
        ] {
            if !(0.0..=100.0).contains(&load) {
                return Err(ConfigError::invalid(field, "must be a percentage"));
            }
        }
        Ok(())
    }
}

fn validate_stage(field: &str, stage: &StageConfig) -> ConfigResult<()> {
    if stage.workers == 0 {
        return Err(ConfigError::invalid(field, "needs at least one worker"));
    }
    if stage.queue_capacity == 0 {
        return Err(ConfigError::invalid(field, "queue capacity must be positive"));
    }
    Ok(())
}
