use crate::error::ConfigError;
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What the orchestrator does after a peer drops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Only surface the disconnect; the caller decides whether to rejoin.
    #[default]
    Manual,
    /// Rejoin (viewer) or re-offer (presenter) after `delay_ms`, at most
    /// `max_attempts` times in a row.
    Automatic { delay_ms: u64, max_attempts: u32 },
}

/// Tunables for one classroom session.
///
/// Every timing value here was picked empirically; none of them is a
/// correctness mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MeshConfig {
    pub transport: TransportConfig,
    /// Delay before a viewer announces itself, giving the presenter time to
    /// subscribe.
    pub join_request_delay_ms: u64,
    /// Window in which a second message of the same type from the same
    /// sender is treated as a duplicate.
    pub suppression_window_ms: u64,
    pub mute_debounce_ms: u64,
    /// Pause between closing a replaced connection and opening its successor.
    pub replace_grace_ms: u64,
    pub max_pending_candidates: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            join_request_delay_ms: 1000,
            suppression_window_ms: 2500,
            mute_debounce_ms: 100,
            replace_grace_ms: 100,
            max_pending_candidates: 64,
            reconnect: ReconnectPolicy::Manual,
        }
    }
}

impl MeshConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MeshConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suppression_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "suppression_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_pending_candidates == 0 {
            return Err(ConfigError::Invalid(
                "max_pending_candidates must be greater than zero".to_string(),
            ));
        }
        if let ReconnectPolicy::Automatic { max_attempts: 0, .. } = self.reconnect {
            return Err(ConfigError::Invalid(
                "automatic reconnect needs max_attempts > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn join_request_delay(&self) -> Duration {
        Duration::from_millis(self.join_request_delay_ms)
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    pub fn mute_debounce(&self) -> Duration {
        Duration::from_millis(self.mute_debounce_ms)
    }

    pub fn replace_grace(&self) -> Duration {
        Duration::from_millis(self.replace_grace_ms)
    }
}
