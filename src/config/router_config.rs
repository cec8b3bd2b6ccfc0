use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::RouterIdentity;
use crate::RouterId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_host")]
    pub process_host: String,
    pub process_port: u16,
    pub simulated_address: RouterId,
    #[serde(default)]
    pub protocol: ProtocolSettings,
}

/// Tunables of the engine itself, independent of where the router runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    pub worker_pool_size: usize,
    pub io_timeout_ms: u64,
    pub ttl_budget_ms: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            worker_pool_size: 10,
            io_timeout_ms: 3_000,
            ttl_budget_ms: 5_000,
        }
    }
}

impl ProtocolSettings {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl RouterConfig {
    pub fn new(process_host: impl Into<String>, process_port: u16, simulated_address: impl Into<RouterId>) -> Self {
        Self {
            process_host: process_host.into(),
            process_port,
            simulated_address: simulated_address.into(),
            protocol: ProtocolSettings::default(),
        }
    }

    pub fn identity(&self) -> RouterIdentity {
        RouterIdentity::new(
            self.process_host.clone(),
            self.process_port,
            self.simulated_address.clone(),
        )
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.simulated_address.trim().is_empty() {
            anyhow::bail!("simulated_address must not be empty");
        }
        if self.protocol.worker_pool_size == 0 {
            anyhow::bail!("worker_pool_size must be at least 1");
        }
        if self.protocol.io_timeout_ms == 0 {
            anyhow::bail!("io_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
