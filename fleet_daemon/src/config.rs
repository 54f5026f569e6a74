use crate::cli::Cli;
use crate::client_handler::agent_client::AgentTimeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use utils::file_system::yaml_file::read_yaml;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Read(String),
    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn default_agent_timeout_secs() -> u64 {
    5
}

fn default_agent_connect_timeout_secs() -> u64 {
    3
}

fn default_init_concurrency() -> usize {
    16
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub name: String,
    pub hostname: String,
    pub tls_path: PathBuf,
    pub inventory_path: PathBuf,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    #[serde(default = "default_agent_connect_timeout_secs")]
    pub agent_connect_timeout_secs: u64,
    #[serde(default = "default_init_concurrency")]
    pub init_concurrency: usize,
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

impl FleetConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_yaml(path)
            .await
            .map_err(|err| ConfigError::Read(err.to_string()))
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(init_concurrency) = cli.init_concurrency {
            self.init_concurrency = init_concurrency as usize;
        }
        if let Some(agent_timeout_secs) = cli.agent_timeout_secs {
            self.agent_timeout_secs = agent_timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.hostname.trim().is_empty() {
            return Err(invalid("hostname", "must not be empty"));
        }
        if self.tls_path.as_os_str().is_empty() {
            return Err(invalid("tls_path", "must not be empty"));
        }
        if self.inventory_path.as_os_str().is_empty() {
            return Err(invalid("inventory_path", "must not be empty"));
        }
        if self.agent_timeout_secs == 0 {
            return Err(invalid("agent_timeout_secs", "must be at least 1"));
        }
        if self.agent_connect_timeout_secs == 0 {
            return Err(invalid("agent_connect_timeout_secs", "must be at least 1"));
        }
        if self.init_concurrency == 0 {
            return Err(invalid("init_concurrency", "must be at least 1"));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> AgentTimeouts {
        AgentTimeouts {
            request: Duration::from_secs(self.agent_timeout_secs),
            connect: Duration::from_secs(self.agent_connect_timeout_secs),
        }
    }
}
