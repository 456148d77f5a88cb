use crate::error::{CoreError, Result};
use crate::types::Durability;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub rpc_url: String,
    pub durability: Durability,
    /// Draw program id, base58.
    pub program_id: String,
    /// Randomness queue, base58. Resolved from the RPC endpoint when absent.
    pub queue: Option<String>,
    pub skip_preflight: bool,
    pub max_retries: u32,
    pub confirm_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            durability: Durability::Confirmed,
            program_id: String::new(),
            queue: None,
            skip_preflight: false,
            max_retries: 3,
            confirm_timeout_secs: 60,
        }
    }
}

impl ClusterConfig {
    pub fn localnet() -> Self {
        Self::default()
    }

    pub fn devnet() -> Self {
        let mut config = Self::default();
        config.rpc_url = "https://api.devnet.solana.com".to_string();
        config
    }

    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.rpc_url = "https://api.mainnet-beta.solana.com".to_string();
        config.durability = Durability::Finalized;
        config
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(CoreError::config("RPC URL cannot be empty"));
        }

        if self.program_id.is_empty() {
            return Err(CoreError::config("program id cannot be empty"));
        }
        self.program_pubkey()?;

        if let Some(queue) = &self.queue {
            Pubkey::from_str(queue)
                .map_err(|e| CoreError::invalid_address(format!("queue '{}': {}", queue, e)))?;
        }

        if self.confirm_timeout_secs == 0 {
            return Err(CoreError::config("confirm timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn program_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.program_id).map_err(|e| {
            CoreError::invalid_address(format!("program id '{}': {}", self.program_id, e))
        })
    }

    pub fn queue_pubkey(&self) -> Result<Option<Pubkey>> {
        match &self.queue {
            Some(queue) => Pubkey::from_str(queue)
                .map(Some)
                .map_err(|e| CoreError::invalid_address(format!("queue '{}': {}", queue, e))),
            None => Ok(None),
        }
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_a_program_id() {
        assert!(ClusterConfig::default().validate().is_err());

        let mut config = ClusterConfig::localnet();
        config.program_id = Pubkey::new_unique().to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");

        let mut config = ClusterConfig::devnet();
        config.program_id = Pubkey::new_unique().to_string();
        config.save(&path).unwrap();

        let loaded = ClusterConfig::load(&path).unwrap();
        assert_eq!(loaded.rpc_url, config.rpc_url);
        assert_eq!(loaded.program_id, config.program_id);
        assert_eq!(loaded.durability, Durability::Confirmed);
    }
}
