//! Node configuration.

use crate::Args;
use anyhow::{bail, Context, Result};
use eccpow_mining::{MinerConfig, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Node name.
    pub node_name: String,
    /// Mining configuration.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Run configuration.
    #[serde(default)]
    pub run: RunConfig,
}

/// Mining configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningConfig {
    /// Number of mining threads (0 = auto-detect based on CPU cores).
    #[serde(default)]
    pub threads: usize,
    /// Trials per candidate attempt, shared by all threads.
    #[serde(default = "default_max_trials")]
    pub max_trials: u64,
    /// Trials a worker claims at a time.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

fn default_max_trials() -> u64 {
    1_000
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: 0, // Auto-detect
            max_trials: default_max_trials(),
            batch_size: default_batch_size(),
        }
    }
}

impl From<&MiningConfig> for MinerConfig {
    fn from(config: &MiningConfig) -> Self {
        MinerConfig {
            threads: config.threads,
            max_trials: config.max_trials,
            batch_size: config.batch_size,
        }
    }
}

/// What the node mines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Message candidates are admitted for.
    pub message: String,
    /// Number of candidate identities (`node0`, `node1`, ...).
    pub candidates: usize,
    /// Difficulty level mined at.
    pub level: usize,
    /// Parent hash as hex. Seeds the Tanner graph.
    #[serde(default = "default_parent_hash")]
    pub parent_hash: String,
    /// Rounds over all candidates before giving up.
    pub rounds: u64,
}

fn default_parent_hash() -> String {
    hex::encode([0u8; 32])
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            message: "PREVIOUS BLOCK HEADER".to_string(),
            candidates: 100,
            level: 5,
            parent_hash: default_parent_hash(),
            rounds: 3_000,
        }
    }
}

impl RunConfig {
    /// Decoded parent hash.
    pub fn parent_hash_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.parent_hash).context("parent_hash is not valid hex")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "eccpow-node".to_string(),
            mining: MiningConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config: Self = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        // Only override if explicitly provided via CLI
        if let Some(threads) = args.threads {
            config.mining.threads = threads;
        }
        if let Some(max_trials) = args.max_trials {
            config.mining.max_trials = max_trials;
        }
        if let Some(level) = args.level {
            config.run.level = level;
        }
        if let Some(candidates) = args.candidates {
            config.run.candidates = candidates;
        }
        if let Some(rounds) = args.rounds {
            config.run.rounds = rounds;
        }
        if let Some(ref message) = args.message {
            config.run.message = message.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the miner cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.mining.max_trials == 0 {
            bail!("mining.max_trials must be positive");
        }
        if self.run.candidates == 0 {
            bail!("run.candidates must be positive");
        }
        self.run.parent_hash_bytes()?;
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["eccpow-node"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.run.level, 5);
        assert_eq!(config.run.candidates, 100);
        assert_eq!(config.run.parent_hash_bytes().unwrap(), vec![0u8; 32]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::load(&dir.path().join("absent.toml"), &args(&[])).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");

        let mut config = NodeConfig::default();
        config.mining.threads = 3;
        config.run.level = 2;
        config.save(&path).unwrap();

        let loaded = NodeConfig::load(&path, &args(&[])).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            "node_name = \"test\"\n[mining]\nthreads = 2\n[run]\nmessage = \"m\"\ncandidates = 4\nlevel = 1\nrounds = 5\n",
        )
        .unwrap();

        let config =
            NodeConfig::load(&path, &args(&["--threads", "8", "--level", "3"])).unwrap();
        assert_eq!(config.mining.threads, 8);
        assert_eq!(config.mining.max_trials, default_max_trials());
        assert_eq!(config.run.level, 3);
        assert_eq!(config.run.candidates, 4);
        assert_eq!(config.run.parent_hash, default_parent_hash());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = NodeConfig::default();
        config.run.parent_hash = "zz".to_string();
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let result = NodeConfig::load(
            &dir.path().join("absent.toml"),
            &args(&["--max-trials", "0"]),
        );
        assert!(result.is_err());
    }
}
