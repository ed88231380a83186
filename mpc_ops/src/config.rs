use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Security model of MPC sessions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// SPDZ with MAC checks of every opened value.
    Spdz,
    /// SPDZ sharing without MAC checks.
    SemiHonest,
}

/// Configuration of in-process MPC sessions.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub protocol: ProtocolKind,
    pub num_parties: usize,
    /// Seed of insecure dealer, shared by all parties.
    pub dealer_seed: u8,
    /// Capacity of in-memory channels between parties, in bytes.
    pub channel_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::Spdz,
            num_parties: 2,
            dealer_seed: 123,
            channel_buffer_size: 1 << 20,
        }
    }
}

impl SessionConfig {
    /// Two-party configuration for given protocol.
    pub fn two_party(protocol: ProtocolKind) -> Self {
        Self {
            protocol,
            ..Self::default()
        }
    }

    /// Load configuration from JSON file. Missing fields take default values.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"protocol": "semi_honest"}"#).unwrap();
        assert_eq!(config, SessionConfig::two_party(ProtocolKind::SemiHonest));
    }

    #[test]
    fn test_load() {
        let path = std::env::temp_dir().join(format!("mpc_ops_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"num_parties": 3, "dealer_seed": 7}"#).unwrap();
        let config = SessionConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.protocol, ProtocolKind::Spdz);
        assert_eq!(config.num_parties, 3);
        assert_eq!(config.dealer_seed, 7);
        assert_eq!(config.channel_buffer_size, 1 << 20);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(SessionConfig::load("/nonexistent/mpc_ops.json").is_err());
    }
}
