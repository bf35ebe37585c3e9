use anyhow::{Context, Result};
use bitcoin::Network;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the tracker service.
    pub tracker: String,
    /// Chain the wallet operates on.
    #[serde(default = "default_network")]
    pub network: Network,
    /// Directory holding the collection store and other local state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Fee rate in satoshis per virtual byte.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: u64,
    /// Run the local script interpreter over assembled witnesses before
    /// broadcasting.
    #[serde(default)]
    pub verify: bool,
    /// WIF-encoded wallet key.
    pub wif: String,
}

fn default_network() -> Network {
    Network::Bitcoin
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_fee_rate() -> u64 {
    1
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("cannot parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"tracker": "http://127.0.0.1:3000", "wif": "cT3p..."}"#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Bitcoin);
        assert_eq!(config.fee_rate, 1);
        assert!(!config.verify);
    }

    #[test]
    fn network_parses_from_string() {
        let config: Config = serde_json::from_str(
            r#"{"tracker": "t", "wif": "w", "network": "regtest", "feeRate": 7}"#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.fee_rate, 7);
    }
}
