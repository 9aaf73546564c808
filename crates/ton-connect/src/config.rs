//! Runtime configuration.
//!
//! [`ConnectConfig`] deserializes with serde (every field has a default) or
//! loads from the environment:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `TON_CONNECT_API_URL` | `api_base_url` | `http://localhost:8000` |
//! | `TON_CONNECT_NETWORK` | `network` (`mainnet`, `testnet`, `-239`, `-3`) | `mainnet` |
//! | `TON_CONNECT_CHAIN_ENDPOINT` | `chain_endpoint` | toncenter v2 for the network |
//! | `TON_CONNECT_CHAIN_API_KEY` | `chain_api_key` | none |
//! | `TON_CONNECT_PROOF_DOMAIN` | `proof_domain` | `localhost` |
//! | `TON_CONNECT_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` | `15` |
//! | `TON_CONNECT_VALIDITY_SECS` | `validity_secs` | `300` |
//! | `TON_CONNECT_JETTON_GAS_RESERVE` | `jetton_gas_reserve` (nanotons) | `50000000` |
//! | `TON_CONNECT_JETTON_FORWARD_AMOUNT` | `jetton_forward_amount` (nanotons) | `1` |
//! | `TON_CONNECT_STORAGE_DIR` | `storage_dir` | `.ton-connect` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, ConnectResult};
use crate::transfer::TransferPolicy;

const MAINNET_CHAIN_ID: &str = "-239";
const TESTNET_CHAIN_ID: &str = "-3";

/// Target network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Chain id used by the TON Connect protocol.
    pub fn chain_id(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_CHAIN_ID,
            Network::Testnet => TESTNET_CHAIN_ID,
        }
    }

    pub fn from_chain_id(chain_id: &str) -> Option<Self> {
        match chain_id {
            MAINNET_CHAIN_ID => Some(Network::Mainnet),
            TESTNET_CHAIN_ID => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn is_testnet(self) -> bool {
        self == Network::Testnet
    }

    /// Public toncenter v2 endpoint.
    pub fn default_chain_endpoint(self) -> &'static str {
        match self {
            Network::Mainnet => "https://toncenter.com/api/v2",
            Network::Testnet => "https://testnet.toncenter.com/api/v2",
        }
    }
}

impl FromStr for Network {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | MAINNET_CHAIN_ID => Ok(Network::Mainnet),
            "testnet" | TESTNET_CHAIN_ID => Ok(Network::Testnet),
            other => Err(ConnectError::Config {
                name: "TON_CONNECT_NETWORK",
                reason: format!("unknown network {other:?}"),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

/// Configuration shared by the session, negotiation and transfer layers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Base URL of the dashboard backend (`/api/auth/...` lives below it).
    pub api_base_url: String,
    pub network: Network,
    /// Chain HTTP endpoint; the network's public toncenter when unset.
    pub chain_endpoint: Option<String>,
    pub chain_api_key: Option<String>,
    /// Domain the ton_proof signature is bound to.
    pub proof_domain: String,
    pub request_timeout_secs: u64,
    /// How long a signed transfer stays valid.
    pub validity_secs: u64,
    /// Outer message value attached to a jetton transfer, in nanotons.
    pub jetton_gas_reserve: u64,
    /// `forward_ton_amount` of a jetton transfer, in nanotons.
    pub jetton_forward_amount: u64,
    pub storage_dir: PathBuf,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            network: Network::Mainnet,
            chain_endpoint: None,
            chain_api_key: None,
            proof_domain: "localhost".to_string(),
            request_timeout_secs: 15,
            validity_secs: 300,
            jetton_gas_reserve: 50_000_000,
            jetton_forward_amount: 1,
            storage_dir: PathBuf::from(".ton-connect"),
        }
    }
}

impl ConnectConfig {
    /// Load from `TON_CONNECT_*` environment variables.
    pub fn from_env() -> ConnectResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConnectResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = var("TON_CONNECT_API_URL") {
            config.api_base_url = url;
        }
        if let Some(network) = var("TON_CONNECT_NETWORK") {
            config.network = network.parse()?;
        }
        config.chain_endpoint = var("TON_CONNECT_CHAIN_ENDPOINT");
        config.chain_api_key = var("TON_CONNECT_CHAIN_API_KEY");
        if let Some(domain) = var("TON_CONNECT_PROOF_DOMAIN") {
            config.proof_domain = domain;
        }
        if let Some(value) = var("TON_CONNECT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("TON_CONNECT_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = var("TON_CONNECT_VALIDITY_SECS") {
            config.validity_secs = parse_number("TON_CONNECT_VALIDITY_SECS", &value)?;
        }
        if let Some(value) = var("TON_CONNECT_JETTON_GAS_RESERVE") {
            config.jetton_gas_reserve = parse_number("TON_CONNECT_JETTON_GAS_RESERVE", &value)?;
        }
        if let Some(value) = var("TON_CONNECT_JETTON_FORWARD_AMOUNT") {
            config.jetton_forward_amount =
                parse_number("TON_CONNECT_JETTON_FORWARD_AMOUNT", &value)?;
        }
        if let Some(dir) = var("TON_CONNECT_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> ConnectResult<()> {
        if self.proof_domain.is_empty() {
            return Err(ConnectError::Config {
                name: "proof_domain",
                reason: "must not be empty".to_string(),
            });
        }
        if self.validity_secs == 0 {
            return Err(ConnectError::Config {
                name: "validity_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.jetton_gas_reserve == 0 {
            return Err(ConnectError::Config {
                name: "jetton_gas_reserve",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn chain_endpoint(&self) -> &str {
        self.chain_endpoint
            .as_deref()
            .unwrap_or_else(|| self.network.default_chain_endpoint())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_secs)
    }

    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            jetton_gas_reserve: self.jetton_gas_reserve as u128,
            forward_amount: self.jetton_forward_amount as u128,
            validity: self.validity(),
        }
    }
}

fn parse_number(name: &'static str, value: &str) -> ConnectResult<u64> {
    value.parse().map_err(|_| ConnectError::Config {
        name,
        reason: format!("expected a non-negative integer, got {value:?}"),
    })
}
