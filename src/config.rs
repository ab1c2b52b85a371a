//! Configuration management for the nodenet daemon.
//!
//! A single TOML file. On first run a default one is written into the
//! network's data directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::constants::alert::PUBLISHED_TEST_KEYS;
use crate::constants::DEFAULT_MIN_RELAY_FEE;
use crate::error::AppError;
use crate::network::reachability::Network;
use crate::network_type::NetworkType;

/// Platform-specific data directory
pub fn get_data_dir() -> PathBuf {
    if cfg!(windows) {
        // %APPDATA%\nodenet
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nodenet")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nodenet")
    }
}

/// Testnet keeps its files in a subdirectory
pub fn get_network_data_dir(network: &NetworkType) -> PathBuf {
    let base = get_data_dir();
    match network {
        NetworkType::Mainnet => base,
        NetworkType::Testnet => base.join("testnet"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default = "default_network")]
    pub network: String,
    /// Extra comments appended to the advertised subversion, e.g. "/nodenet:0.9.3(pool)/"
    #[serde(default)]
    pub subversion_comments: Vec<String>,
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_true() -> bool {
    true
}

fn default_relay_fee() -> f64 {
    DEFAULT_MIN_RELAY_FEE
}

impl NodeConfig {
    pub fn network_type(&self) -> NetworkType {
        match self.network.to_lowercase().as_str() {
            "mainnet" => NetworkType::Mainnet,
            _ => NetworkType::Testnet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Address advertised to peers as our own
    #[serde(default)]
    pub external_address: Option<String>,
    /// Seeds the added-node list at startup
    #[serde(default)]
    pub added_nodes: Vec<String>,
    /// Allow DNS lookups for added nodes
    #[serde(default = "default_true")]
    pub name_lookup: bool,
    /// SOCKS proxy for ipv4/ipv6
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub onion_proxy: Option<String>,
    #[serde(default)]
    pub i2p_proxy: Option<String>,
    /// When non-empty, every other network is marked limited
    #[serde(default)]
    pub only_networks: Vec<String>,
    /// Coins per kB
    #[serde(default = "default_relay_fee")]
    pub relay_fee: f64,
}

impl NetworkConfig {
    pub fn full_external_address(&self, network_type: &NetworkType) -> Option<String> {
        self.external_address
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|a| with_default_port(a, network_type.default_p2p_port()))
    }

    /// Configured proxies, parsed. Unparseable entries are an error.
    pub fn proxies(&self) -> Result<Vec<(Network, SocketAddr)>, AppError> {
        let mut out = Vec::new();
        let entries = [
            (Network::Ipv4, &self.proxy),
            (Network::Ipv6, &self.proxy),
            (Network::Onion, &self.onion_proxy),
            (Network::I2p, &self.i2p_proxy),
        ];
        for (network, entry) in entries {
            if let Some(proxy) = entry.as_deref().filter(|p| !p.is_empty()) {
                let addr = proxy.parse::<SocketAddr>().map_err(|e| {
                    AppError::Config(format!("invalid {} proxy '{}': {}", network.name(), proxy, e))
                })?;
                out.push((network, addr));
            }
        }
        Ok(out)
    }

    /// Networks to mark limited from `only_networks`
    pub fn limited_networks(&self) -> Result<Vec<Network>, AppError> {
        if self.only_networks.is_empty() {
            return Ok(Vec::new());
        }
        let mut allowed = Vec::with_capacity(self.only_networks.len());
        for name in &self.only_networks {
            let network = Network::from_name(name)
                .ok_or_else(|| AppError::Config(format!("unknown network '{}'", name)))?;
            allowed.push(network);
        }
        Ok(Network::ALL
            .into_iter()
            .filter(|n| *n != Network::Unroutable && !allowed.contains(n))
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcConfig {
    pub enabled: bool,
    pub listen_address: String,
}

impl RpcConfig {
    pub fn full_listen_address(&self, network_type: &NetworkType) -> String {
        with_default_port(&self.listen_address, network_type.default_rpc_port())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertConfig {
    /// Hex ed25519 public key alerts must be signed with. Required; there
    /// is no built-in authority.
    #[serde(default)]
    pub authority_key: Option<String>,
    /// Expose `sendalert` over RPC
    #[serde(default)]
    pub allow_sendalert: bool,
}

impl AlertConfig {
    pub fn authority_key_bytes(&self) -> Result<Vec<u8>, AppError> {
        let key_hex = self
            .authority_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Config("alert.authority_key is not set".to_string())
            })?;
        if PUBLISHED_TEST_KEYS
            .iter()
            .any(|published| published.eq_ignore_ascii_case(key_hex))
        {
            return Err(AppError::Config(
                "alert authority key is a published test vector".to_string(),
            ));
        }
        let key = hex::decode(key_hex)
            .map_err(|e| AppError::Config(format!("alert authority key is not hex: {}", e)))?;
        if key.len() != 32 {
            return Err(AppError::Config(format!(
                "alert authority key must be 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

fn with_default_port(addr: &str, port: u16) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "nodenet".to_string(),
                network: default_network(),
                subversion_comments: Vec::new(),
            },
            network: NetworkConfig {
                external_address: None,
                added_nodes: Vec::new(),
                name_lookup: true,
                proxy: None,
                onion_proxy: None,
                i2p_proxy: None,
                only_networks: Vec::new(),
                relay_fee: DEFAULT_MIN_RELAY_FEE,
            },
            rpc: RpcConfig {
                enabled: true,
                listen_address: "127.0.0.1".to_string(),
            },
            alert: AlertConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path`, or write a default config for `network_type` there
    pub fn load_or_create(path: impl AsRef<Path>, network_type: &NetworkType) -> Result<Self, AppError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut config = Config::default();
        config.node.network = network_type.to_string().to_lowercase();
        config.save_to_file(path)?;
        tracing::info!("📝 Wrote default config to {}", path.display());
        Ok(config)
    }
}
