//! Per-network reachability, proxies and the addresses we believe are ours.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Unroutable,
    Ipv4,
    Ipv6,
    Onion,
    I2p,
}

impl Network {
    pub const ALL: [Network; 5] = [
        Network::Unroutable,
        Network::Ipv4,
        Network::Ipv6,
        Network::Onion,
        Network::I2p,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Network::Unroutable => "unroutable",
            Network::Ipv4 => "ipv4",
            Network::Ipv6 => "ipv6",
            Network::Onion => "onion",
            Network::I2p => "i2p",
        }
    }

    pub fn from_name(name: &str) -> Option<Network> {
        Network::ALL
            .into_iter()
            .find(|n| n.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Classify an IP literal. Overlay networks never show up as plain IPs.
    pub fn of(ip: &IpAddr) -> Network {
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_loopback()
                    || v4.is_unspecified()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_documentation()
                {
                    Network::Unroutable
                } else {
                    Network::Ipv4
                }
            }
            IpAddr::V6(v6) => {
                if v6.is_loopback() || v6.is_unspecified() {
                    Network::Unroutable
                } else {
                    Network::Ipv6
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalServiceInfo {
    pub port: u16,
    pub score: i32,
}

#[derive(Default)]
struct ReachabilityState {
    limited: HashSet<Network>,
    reachable: HashSet<Network>,
    proxies: HashMap<Network, SocketAddr>,
    local: BTreeMap<IpAddr, LocalServiceInfo>,
}

pub struct Reachability {
    state: RwLock<ReachabilityState>,
}

impl Reachability {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ReachabilityState::default()),
        }
    }

    /// Limited networks are never dialed
    pub fn set_limited(&self, network: Network, limited: bool) {
        let mut state = self.state.write();
        if limited {
            state.limited.insert(network);
        } else {
            state.limited.remove(&network);
        }
    }

    pub fn is_limited(&self, network: Network) -> bool {
        self.state.read().limited.contains(&network)
    }

    pub fn set_reachable(&self, network: Network, reachable: bool) {
        let mut state = self.state.write();
        if reachable {
            state.reachable.insert(network);
        } else {
            state.reachable.remove(&network);
        }
    }

    pub fn is_reachable(&self, network: Network) -> bool {
        let state = self.state.read();
        !state.limited.contains(&network) && state.reachable.contains(&network)
    }

    pub fn set_proxy(&self, network: Network, proxy: SocketAddr) {
        self.state.write().proxies.insert(network, proxy);
    }

    pub fn proxy(&self, network: Network) -> Option<SocketAddr> {
        self.state.read().proxies.get(&network).copied()
    }

    /// Record one of our own addresses. A repeat sighting with an equal or
    /// better score bumps the existing score by one.
    pub fn add_local(&self, addr: SocketAddr, score: i32) -> bool {
        let network = Network::of(&addr.ip());
        if network == Network::Unroutable {
            return false;
        }

        let mut state = self.state.write();
        if state.limited.contains(&network) {
            return false;
        }

        match state.local.get_mut(&addr.ip()) {
            Some(info) => {
                if score >= info.score {
                    info.score = score + 1;
                    info.port = addr.port();
                }
            }
            None => {
                state.local.insert(
                    addr.ip(),
                    LocalServiceInfo {
                        port: addr.port(),
                        score,
                    },
                );
            }
        }
        state.reachable.insert(network);
        debug!("🏠 Local address {} (score {})", addr, score);
        true
    }

    /// A peer reported seeing us at `ip`
    pub fn seen_local(&self, ip: &IpAddr) -> bool {
        let mut state = self.state.write();
        match state.local.get_mut(ip) {
            Some(info) => {
                info.score += 1;
                true
            }
            None => false,
        }
    }

    pub fn local_addresses(&self) -> Vec<(IpAddr, LocalServiceInfo)> {
        self.state
            .read()
            .local
            .iter()
            .map(|(ip, info)| (*ip, *info))
            .collect()
    }
}

impl Default for Reachability {
    fn default() -> Self {
        Self::new()
    }
}
