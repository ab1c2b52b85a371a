//! Read side of the peer directory.
//!
//! Every query copies what it needs out of the registries first and does
//! formatting, name resolution and cross-referencing on those copies, so a
//! slow DNS lookup never holds up peer I/O.

use crate::alert::store::AlertStore;
use crate::alert::AlertSummary;
use crate::constants::client::format_sub_version;
use crate::error::DirectoryError;
use crate::network::added_peers::{AddedPeerList, Connector};
use crate::network::peer_connection::PeerStats;
use crate::network::peer_connection_registry::PeerConnectionRegistry;
use crate::network::peer_scoring::MisbehaviorLookup;
use crate::network::reachability::{Network, Reachability};
use crate::network::resolver::AddressResolver;
use crate::time_sync::Clock;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Static facts about this node reported by `getnetworkinfo`
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub client_name: String,
    pub client_version: i32,
    pub protocol_version: i32,
    /// Appended to the advertised subversion in parentheses
    pub sub_version_comments: Vec<String>,
    pub local_services: u64,
    /// Coins per kB
    pub relay_fee: f64,
    pub default_port: u16,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PeerInfoRecord {
    pub addr: String,
    #[serde(rename = "addrlocal", skip_serializing_if = "Option::is_none")]
    pub addr_local: Option<String>,
    pub services: String,
    #[serde(rename = "lastsend")]
    pub last_send: i64,
    #[serde(rename = "lastrecv")]
    pub last_recv: i64,
    #[serde(rename = "bytessent")]
    pub bytes_sent: u64,
    #[serde(rename = "bytesrecv")]
    pub bytes_recv: u64,
    #[serde(rename = "conntime")]
    pub conn_time: i64,
    /// Seconds
    #[serde(rename = "pingtime")]
    pub ping_time: f64,
    /// Seconds, only while a ping is outstanding
    #[serde(rename = "pingwait", skip_serializing_if = "Option::is_none")]
    pub ping_wait: Option<f64>,
    pub version: i32,
    #[serde(rename = "subver")]
    pub sub_version: String,
    pub inbound: bool,
    #[serde(rename = "startingheight")]
    pub starting_height: i32,
    #[serde(rename = "banscore", skip_serializing_if = "Option::is_none")]
    pub ban_score: Option<i32>,
    #[serde(rename = "syncnode")]
    pub sync_node: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AddedNodeAddress {
    pub address: String,
    /// "inbound", "outbound" or "false"
    pub connected: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AddedNodeRecord {
    #[serde(rename = "addednode")]
    pub added_node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddedNodeAddress>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NetTotalsRecord {
    #[serde(rename = "totalbytesrecv")]
    pub total_bytes_recv: u64,
    #[serde(rename = "totalbytessent")]
    pub total_bytes_sent: u64,
    #[serde(rename = "timemillis")]
    pub time_millis: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub name: String,
    pub limited: bool,
    pub reachable: bool,
    /// host:port, empty when no proxy is configured
    pub proxy: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalAddressRecord {
    pub address: String,
    pub port: u16,
    pub score: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkInfoRecord {
    pub version: i32,
    pub subversion: String,
    #[serde(rename = "protocolversion")]
    pub protocol_version: i32,
    #[serde(rename = "localservices")]
    pub local_services: String,
    #[serde(rename = "timeoffset")]
    pub time_offset: i64,
    pub connections: usize,
    #[serde(rename = "relayfee")]
    pub relay_fee: f64,
    pub networks: Vec<NetworkSummary>,
    #[serde(rename = "localaddresses")]
    pub local_addresses: Vec<LocalAddressRecord>,
    pub alerts: Vec<AlertSummary>,
}

pub struct PeerDirectoryService {
    identity: NodeIdentity,
    registry: Arc<PeerConnectionRegistry>,
    added: Arc<AddedPeerList>,
    resolver: Arc<dyn AddressResolver>,
    misbehavior: Arc<dyn MisbehaviorLookup>,
    reachability: Arc<Reachability>,
    alerts: Arc<AlertStore>,
    clock: Arc<dyn Clock>,
}

impl PeerDirectoryService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: NodeIdentity,
        registry: Arc<PeerConnectionRegistry>,
        added: Arc<AddedPeerList>,
        resolver: Arc<dyn AddressResolver>,
        misbehavior: Arc<dyn MisbehaviorLookup>,
        reachability: Arc<Reachability>,
        alerts: Arc<AlertStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            registry,
            added,
            resolver,
            misbehavior,
            reachability,
            alerts,
            clock,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Ask every peer for a fresh ping measurement
    pub fn ping(&self) {
        self.registry.queue_ping_all();
    }

    pub fn add_node(&self, addr: &str) -> Result<(), DirectoryError> {
        self.added.add(addr)
    }

    pub fn remove_node(&self, addr: &str) -> Result<(), DirectoryError> {
        self.added.remove(addr)
    }

    pub fn connect_once(&self, addr: &str, connector: &dyn Connector) {
        self.added.connect_once(addr, connector);
    }

    pub fn get_peer_info(&self) -> Vec<PeerInfoRecord> {
        let now = Instant::now();
        self.registry
            .snapshot()
            .iter()
            .map(|stats| self.peer_record(stats, now))
            .collect()
    }

    fn peer_record(&self, stats: &PeerStats, now: Instant) -> PeerInfoRecord {
        PeerInfoRecord {
            addr: stats.addr_name.clone(),
            addr_local: stats.addr_local.map(|a| a.to_string()),
            services: format!("{:016x}", stats.services),
            last_send: stats.last_send,
            last_recv: stats.last_recv,
            bytes_sent: stats.bytes_sent,
            bytes_recv: stats.bytes_recv,
            conn_time: stats.conn_time,
            ping_time: stats.ping_time.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            ping_wait: stats.ping_wait(now).map(|d| d.as_secs_f64()),
            version: stats.version,
            sub_version: stats.sub_version.clone(),
            inbound: stats.direction.is_inbound(),
            starting_height: stats.starting_height,
            ban_score: self.misbehavior.misbehavior(stats.id),
            sync_node: stats.sync_node,
        }
    }

    /// Added nodes, optionally resolved and matched against live connections.
    /// With a `filter`, only that node is reported and it must be in the list.
    pub async fn get_added_node_info(
        &self,
        resolve_dns: bool,
        filter: Option<&str>,
    ) -> Result<Vec<AddedNodeRecord>, DirectoryError> {
        let nodes = match filter {
            Some(addr) => vec![self
                .added
                .find(addr)
                .ok_or_else(|| DirectoryError::NotPresent(addr.trim().to_string()))?],
            None => self.added.list(),
        };

        if !resolve_dns {
            return Ok(nodes
                .into_iter()
                .map(|added_node| AddedNodeRecord {
                    added_node,
                    connected: None,
                    addresses: None,
                })
                .collect());
        }

        let mut resolved: Vec<(String, Vec<SocketAddr>)> = Vec::with_capacity(nodes.len());
        for node in nodes {
            match self.resolver.resolve(&node, self.identity.default_port).await {
                Ok(endpoints) => resolved.push((node, endpoints)),
                Err(e) => {
                    debug!("Could not resolve added node {}: {}", node, e);
                    resolved.push((node, Vec::new()));
                }
            }
        }

        // Taken after resolution so the cross-reference reflects the present
        let live = self.registry.snapshot();
        Ok(resolved
            .into_iter()
            .map(|(added_node, endpoints)| cross_reference(added_node, &endpoints, &live))
            .collect())
    }

    pub fn get_network_totals(&self) -> NetTotalsRecord {
        NetTotalsRecord {
            total_bytes_recv: self.registry.total_bytes_recv(),
            total_bytes_sent: self.registry.total_bytes_sent(),
            time_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn get_network_info(&self) -> NetworkInfoRecord {
        let networks = Network::ALL
            .into_iter()
            .filter(|n| *n != Network::Unroutable)
            .map(|n| NetworkSummary {
                name: n.name().to_string(),
                limited: self.reachability.is_limited(n),
                reachable: self.reachability.is_reachable(n),
                proxy: self
                    .reachability
                    .proxy(n)
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            })
            .collect();

        let local_addresses = self
            .reachability
            .local_addresses()
            .into_iter()
            .map(|(ip, info)| LocalAddressRecord {
                address: ip.to_string(),
                port: info.port,
                score: info.score,
            })
            .collect();

        let alerts = self
            .alerts
            .active()
            .iter()
            .map(AlertSummary::from_alert)
            .collect();

        NetworkInfoRecord {
            version: self.identity.client_version,
            subversion: format_sub_version(
                &self.identity.client_name,
                self.identity.client_version,
                &self.identity.sub_version_comments,
            ),
            protocol_version: self.identity.protocol_version,
            local_services: format!("{:016x}", self.identity.local_services),
            time_offset: self.clock.time_offset(),
            connections: self.registry.connection_count(),
            relay_fee: self.identity.relay_fee,
            networks,
            local_addresses,
            alerts,
        }
    }
}

fn cross_reference(added_node: String, endpoints: &[SocketAddr], live: &[PeerStats]) -> AddedNodeRecord {
    let mut any_connected = false;
    let addresses = endpoints
        .iter()
        .map(|endpoint| {
            let direction = live
                .iter()
                .find(|peer| peer.addr == *endpoint)
                .map(|peer| peer.direction);
            any_connected |= direction.is_some();
            AddedNodeAddress {
                address: endpoint.to_string(),
                connected: direction
                    .map(|d| d.as_str())
                    .unwrap_or("false")
                    .to_string(),
            }
        })
        .collect();

    AddedNodeRecord {
        added_node,
        connected: Some(any_connected),
        addresses: Some(addresses),
    }
}
