//! Peer directory and alert broadcast for a nodenet full node.
//!
//! The daemon binary (`nodenetd`) wires these pieces together; the
//! library is what the integration tests and benches drive.

pub mod alert;
pub mod config;
pub mod constants;
pub mod error;
pub mod network;
pub mod network_type;
pub mod peer_directory;
pub mod rpc;
pub mod shutdown;
pub mod time_sync;

pub use network_type::NetworkType;
