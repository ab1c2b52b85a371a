pub mod added_peers;
pub mod message;
pub mod peer_connection;
pub mod peer_connection_registry;
pub mod peer_scoring;
pub mod reachability;
pub mod resolver;
