//! Global constants for the node's network layer
//!
//! Centralizes the identifiers and magic numbers reported over RPC and
//! baked into alerts.

/// Client identity reported to peers and operators
pub mod client {
    /// Name used in the BIP14-style subversion string
    pub const CLIENT_NAME: &str = "nodenet";

    /// Numeric client version (major * 1_000_000 + minor * 10_000 + patch * 100)
    pub const CLIENT_VERSION: i32 = 90300;

    /// P2P protocol version negotiated in the version handshake
    pub const PROTOCOL_VERSION: i32 = 70010;

    /// Format the subversion string peers see, e.g. `/nodenet:0.9.3/`
    pub fn format_sub_version(name: &str, version: i32, comments: &[String]) -> String {
        let mut out = format!(
            "/{}:{}.{}.{}",
            name,
            version / 1_000_000,
            (version / 10_000) % 100,
            (version / 100) % 100
        );
        if !comments.is_empty() {
            out.push_str(&format!("({})", comments.join("; ")));
        }
        out.push('/');
        out
    }
}

/// Service bits advertised in the version handshake
pub mod services {
    /// Full node serving the complete block chain
    pub const NODE_NETWORK: u64 = 1;
}

/// Alert protocol constants
pub mod alert {
    pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

    /// Relay and expiry window applied when the operator gives none
    pub const DEFAULT_RELAY_DAYS: i64 = 365;
    pub const DEFAULT_EXPIRE_DAYS: i64 = 365;

    /// Separator delimiting subversion entries in an alert target list
    pub const SUBVERSION_SEPARATOR: char = '/';

    /// How often expired alerts are dropped from the store
    pub const PRUNE_INTERVAL_SECS: u64 = 60;

    /// Public keys from the RFC 8032 ed25519 test vectors. Their secret
    /// keys are published, so none of them may act as the alert authority.
    pub const PUBLISHED_TEST_KEYS: &[&str] = &[
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c",
        "fc51cd8e6218a1a38da47ed00230f0580816ed13ba3303ac5deb911548908025",
        "278117fc144c72340f67d0f2316e8386ceffbf2b2428c9c51fef7c597f1d426e",
        "ec172b93ad5e563bf4932c70e1245034c35467ef2efd4d64ebf819683467e2bf",
    ];
}

/// Peer bookkeeping limits
pub mod peers {
    /// Misbehavior score at which a peer gets disconnected and banned
    pub const DEFAULT_BAN_SCORE: i32 = 100;

    /// Characters allowed to survive subversion sanitizing
    pub const SAFE_SUBVERSION_CHARS: &str = " .,;_/:?@()";

    /// Score of a local address the operator configured explicitly
    pub const LOCAL_MANUAL_SCORE: i32 = 4;
}

/// Minimum relay fee for non-free transactions, in coins per kB
pub const DEFAULT_MIN_RELAY_FEE: f64 = 0.00001;
