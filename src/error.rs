use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Conflicts raised when mutating the added-node list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Error: Node already added: {0}")]
    AlreadyPresent(String),

    #[error("Error: Node has not been added: {0}")]
    NotPresent(String),
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error(
        "Invalid client subversion(s) string '{0}': expected empty (all clients) or '/name:ver/' entries separated by '/'"
    )]
    MalformedSubversionSpec(String),

    #[error("Invalid alert window: {0}")]
    InvalidWindow(String),

    #[error("Unable to sign alert, check private key: {0}")]
    SigningFailed(String),

    #[error("Failed to process alert: {0}")]
    AlertRejected(String),

    #[error("Alert serialization error: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Name lookup disabled, cannot resolve '{0}'")]
    LookupDisabled(String),

    #[error("Lookup of '{host}' failed: {reason}")]
    LookupFailed { host: String, reason: String },
}
