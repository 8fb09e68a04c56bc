use bitcoin::Amount;
use thiserror::Error;

/// Errors that can occur in the lbry-wallet
#[derive(Error, Debug)]
pub enum WalletError {
    /// A reservation asked for more than the spendable balance
    #[error("Insufficient funds: requested {requested}, spendable {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    /// The remote ledger answered but reported a non-success outcome
    #[error("{operation} failed: {reason}")]
    RemoteOperationFailed { operation: String, reason: String },

    /// Network or HTTP layer failure
    #[error("Transport error: {0}")]
    TransportError(String),

    /// JSON-RPC response carried a non-null `error`
    #[error("JSON-RPC error: {0}")]
    ProtocolError(serde_json::Value),

    /// JSON-RPC response had neither a result nor an error
    #[error("JSON-RPC error (code -343): missing JSON-RPC result")]
    MissingResult,

    /// The remote ledger reported success but its result could not be decoded.
    /// The spend went through, so funds held for it are not released.
    #[error("Remote operation succeeded with an undecodable result: {0}")]
    MalformedSuccess(String),

    /// Malformed local input, rejected before any network call
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Login or key handling failed
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}

impl WalletError {
    pub fn remote_failure(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        WalletError::RemoteOperationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// True for the pre-flight funds check, as opposed to a remote rejection
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, WalletError::InsufficientFunds { .. })
    }

    /// True when the remote side acted even though the caller got an error
    pub fn is_malformed_success(&self) -> bool {
        matches!(self, WalletError::MalformedSuccess(_))
    }

    pub fn is_remote_failure(&self) -> bool {
        matches!(self, WalletError::RemoteOperationFailed { .. })
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        WalletError::TransportError(error.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::TransportError(format!("Malformed response body: {}", error))
    }
}

impl From<rusqlite::Error> for WalletError {
    fn from(error: rusqlite::Error) -> Self {
        WalletError::DatabaseError(error.to_string())
    }
}
