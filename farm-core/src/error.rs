//! # Core Error Types
//!
//! Centralized error definitions for the farm-core crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Per-wallet activity outcome errors.
///
/// The run loop classifies these into ledger transitions: `AlreadyDone`
/// commits the wallet as a success, everything else as a failure. None
/// of these halt the run loop; only ledger exhaustion does.
#[derive(Error, Debug)]
pub enum ActivityError {
    /// Wallet cannot safely cover the configured minimum deposit.
    #[error("low balance: {0}")]
    LowBalance(String),

    /// The activity was already completed for this wallet. Treated as
    /// success by the run loop, not a failure.
    #[error("{0}")]
    AlreadyDone(String),

    /// Unsupported asset or action for this activity.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// HTTP/RPC failure that survived its call-site retries.
    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActivityError {
    /// Short human message for logs and notifications. Provider-reported
    /// "insufficient funds" conditions are rewritten to a stable short
    /// form before they reach the operator.
    pub fn user_message(&self) -> String {
        let raw = self.to_string();
        if raw.to_lowercase().contains("insufficient funds") {
            "insufficient funds".to_string()
        } else {
            raw
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet ledger (flat-file store) errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed wallet line (expected 'name|secret|proxy'): {preview}")]
    MalformedLine { preview: String },
}
