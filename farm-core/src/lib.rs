//! # Farm Core - Shared Utilities for Wallet Farming
//!
//! This crate provides the chain-agnostic pieces of the farming bot:
//! the flat-file wallet ledger, the rising gas-ceiling schedule, retry
//! helpers, proxy rotation, Telegram notifications and logging setup.
//!
//! ## Modules
//!
//! - [`config`] - Shared configuration structures
//! - [`error`] - Typed error handling with thiserror
//! - [`traits`] - Activity trait and report types
//! - [`utils`] - Utility modules (ledger, gas gate, retry, proxy, notify)

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod error;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{GasGateConfig, GeneralProxyConfig, TelegramConfig};
pub use error::{ActivityError, ConfigError, LedgerError};
pub use traits::{Activity, ActivityReport, ReportEntry};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{
    setup_logger, GasCeiling, LinePool, Notifier, RotatingProxy, Secret, WalletLedger,
    WalletRecord,
};

// Export retry utilities for call sites and tests
pub use utils::retry::{with_retry, RetryConfig};
