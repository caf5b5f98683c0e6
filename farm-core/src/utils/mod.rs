//! # Utilities Module
//!
//! Internal utility modules for the farm-core crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod gas_gate;
pub(crate) mod ledger;
pub(crate) mod logger;
pub(crate) mod notify;
pub(crate) mod proxy;
pub(crate) mod retry;

// Selective exports - only public utilities
pub use gas_gate::GasCeiling;
pub use ledger::{LinePool, Secret, WalletLedger, WalletRecord};
pub use logger::setup_logger;
pub use notify::Notifier;
pub use proxy::RotatingProxy;
