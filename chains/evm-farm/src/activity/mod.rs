use crate::config::FarmConfig;
use anyhow::Result;
use ethers::prelude::*;

pub mod balance;
pub mod canvas;
pub mod deposit;

pub use balance::BalanceCheckActivity;
pub use canvas::CanvasActivity;
pub use deposit::DepositActivity;

pub use farm_core::{Activity, ActivityReport, ReportEntry};

/// Everything an activity needs for one wallet: a provider already
/// bound to the wallet's proxy and timeout, the signer, and an HTTP
/// client sharing the same egress.
#[derive(Clone, Debug)]
pub struct ActivityContext {
    pub provider: Provider<Http>,
    pub wallet: LocalWallet,
    pub config: FarmConfig,
    pub proxy: Option<String>,
    pub http: reqwest::Client,
}

// Trait alias
pub type FarmActivity = dyn Activity<ActivityContext> + Send + Sync;

/// Builds the activity selected in the configuration.
pub fn select(name: &str) -> Result<Box<FarmActivity>> {
    match name {
        "deposit" => Ok(Box::new(DepositActivity::new())),
        "balance-check" => Ok(Box::new(BalanceCheckActivity)),
        "canvas" => Ok(Box::new(CanvasActivity::new())),
        other => anyhow::bail!("unknown activity: {}", other),
    }
}
