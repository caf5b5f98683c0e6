use crate::activity::deposit::{DepositActivity, FUEL_ADDRESS};
use crate::activity::{Activity, ActivityContext, ActivityReport};
use crate::utils::tokens::{self, SUPPORTED_CURRENCIES};
use async_trait::async_trait;
use ethers::prelude::*;
use farm_core::ActivityError;
use std::sync::Arc;
use tracing::info;

/// Read-only sweep over the farming contract: logs what each wallet has
/// already deposited, per supported asset. Useful as a dry run before
/// pointing the deposit activity at a freshly imported wallet file.
pub struct BalanceCheckActivity;

#[async_trait]
impl Activity<ActivityContext> for BalanceCheckActivity {
    fn name(&self) -> &str {
        "balance-check"
    }

    async fn run(&self, ctx: ActivityContext) -> Result<ActivityReport, ActivityError> {
        let client = Arc::new(SignerMiddleware::new(
            ctx.provider.clone(),
            ctx.wallet.clone(),
        ));
        let fuel = DepositActivity::fuel_contract(client)?;
        let owner = ctx.wallet.address();

        let mut any = false;
        for currency in SUPPORTED_CURRENCIES {
            let token = tokens::token_address(currency)?;
            let deposited: U256 = fuel
                .method("getBalance", (owner, token))
                .map_err(anyhow::Error::from)?
                .call()
                .await
                .map_err(anyhow::Error::from)?;

            if !deposited.is_zero() {
                any = true;
                info!(
                    "deposited in {}: {} {}",
                    FUEL_ADDRESS,
                    tokens::from_wei(currency, deposited)?,
                    currency
                );
            }
        }

        if !any {
            info!("no deposits found for {:?}", owner);
        }

        Ok(ActivityReport::default())
    }
}
