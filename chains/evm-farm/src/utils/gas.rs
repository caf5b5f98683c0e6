use ethers::prelude::*;
use farm_core::{GasCeiling, GasGateConfig};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_DELAY_SECS: (u64, u64) = (30, 60);

/// Blocks until the network gas price drops to the rising personal
/// ceiling, or returns immediately when gating is disabled.
///
/// The gate never fails: RPC errors are logged and polled through, and
/// there is deliberately no bound on the total wait - it is meant to
/// run unattended for hours.
pub async fn wait_for_gas<M: Middleware>(provider: &M, config: &GasGateConfig) {
    if !config.enabled {
        return;
    }

    let mut ceiling = GasCeiling::new(config);
    info!(
        "Waiting for gas price <= {:.2} gwei (max ceiling {:.2})",
        ceiling.current_gwei(),
        config.max_gwei
    );

    loop {
        ceiling.tick(Instant::now());

        match provider.get_gas_price().await {
            Ok(price) => {
                let price_gwei = wei_to_gwei(price);
                if ceiling.admits(price_gwei) {
                    info!(
                        "gas ok at {:.2} gwei (ceiling {:.2}), proceeding",
                        price_gwei,
                        ceiling.current_gwei()
                    );
                    return;
                }
                info!(
                    "gas {:.2} gwei above ceiling {:.2} gwei, waiting",
                    price_gwei,
                    ceiling.current_gwei()
                );
            }
            Err(e) => {
                warn!("Failed to fetch gas price: {}", e);
            }
        }

        let delay = rand::thread_rng().gen_range(POLL_DELAY_SECS.0..=POLL_DELAY_SECS.1);
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}

pub fn wei_to_gwei(wei: U256) -> f64 {
    wei.as_u128() as f64 / 1e9
}

/// Draws one multiplier from the configured range.
pub fn draw_multiplier(range: (f64, f64)) -> f64 {
    rand::thread_rng().gen_range(range.0..=range.1)
}

/// Estimate-then-multiply policy: the multiplier is coarsened to two
/// decimals and applied with integer division so the result stays a
/// whole smallest-unit value.
pub fn apply_multiplier(value: U256, multiplier: f64) -> U256 {
    value * U256::from((multiplier * 100.0) as u64) / U256::from(100u64)
}
