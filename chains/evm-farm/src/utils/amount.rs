use crate::config::DepositConfig;
use crate::utils::tokens;
use ethers::types::U256;
use farm_core::ActivityError;
use rand::Rng;

/// Bounds for the randomized, balance-aware deposit amount.
#[derive(Debug, Clone)]
pub struct AmountParams {
    pub untouchable: (f64, f64),
    pub percentage: (f64, f64),
    pub min_amount: f64,
    pub max_amount: f64,
    pub round_figures: (u32, u32),
}

impl From<&DepositConfig> for AmountParams {
    fn from(config: &DepositConfig) -> Self {
        Self {
            untouchable: config.untouchable_amount,
            percentage: config.percentage,
            min_amount: config.min_amount,
            max_amount: config.max_amount,
            round_figures: config.round_wei_to_figures,
        }
    }
}

/// Derives a deposit amount from the wallet balance.
///
/// The low-balance floor check uses the *maximum* possible untouchable
/// draw so it stays deterministic regardless of the randomness below.
/// The drawn percentage is coarsened to a whole percent and applied
/// with integer division; the result is then rounded down to a random
/// significant-figure count to avoid amounts with bot-like precision.
/// Depositing the full balance exactly skips that rounding.
pub fn deposit_amount(
    balance: U256,
    currency: &str,
    params: &AmountParams,
    rng: &mut impl Rng,
) -> Result<U256, ActivityError> {
    let untouchable_max = tokens::to_wei(currency, params.untouchable.1)?;
    let min_amount = tokens::to_wei(currency, params.min_amount)?;
    let max_amount = tokens::to_wei(currency, params.max_amount)?;

    if untouchable_max + min_amount > balance {
        return Err(ActivityError::LowBalance(format!(
            "max untouchable amount is set to {} and min deposit amount is set to {} but wallet balance is {}",
            params.untouchable.1,
            params.min_amount,
            tokens::from_wei(currency, balance)?
        )));
    }

    let untouchable_human = rng.gen_range(params.untouchable.0..=params.untouchable.1);
    let untouchable = tokens::to_wei(currency, untouchable_human)?;
    let remaining = balance - untouchable;

    let cap = remaining.min(max_amount);

    let percentage = rng.gen_range(params.percentage.0..=params.percentage.1);
    let whole_percent = (percentage * 100.0).round() as u64;
    let raw = cap * U256::from(whole_percent) / U256::from(100u64);

    // Depositing 100% of the balance is not a sybil-looking amount and
    // needs no obfuscation.
    let amount = if raw == balance {
        raw
    } else {
        let figures = rng.gen_range(params.round_figures.0..=params.round_figures.1);
        round_to_figures(raw, figures)
    };

    if amount < min_amount {
        return Err(ActivityError::LowBalance(format!(
            "computed amount {} is below the configured minimum {}",
            tokens::from_wei(currency, amount)?,
            params.min_amount
        )));
    }

    Ok(amount)
}

/// Rounds down to `figures` significant decimal digits. Amounts with
/// fewer digits than that pass through unchanged.
pub fn round_to_figures(amount: U256, figures: u32) -> U256 {
    if amount.is_zero() {
        return amount;
    }

    let digits = amount.to_string().len() as u32;
    if digits <= figures {
        return amount;
    }

    let scale = U256::exp10((digits - figures) as usize);
    (amount / scale) * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ETH: U256 = U256([1_000_000_000_000_000_000u64, 0, 0, 0]);

    fn params() -> AmountParams {
        AmountParams {
            untouchable: (0.001, 0.003),
            percentage: (0.95, 1.0),
            min_amount: 0.001,
            max_amount: 2.0,
            round_figures: (3, 5),
        }
    }

    #[test]
    fn round_truncates_to_significant_figures() {
        let n = U256::from(987_654_321u64);
        assert_eq!(round_to_figures(n, 3), U256::from(987_000_000u64));
        assert_eq!(round_to_figures(n, 5), U256::from(987_650_000u64));
    }

    #[test]
    fn round_keeps_short_numbers_unchanged() {
        let n = U256::from(123u64);
        assert_eq!(round_to_figures(n, 5), n);
        assert_eq!(round_to_figures(U256::zero(), 3), U256::zero());
    }

    #[test]
    fn amount_never_exceeds_balance() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let amount = deposit_amount(ETH, "ETH", &params(), &mut rng).unwrap();
            assert!(amount <= ETH, "seed {}: {} > balance", seed, amount);
        }
    }

    #[test]
    fn amount_respects_conservative_untouchable_floor() {
        // untouchable(max) + amount must never exceed the balance when
        // the cap binds at the remaining balance
        let mut p = params();
        p.round_figures = (18, 18); // disable rounding to test raw bounds
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let amount = deposit_amount(ETH, "ETH", &p, &mut rng).unwrap();
            // upper bound: (1.0 - 0.001) ETH, lower: 0.95 * (1.0 - 0.003) ETH
            let upper = U256::from(999_000_000_000_000_000u64);
            let lower = U256::from(947_150_000_000_000_000u64);
            assert!(amount <= upper, "seed {}: {} above bound", seed, amount);
            assert!(amount >= lower, "seed {}: {} below bound", seed, amount);
        }
    }

    #[test]
    fn full_balance_is_returned_unrounded() {
        let balance = U256::from(123_456_789_012_345_677u64);
        let p = AmountParams {
            untouchable: (0.0, 0.0),
            percentage: (1.0, 1.0),
            min_amount: 0.001,
            max_amount: 2.0,
            round_figures: (1, 1),
        };
        let mut rng = StdRng::seed_from_u64(42);
        let amount = deposit_amount(balance, "ETH", &p, &mut rng).unwrap();
        assert_eq!(amount, balance);
    }

    #[test]
    fn partial_amount_is_rounded() {
        let p = AmountParams {
            round_figures: (3, 3),
            ..params()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let amount = deposit_amount(ETH, "ETH", &p, &mut rng).unwrap();
        let digits = amount.to_string();
        assert!(
            digits[3..].bytes().all(|b| b == b'0'),
            "expected 3 significant figures, got {}",
            digits
        );
    }

    #[test]
    fn zero_balance_is_low_balance() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = deposit_amount(U256::zero(), "ETH", &params(), &mut rng).unwrap_err();
        assert!(matches!(err, ActivityError::LowBalance(_)));
    }

    #[test]
    fn dust_balance_is_low_balance() {
        // less than untouchable(max) + min
        let dust = U256::from(3_000_000_000_000_000u64); // 0.003 ETH
        let mut rng = StdRng::seed_from_u64(1);
        let err = deposit_amount(dust, "ETH", &params(), &mut rng).unwrap_err();
        assert!(matches!(err, ActivityError::LowBalance(_)));
    }

    #[test]
    fn amount_below_minimum_after_percentage_is_low_balance() {
        // floor check passes, but 1% of the balance is under min_amount
        let p = AmountParams {
            untouchable: (0.0, 0.0),
            percentage: (0.01, 0.01),
            min_amount: 0.001,
            max_amount: 2.0,
            round_figures: (3, 5),
        };
        let balance = U256::from(2_100_000_000_000_000u64); // 0.0021 ETH
        let mut rng = StdRng::seed_from_u64(1);
        let err = deposit_amount(balance, "ETH", &p, &mut rng).unwrap_err();
        assert!(matches!(err, ActivityError::LowBalance(_)));
    }

    #[test]
    fn stable_amounts_use_token_decimals() {
        // 100 USDC balance, deposit nearly all of it
        let balance = U256::from(100_000_000u64);
        let p = AmountParams {
            untouchable: (1.0, 2.0),
            percentage: (0.95, 1.0),
            min_amount: 1.0,
            max_amount: 1000.0,
            round_figures: (2, 3),
        };
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let amount = deposit_amount(balance, "USDC", &p, &mut rng).unwrap();
            assert!(amount <= balance);
            assert!(amount >= U256::from(1_000_000u64)); // >= 1 USDC
        }
    }
}
