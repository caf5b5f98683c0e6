use anyhow::{anyhow, Result};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Static description of a supported mainnet asset.
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    pub address: &'static str,
    pub decimals: u32,
    pub is_stable: bool,
}

pub const SUPPORTED_CURRENCIES: [&str; 3] = ["ETH", "USDC", "USDT"];

static TOKENS: Lazy<HashMap<&'static str, TokenInfo>> = Lazy::new(|| {
    HashMap::from([
        (
            "ETH",
            TokenInfo {
                address: "0x0000000000000000000000000000000000000000",
                decimals: 18,
                is_stable: false,
            },
        ),
        (
            "USDC",
            TokenInfo {
                address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                decimals: 6,
                is_stable: true,
            },
        ),
        (
            "USDT",
            TokenInfo {
                address: "0xdac17f958d2ee523a2206206994597c13d831ec7",
                decimals: 6,
                is_stable: true,
            },
        ),
    ])
});

pub fn token(symbol: &str) -> Result<TokenInfo> {
    TOKENS
        .get(symbol)
        .copied()
        .ok_or_else(|| anyhow!("unknown currency: {}", symbol))
}

pub fn token_address(symbol: &str) -> Result<Address> {
    Ok(token(symbol)?.address.parse()?)
}

/// Converts a human-unit amount to the asset's smallest unit. The float
/// is printed at the asset's full precision first so sub-wei noise from
/// f64 arithmetic never reaches the parser.
pub fn to_wei(symbol: &str, amount: f64) -> Result<U256> {
    let decimals = token(symbol)?.decimals;
    let amount_str = format!("{:.prec$}", amount, prec = decimals as usize);
    Ok(ethers::utils::parse_units(amount_str, decimals)?.into())
}

pub fn from_wei(symbol: &str, amount: U256) -> Result<f64> {
    let decimals = token(symbol)?.decimals;
    let formatted = ethers::utils::format_units(amount, decimals)?;
    Ok(formatted.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_conversion_roundtrip() {
        let wei = to_wei("ETH", 1.5).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(from_wei("ETH", wei).unwrap(), 1.5);
    }

    #[test]
    fn usdc_uses_six_decimals() {
        let units = to_wei("USDC", 12.345678).unwrap();
        assert_eq!(units, U256::from(12_345_678u64));
    }

    #[test]
    fn tiny_eth_amount_survives_float_precision() {
        let wei = to_wei("ETH", 0.001).unwrap();
        assert_eq!(wei, U256::from(1_000_000_000_000_000u128));
    }

    #[test]
    fn unknown_currency_is_an_error() {
        assert!(token("DOGE").is_err());
        assert!(to_wei("DOGE", 1.0).is_err());
    }

    #[test]
    fn stables_are_flagged() {
        assert!(token("USDT").unwrap().is_stable);
        assert!(!token("ETH").unwrap().is_stable);
    }
}
