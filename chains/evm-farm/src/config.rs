use anyhow::Result;
use config::{Config, Environment, File};
use farm_core::{ConfigError, GasGateConfig, GeneralProxyConfig, TelegramConfig};
use serde::Deserialize;

/// Immutable per-run settings, loaded from a TOML file with env-var
/// overrides (prefix `FARM`, `__` separator) so secrets like the RPC
/// URL, proxy address and Telegram token can live in `.env`.
#[derive(Debug, Deserialize, Clone)]
pub struct FarmConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    #[serde(default)]
    pub shuffle_wallets: bool,
    #[serde(default = "default_wallets_file")]
    pub wallets_file: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Inter-account delay range in seconds. A zero maximum skips the
    /// delay entirely.
    pub account_delay_secs: (u64, u64),
    /// Delay range between sub-steps inside one activity (badge mints).
    #[serde(default = "default_activity_delay")]
    pub activity_delay_secs: (u64, u64),

    /// Gas price multiplier range for the estimate-then-multiply policy.
    pub gas_price_multiplier: (f64, f64),
    /// Gas limit multiplier range for the estimate-then-multiply policy.
    pub gas_limit_multiplier: (f64, f64),

    pub gas_gate: GasGateConfig,

    #[serde(default)]
    pub general_proxy: GeneralProxyConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Selected activity: "deposit", "balance-check" or "canvas".
    pub activity: String,

    pub deposit: Option<DepositConfig>,
    pub canvas: Option<CanvasConfig>,
}

/// Parameters of the points-farming deposit activity.
#[derive(Debug, Deserialize, Clone)]
pub struct DepositConfig {
    /// ETH, USDC or USDT
    pub currency: String,
    /// Balance left untouched in the wallet (min, max), human units.
    pub untouchable_amount: (f64, f64),
    /// Share of the remaining balance to deposit (min, max), 0..=1.
    pub percentage: (f64, f64),
    pub min_amount: f64,
    pub max_amount: f64,
    /// Skip wallets that already hold a deposit.
    #[serde(default)]
    pub single_deposit: bool,
    /// Round the wei amount down to this many significant figures (min, max).
    pub round_wei_to_figures: (u32, u32),
}

/// Parameters of the canvas profile + badge mint activity.
#[derive(Debug, Deserialize, Clone)]
pub struct CanvasConfig {
    /// Fixed username; generated when absent or taken.
    pub username: Option<String>,
    /// Badge contract addresses to never attempt.
    #[serde(default)]
    pub badges_to_skip: Vec<String>,
    /// Per-user badge cap range (min, max); the cap is drawn per wallet.
    pub badge_limit: (u32, u32),
    #[serde(default = "default_ref_codes_file")]
    pub ref_codes_file: String,
    #[serde(default = "default_own_codes_file")]
    pub own_codes_file: String,
}

impl FarmConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FARM").separator("__"))
            .build()?;

        let config: FarmConfig = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Every (min, max) pair that ends up in a gen_range call must be
        // checked here; an inverted pair would panic mid-run otherwise.
        let mut ranges = vec![
            ("account_delay_secs", self.account_delay_secs.0 as f64, self.account_delay_secs.1 as f64),
            ("activity_delay_secs", self.activity_delay_secs.0 as f64, self.activity_delay_secs.1 as f64),
            ("gas_price_multiplier", self.gas_price_multiplier.0, self.gas_price_multiplier.1),
            ("gas_limit_multiplier", self.gas_limit_multiplier.0, self.gas_limit_multiplier.1),
        ];
        if let Some(deposit) = &self.deposit {
            ranges.push((
                "deposit.untouchable_amount",
                deposit.untouchable_amount.0,
                deposit.untouchable_amount.1,
            ));
            ranges.push(("deposit.percentage", deposit.percentage.0, deposit.percentage.1));
            ranges.push((
                "deposit.round_wei_to_figures",
                deposit.round_wei_to_figures.0 as f64,
                deposit.round_wei_to_figures.1 as f64,
            ));
        }
        if let Some(canvas) = &self.canvas {
            ranges.push((
                "canvas.badge_limit",
                canvas.badge_limit.0 as f64,
                canvas.badge_limit.1 as f64,
            ));
        }
        for (field, min, max) in ranges {
            if min > max {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "min exceeds max".to_string(),
                });
            }
        }

        match self.activity.as_str() {
            "deposit" if self.deposit.is_none() => Err(ConfigError::MissingField {
                field: "deposit".to_string(),
            }),
            "canvas" if self.canvas.is_none() => Err(ConfigError::MissingField {
                field: "canvas".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn default_explorer_url() -> String {
    "https://etherscan.io".to_string()
}

fn default_wallets_file() -> String {
    "wallets.txt".to_string()
}

fn default_results_dir() -> String {
    "results".to_string()
}

fn default_provider_timeout() -> u64 {
    30
}

fn default_activity_delay() -> (u64, u64) {
    (5, 15)
}

fn default_ref_codes_file() -> String {
    "data/ref_codes.txt".to_string()
}

fn default_own_codes_file() -> String {
    "data/own_codes.txt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> &'static str {
        r#"
            rpc_url = "https://rpc.example"
            chain_id = 1
            activity = "balance-check"
            account_delay_secs = [100, 1000]
            gas_price_multiplier = [1.0, 1.1]
            gas_limit_multiplier = [1.05, 1.1]

            [gas_gate]
            enabled = true
            start_gwei = 1.0
            step_gwei = 0.5
            step_interval_minutes = 0.1
            max_gwei = 2.0
        "#
    }

    fn load_str(toml: &str) -> Result<FarmConfig> {
        let settings = Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let config: FarmConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let config = load_str(base_toml()).unwrap();
        assert_eq!(config.wallets_file, "wallets.txt");
        assert_eq!(config.results_dir, "results");
        assert_eq!(config.provider_timeout_secs, 30);
        assert!(!config.shuffle_wallets);
        assert!(config.general_proxy.address.is_none());
        assert_eq!(config.general_proxy.settle_delay_secs, 15);
    }

    #[test]
    fn deposit_activity_requires_section() {
        let toml = base_toml().replace("balance-check", "deposit");
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn deposit_section_parses() {
        let toml = format!(
            "{}\n{}",
            base_toml().replace("balance-check", "deposit"),
            r#"
            [deposit]
            currency = "ETH"
            untouchable_amount = [0.001, 0.003]
            percentage = [0.95, 1.0]
            min_amount = 0.001
            max_amount = 2.0
            single_deposit = true
            round_wei_to_figures = [3, 5]
            "#
        );
        let config = load_str(&toml).unwrap();
        let deposit = config.deposit.unwrap();
        assert_eq!(deposit.currency, "ETH");
        assert!(deposit.single_deposit);
        assert_eq!(deposit.round_wei_to_figures, (3, 5));
    }

    #[test]
    fn inverted_delay_range_is_rejected() {
        let toml = base_toml().replace("[100, 1000]", "[1000, 100]");
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn inverted_activity_delay_range_is_rejected() {
        let toml = base_toml().replace(
            "account_delay_secs = [100, 1000]",
            "account_delay_secs = [100, 1000]\nactivity_delay_secs = [15, 5]",
        );
        assert!(load_str(&toml).is_err());
    }

    fn deposit_toml() -> String {
        format!(
            "{}\n{}",
            base_toml().replace("balance-check", "deposit"),
            r#"
            [deposit]
            currency = "ETH"
            untouchable_amount = [0.001, 0.003]
            percentage = [0.95, 1.0]
            min_amount = 0.001
            max_amount = 2.0
            round_wei_to_figures = [3, 5]
            "#
        )
    }

    #[test]
    fn inverted_untouchable_range_is_rejected() {
        let toml = deposit_toml().replace("[0.001, 0.003]", "[0.003, 0.001]");
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn inverted_percentage_range_is_rejected() {
        let toml = deposit_toml().replace("[0.95, 1.0]", "[1.0, 0.95]");
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn inverted_figures_range_is_rejected() {
        let toml = deposit_toml().replace("[3, 5]", "[5, 3]");
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn inverted_badge_limit_range_is_rejected() {
        let toml = format!(
            "{}\n{}",
            base_toml().replace("balance-check", "canvas"),
            r#"
            [canvas]
            badge_limit = [5, 2]
            "#
        );
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn optional_section_ranges_are_checked_even_when_inactive() {
        // a deposit block left in the file still gets validated when the
        // selected activity is something else
        let toml = deposit_toml()
            .replace("deposit\"", "balance-check\"")
            .replace("[0.001, 0.003]", "[0.003, 0.001]");
        assert!(load_str(&toml).is_err());
    }
}
