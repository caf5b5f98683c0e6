use crate::activity::{Activity, ActivityContext, ActivityReport, ReportEntry};
use crate::utils::amount::{deposit_amount, AmountParams};
use crate::utils::gas::{apply_multiplier, draw_multiplier};
use crate::utils::tokens;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::types::transaction::eip712::TypedData;
use farm_core::ActivityError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

// https://app.fuel.network/earn-points/deposit/
pub const FUEL_ADDRESS: &str = "0x19b5cc75846BF6286d599ec116536a333C4C2c14";

const FUEL_ABI: &str = r#"[
    {"inputs":[{"name":"token","type":"address"},{"name":"amount","type":"uint256"},{"name":"depositParam","type":"uint256"}],"name":"deposit","outputs":[],"stateMutability":"payable","type":"function"},
    {"inputs":[{"name":"token","type":"address"},{"name":"amount","type":"uint256"},{"name":"depositParam","type":"uint256"},{"name":"deadline","type":"uint256"},{"name":"v","type":"uint8"},{"name":"r","type":"bytes32"},{"name":"s","type":"bytes32"}],"name":"depositWithPermit","outputs":[],"stateMutability":"nonpayable","type":"function"},
    {"inputs":[{"name":"user","type":"address"},{"name":"token","type":"address"}],"name":"getBalance","outputs":[{"name":"","type":"uint256"}],"stateMutability":"view","type":"function"}
]"#;

const ERC20_ABI: &str = r#"[
    {"constant":true,"inputs":[{"name":"_owner","type":"address"}],"name":"balanceOf","outputs":[{"name":"balance","type":"uint256"}],"type":"function"},
    {"constant":true,"inputs":[],"name":"name","outputs":[{"name":"","type":"string"}],"type":"function"},
    {"constant":true,"inputs":[],"name":"version","outputs":[{"name":"","type":"string"}],"type":"function"},
    {"constant":true,"inputs":[{"name":"owner","type":"address"}],"name":"nonces","outputs":[{"name":"","type":"uint256"}],"type":"function"}
]"#;

type FarmClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Deposits a randomized amount into the points-farming contract.
/// Native deposits go straight in; token deposits ride a signed EIP-712
/// permit so no separate approval transaction is needed.
pub struct DepositActivity {
    // EIP-712 signing domains per currency, fetched once per process
    domains: Mutex<HashMap<String, Value>>,
}

impl DepositActivity {
    pub fn new() -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn fuel_contract(client: Arc<FarmClient>) -> Result<Contract<FarmClient>> {
        let abi: ethers::abi::Abi = serde_json::from_str(FUEL_ABI)?;
        Ok(Contract::new(FUEL_ADDRESS.parse::<Address>()?, abi, client))
    }

    fn erc20_contract(address: Address, client: Arc<FarmClient>) -> Result<Contract<FarmClient>> {
        let abi: ethers::abi::Abi = serde_json::from_str(ERC20_ABI)?;
        Ok(Contract::new(address, abi, client))
    }

    async fn deposited_amount(
        fuel: &Contract<FarmClient>,
        owner: Address,
        currency: &str,
    ) -> Result<U256> {
        let token = tokens::token_address(currency)?;
        let deposited: U256 = fuel
            .method("getBalance", (owner, token))?
            .call()
            .await
            .context("getBalance call failed")?;
        debug!(
            "{:?} - already deposited {} amount: {}",
            owner, currency, deposited
        );
        Ok(deposited)
    }

    async fn wallet_balance(
        ctx: &ActivityContext,
        client: Arc<FarmClient>,
        owner: Address,
        currency: &str,
    ) -> Result<U256> {
        if currency == "ETH" {
            Ok(ctx.provider.get_balance(owner, None).await?)
        } else {
            let token = Self::erc20_contract(tokens::token_address(currency)?, client)?;
            Ok(token.method("balanceOf", owner)?.call().await?)
        }
    }

    async fn deposit_native(
        &self,
        ctx: &ActivityContext,
        fuel: &Contract<FarmClient>,
        amount: U256,
    ) -> Result<String> {
        let token = tokens::token_address("ETH")?;
        let call = fuel
            .method::<_, ()>("deposit", (token, amount, U256::zero()))?
            .value(amount);

        let estimated = call.estimate_gas().await?;
        let gas_limit = apply_multiplier(estimated, draw_multiplier(ctx.config.gas_limit_multiplier));
        debug!("gas limit: estimated {}, submitting {}", estimated, gas_limit);

        let call = call.gas(gas_limit);
        let pending = call.send().await?;
        let receipt = pending.await?.context("deposit receipt missing")?;

        Ok(format!("{:?}", receipt.transaction_hash))
    }

    async fn deposit_with_permit(
        &self,
        ctx: &ActivityContext,
        fuel: &Contract<FarmClient>,
        currency: &str,
        amount: U256,
    ) -> Result<String> {
        let token = tokens::token_address(currency)?;
        let deadline = U256::MAX;
        let signature = self.sign_permit(ctx, currency, amount, deadline).await?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        signature.r.to_big_endian(&mut r);
        signature.s.to_big_endian(&mut s);
        let v = signature.v as u8;

        let call = fuel.method::<_, ()>(
            "depositWithPermit",
            (token, amount, U256::zero(), deadline, v, r, s),
        )?;

        let estimated = call.estimate_gas().await?;
        let gas_limit = apply_multiplier(estimated, draw_multiplier(ctx.config.gas_limit_multiplier));
        debug!("gas limit: estimated {}, submitting {}", estimated, gas_limit);

        let call = call.gas(gas_limit);
        let pending = call.send().await?;
        let receipt = pending.await?.context("permit deposit receipt missing")?;

        Ok(format!("{:?}", receipt.transaction_hash))
    }

    async fn sign_permit(
        &self,
        ctx: &ActivityContext,
        currency: &str,
        amount: U256,
        deadline: U256,
    ) -> Result<Signature> {
        let owner = ctx.wallet.address();
        let domain = self.signing_domain(ctx, currency).await?;

        let token = Self::erc20_contract(
            tokens::token_address(currency)?,
            Arc::new(SignerMiddleware::new(
                ctx.provider.clone(),
                ctx.wallet.clone(),
            )),
        )?;
        let nonce: U256 = token.method("nonces", owner)?.call().await?;

        let typed: TypedData = serde_json::from_value(json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "Permit": [
                    {"name": "owner", "type": "address"},
                    {"name": "spender", "type": "address"},
                    {"name": "value", "type": "uint256"},
                    {"name": "nonce", "type": "uint256"},
                    {"name": "deadline", "type": "uint256"}
                ]
            },
            "primaryType": "Permit",
            "domain": domain,
            "message": {
                "owner": format!("{:?}", owner),
                "spender": FUEL_ADDRESS,
                "value": amount.to_string(),
                "nonce": nonce.to_string(),
                "deadline": deadline.to_string()
            }
        }))?;

        Ok(ctx.wallet.sign_typed_data(&typed).await?)
    }

    /// Returns the token's EIP-712 domain, fetching name/version from
    /// the contract on first use and caching for the process lifetime.
    async fn signing_domain(&self, ctx: &ActivityContext, currency: &str) -> Result<Value> {
        let mut cache = self.domains.lock().await;
        if let Some(domain) = cache.get(currency) {
            return Ok(domain.clone());
        }

        let address = tokens::token_address(currency)?;
        let token = Self::erc20_contract(
            address,
            Arc::new(SignerMiddleware::new(
                ctx.provider.clone(),
                ctx.wallet.clone(),
            )),
        )?;

        let name: String = token.method("name", ())?.call().await?;
        let version: String = token.method("version", ())?.call().await?;

        let domain = json!({
            "name": name,
            "version": version,
            "chainId": ctx.config.chain_id,
            "verifyingContract": format!("{:?}", address),
        });

        cache.insert(currency.to_string(), domain.clone());
        Ok(domain)
    }
}

impl Default for DepositActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Activity<ActivityContext> for DepositActivity {
    fn name(&self) -> &str {
        "deposit"
    }

    async fn run(&self, ctx: ActivityContext) -> Result<ActivityReport, ActivityError> {
        let config = ctx
            .config
            .deposit
            .clone()
            .ok_or_else(|| anyhow!("missing [deposit] configuration"))?;
        let currency = config.currency.as_str();

        if tokens::token(currency).is_err() {
            return Err(ActivityError::NotImplemented(format!(
                "{} deposits are not implemented",
                currency
            )));
        }

        let client = Arc::new(SignerMiddleware::new(
            ctx.provider.clone(),
            ctx.wallet.clone(),
        ));
        let fuel = Self::fuel_contract(client.clone())?;
        let owner = ctx.wallet.address();

        if config.single_deposit {
            let deposited = Self::deposited_amount(&fuel, owner, currency).await?;
            if !deposited.is_zero() {
                return Err(ActivityError::AlreadyDone(format!(
                    "already deposited {} {}",
                    tokens::from_wei(currency, deposited)?,
                    currency
                )));
            }
        }

        let balance = Self::wallet_balance(&ctx, client.clone(), owner, currency).await?;
        let params = AmountParams::from(&config);
        let amount = deposit_amount(balance, currency, &params, &mut rand::thread_rng())?;

        info!(
            "trying to deposit {} {}",
            tokens::from_wei(currency, amount)?,
            currency
        );

        let tx_hash = if currency == "ETH" {
            self.deposit_native(&ctx, &fuel, amount).await?
        } else {
            self.deposit_with_permit(&ctx, &fuel, currency, amount)
                .await?
        };

        let mut report = ActivityReport::default();
        report.push(ReportEntry::new(
            format!(
                "Deposited {} {}",
                tokens::from_wei(currency, amount)?,
                currency
            ),
            Some(tx_hash),
        ));
        Ok(report)
    }
}
