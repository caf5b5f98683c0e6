use crate::activity::{Activity, ActivityContext, ActivityReport, ReportEntry};
use crate::config::CanvasConfig;
use crate::utils::gas::{apply_multiplier, draw_multiplier};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use farm_core::{with_retry, ActivityError, LinePool, RetryConfig};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

// https://scroll.io/canvas/mint
pub const CANVAS_ADDRESS: &str = "0xB23AF8707c442f59BDfC368612Bd8DbCca8a7a5a";

const CANVAS_API: &str = "https://canvas.scroll.cat";
const BADGE_REGISTRY_API: &str = "https://badge-registry.canvas.scroll.cat";
const DEFAULT_CLAIM_API: &str = "https://canvas.scroll.cat/badge";

// badge status/eligibility/payload checks run concurrently, capped so a
// large catalog cannot flood the RPC or the registry
const FANOUT_CONCURRENCY: usize = 8;

const CANVAS_ABI: &str = r#"[
    {"inputs":[{"name":"username","type":"string"},{"name":"referral","type":"bytes"}],"name":"mint","outputs":[{"name":"","type":"address"}],"stateMutability":"payable","type":"function"},
    {"inputs":[],"name":"MINT_FEE","outputs":[{"name":"","type":"uint256"}],"stateMutability":"view","type":"function"},
    {"inputs":[{"name":"account","type":"address"}],"name":"getProfile","outputs":[{"name":"","type":"address"}],"stateMutability":"view","type":"function"},
    {"inputs":[{"name":"profile","type":"address"}],"name":"isProfileMinted","outputs":[{"name":"","type":"bool"}],"stateMutability":"view","type":"function"},
    {"inputs":[{"name":"username","type":"string"}],"name":"isUsernameUsed","outputs":[{"name":"","type":"bool"}],"stateMutability":"view","type":"function"}
]"#;

const BADGE_ABI: &str = r#"[
    {"inputs":[{"name":"user","type":"address"}],"name":"hasBadge","outputs":[{"name":"","type":"bool"}],"stateMutability":"view","type":"function"},
    {"inputs":[{"name":"user","type":"address"}],"name":"isEligible","outputs":[{"name":"","type":"bool"}],"stateMutability":"view","type":"function"}
]"#;

type FarmClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// One badge from the public registry. Unknown fields are dropped on
/// purpose, the registry payload carries a lot of frontend-only data.
#[derive(Debug, Clone, Deserialize)]
pub struct Badge {
    pub name: String,
    #[serde(rename = "badgeContract")]
    pub badge_contract: String,
    #[serde(rename = "baseURL")]
    pub base_url: Option<String>,
    #[serde(rename = "eligibilityCheck")]
    pub eligibility_check: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct BadgePage {
    data: Vec<Badge>,
    total: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaimTx {
    to: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaimResponse {
    tx: Option<ClaimTx>,
}

/// An eligible badge together with the claim transaction the issuer
/// service built for this wallet.
#[derive(Debug, Clone)]
struct ReadyBadge {
    badge: Badge,
    tx: ClaimTx,
}

/// A consistent set of browser identification headers, drawn once per
/// process so every request from this run looks like the same client.
#[derive(Debug, Clone)]
struct BrowserProfile {
    user_agent: String,
    sec_ch_ua: String,
    platform: String,
}

impl BrowserProfile {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let major = rng.gen_range(122..=131);
        let (os, platform) = *[
            ("Windows NT 10.0; Win64; x64", "\"Windows\""),
            ("Macintosh; Intel Mac OS X 10_15_7", "\"macOS\""),
            ("X11; Linux x86_64", "\"Linux\""),
        ]
        .choose(&mut rng)
        .unwrap_or(&("Windows NT 10.0; Win64; x64", "\"Windows\""));

        Self {
            user_agent: format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
                os, major
            ),
            sec_ch_ua: format!(
                "\"Not/A)Brand\";v=\"8\", \"Chromium\";v=\"{}\", \"Google Chrome\";v=\"{}\"",
                major, major
            ),
            platform: platform.to_string(),
        }
    }

    fn decorate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("accept", "*/*")
            .header("accept-language", "en-US,en;q=0.9")
            .header("origin", "https://scroll.io")
            .header("referer", "https://scroll.io/")
            .header("sec-ch-ua", &self.sec_ch_ua)
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", &self.platform)
            .header("user-agent", &self.user_agent)
    }
}

/// Mints the canvas profile NFT and a randomized number of badges the
/// wallet is eligible for. Referral codes are drawn from a shared pool
/// for the mint fee discount, and every wallet's own code is harvested
/// back into a second pool.
pub struct CanvasActivity {
    // badge catalog is identical for every wallet, fetch it once
    catalog: Mutex<Option<Vec<Badge>>>,
    browser: BrowserProfile,
}

impl CanvasActivity {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(None),
            browser: BrowserProfile::generate(),
        }
    }

    fn canvas_contract(client: Arc<FarmClient>) -> Result<Contract<FarmClient>> {
        let abi: ethers::abi::Abi = serde_json::from_str(CANVAS_ABI)?;
        Ok(Contract::new(CANVAS_ADDRESS.parse::<Address>()?, abi, client))
    }

    fn badge_contract(
        ctx: &ActivityContext,
        address: &str,
    ) -> Result<Contract<Provider<Http>>> {
        let abi: ethers::abi::Abi = serde_json::from_str(BADGE_ABI)?;
        Ok(Contract::new(
            address.parse::<Address>()?,
            abi,
            Arc::new(ctx.provider.clone()),
        ))
    }

    async fn fetch_json(&self, ctx: &ActivityContext, url: &str) -> Result<serde_json::Value> {
        let response = self
            .browser
            .decorate(ctx.http.get(url))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("server response status {}", status);
        }

        Ok(response.json().await?)
    }

    async fn mint_profile(
        &self,
        ctx: &ActivityContext,
        config: &CanvasConfig,
        canvas: &Contract<FarmClient>,
    ) -> Result<(String, String), ActivityError> {
        let owner = ctx.wallet.address();

        let profile: Address = canvas
            .method("getProfile", owner)
            .map_err(anyhow::Error::from)?
            .call()
            .await
            .map_err(anyhow::Error::from)?;
        let minted: bool = canvas
            .method("isProfileMinted", profile)
            .map_err(anyhow::Error::from)?
            .call()
            .await
            .map_err(anyhow::Error::from)?;
        if minted {
            return Err(ActivityError::AlreadyDone(format!(
                "wallet {:?} has already minted the canvas profile",
                owner
            )));
        }

        let username = self.pick_username(canvas, config.username.clone()).await?;

        let fee: U256 = canvas
            .method("MINT_FEE", ())
            .map_err(anyhow::Error::from)?
            .call()
            .await
            .map_err(anyhow::Error::from)?;

        let ref_code = LinePool::new(&config.ref_codes_file)
            .draw_random()
            .map_err(anyhow::Error::from)?;

        // referral codes halve the mint fee
        let (value, signature) = match &ref_code {
            Some(code) => {
                let signature = self.mint_signature(ctx, code, owner).await?;
                (fee / 2, signature)
            }
            None => {
                info!("minting profile without a referral code, no discount applied");
                (fee, Bytes::default())
            }
        };

        let gas_price = apply_multiplier(
            ctx.provider.get_gas_price().await.map_err(anyhow::Error::from)?,
            draw_multiplier(ctx.config.gas_price_multiplier),
        );

        let call = canvas
            .method::<_, Address>("mint", (username.clone(), signature))
            .map_err(anyhow::Error::from)?
            .value(value)
            .gas_price(gas_price);

        let estimated = call.estimate_gas().await.map_err(anyhow::Error::from)?;
        let gas_limit =
            apply_multiplier(estimated, draw_multiplier(ctx.config.gas_limit_multiplier));
        debug!("gas limit: estimated {}, submitting {}", estimated, gas_limit);

        let call = call.gas(gas_limit);
        let pending = call.send().await.map_err(anyhow::Error::from)?;
        let receipt = pending
            .await
            .map_err(anyhow::Error::from)?
            .context("profile mint receipt missing")?;

        Ok((format!("{:?}", receipt.transaction_hash), username))
    }

    /// Settles on a username that is not taken yet, falling back to
    /// generated ones when the configured name is absent or used.
    async fn pick_username(
        &self,
        canvas: &Contract<FarmClient>,
        preferred: Option<String>,
    ) -> Result<String> {
        let mut candidate = preferred;

        for _ in 0..10 {
            if let Some(name) = candidate.take() {
                let used: bool = canvas.method("isUsernameUsed", name.clone())?.call().await?;
                if !used {
                    return Ok(name);
                }
                debug!("username {} is already taken, generating a new one", name);
            }
            candidate = Some(random_username(&mut rand::thread_rng()));
        }

        bail!("could not find a free username")
    }

    async fn mint_signature(
        &self,
        ctx: &ActivityContext,
        ref_code: &str,
        owner: Address,
    ) -> Result<Bytes> {
        let url = format!("{}/code/{}/sig/{:?}", CANVAS_API, ref_code, owner);
        let value = with_retry(RetryConfig::new(2, 1000), "profile mint signature", || {
            self.fetch_json(ctx, &url)
        })
        .await?;

        let signature = value
            .get("signature")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("server response: {}", value))?;

        Ok(Bytes::from(hex::decode(
            signature.trim_start_matches("0x"),
        )?))
    }

    /// Fetches this wallet's own referral code and stores it in the
    /// shared pool for later wallets to draw.
    async fn harvest_ref_code(&self, ctx: &ActivityContext, config: &CanvasConfig) -> Result<()> {
        let url = format!("{}/acc/{:?}/code", CANVAS_API, ctx.wallet.address());
        let value = with_retry(RetryConfig::new(2, 3000), "personal referral code", || {
            self.fetch_json(ctx, &url)
        })
        .await?;

        let code = value
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("server response: {}", value))?;

        if LinePool::new(&config.own_codes_file).append_dedup(code)? {
            info!("stored personal referral code {}", code);
        }

        Ok(())
    }

    async fn catalog(&self, ctx: &ActivityContext) -> Result<Vec<Badge>> {
        let mut cache = self.catalog.lock().await;
        if let Some(badges) = cache.as_ref() {
            return Ok(badges.clone());
        }

        debug!("badge catalog not cached yet, fetching");
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            let batch = self.badge_page(ctx, page).await?;
            if batch.data.is_empty() {
                break;
            }
            all.extend(batch.data);
            if all.len() as u64 >= batch.total {
                break;
            }

            page += 1;
            let delay = rand::thread_rng().gen_range(1..=3);
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        info!("badge catalog holds {} badges", all.len());
        *cache = Some(all.clone());
        Ok(all)
    }

    async fn badge_page(&self, ctx: &ActivityContext, page: u32) -> Result<BadgePage> {
        let url = format!(
            "{}/badges?page_number={}&sort=minted&category=all&page_size=20",
            BADGE_REGISTRY_API, page
        );

        with_retry(RetryConfig::new(2, 1000), "badge catalog page", || async {
            let value = self.fetch_json(ctx, &url).await?;
            Ok(serde_json::from_value::<BadgePage>(value)?)
        })
        .await
    }

    async fn has_badge(&self, ctx: &ActivityContext, badge_address: &str) -> Result<bool> {
        let contract = Self::badge_contract(ctx, badge_address)?;
        Ok(contract
            .method("hasBadge", ctx.wallet.address())?
            .call()
            .await?)
    }

    async fn is_eligible(&self, ctx: &ActivityContext, badge: &Badge) -> Result<bool> {
        if badge.eligibility_check == Some(true) {
            let contract = Self::badge_contract(ctx, &badge.badge_contract)?;
            return Ok(contract
                .method("isEligible", ctx.wallet.address())?
                .call()
                .await?);
        }

        if let Some(base) = &badge.base_url {
            let url = format!(
                "{}/check?badge={}&recipient={:?}",
                base,
                badge.badge_contract,
                ctx.wallet.address()
            );
            let value = self.fetch_json(ctx, &url).await?;
            let code = value
                .get("code")
                .ok_or_else(|| anyhow!("server response: {}", value))?;
            return Ok(code_is_truthy(code));
        }

        if badge.eligibility_check == Some(false) {
            // open mints carry no eligibility source at all
            return Ok(true);
        }

        bail!("no eligibility source for badge {}", badge.name)
    }

    async fn claim_payload(&self, ctx: &ActivityContext, badge: &Badge) -> Result<ClaimTx> {
        let base = badge.base_url.as_deref().unwrap_or(DEFAULT_CLAIM_API);
        let url = format!(
            "{}/claim?badge={}&recipient={:?}",
            base,
            badge.badge_contract,
            ctx.wallet.address()
        );

        let value = self.fetch_json(ctx, &url).await?;
        let claim: ClaimResponse = serde_json::from_value(value.clone())?;
        match claim.tx {
            Some(tx) if !tx.to.is_empty() && !tx.data.is_empty() => Ok(tx),
            _ => bail!("server response: {}", value),
        }
    }

    /// Narrows the full catalog down to the badges this wallet should
    /// mint right now: not skipped, not yet held, eligible, with a
    /// claim payload, sampled down to the per-wallet cap.
    async fn ready_badges(
        &self,
        ctx: &ActivityContext,
        config: &CanvasConfig,
        user_max: usize,
    ) -> Result<Vec<ReadyBadge>, ActivityError> {
        let catalog = self.catalog(ctx).await?;
        let candidates: Vec<Badge> = catalog
            .into_iter()
            .filter(|badge| !config.badges_to_skip.contains(&badge.badge_contract))
            .collect();

        let status_checks: Vec<_> = candidates
            .iter()
            .map(|badge| async move {
                match self.has_badge(ctx, &badge.badge_contract).await {
                    Ok(minted) => Some(minted),
                    Err(e) => {
                        warn!("mint status check failed for badge {}: {}", badge.name, e);
                        None
                    }
                }
            })
            .collect();
        let statuses: Vec<Option<bool>> = fan_out(status_checks).await;

        let minted = statuses.iter().filter(|s| **s == Some(true)).count();
        let unknown = statuses.iter().filter(|s| s.is_none()).count();
        info!(
            "already minted: {}, not minted: {}, failed to check: {}",
            minted,
            candidates.len() - minted - unknown,
            unknown
        );

        if minted >= user_max {
            return Err(ActivityError::AlreadyDone(format!(
                "already minted {} badges, wallet limit set to {}",
                minted, user_max
            )));
        }
        if !candidates.is_empty() && unknown == candidates.len() {
            return Err(
                anyhow!("failed to check the minted status of every badge, check the RPC").into(),
            );
        }

        let not_minted: Vec<Badge> = candidates
            .into_iter()
            .zip(statuses)
            .filter(|(_, status)| *status == Some(false))
            .map(|(badge, _)| badge)
            .collect();

        let eligibility_checks: Vec<_> = not_minted
            .iter()
            .map(|badge| async move {
                match self.is_eligible(ctx, badge).await {
                    Ok(eligible) => Some(eligible),
                    Err(e) => {
                        warn!("eligibility check failed for badge {}: {}", badge.name, e);
                        None
                    }
                }
            })
            .collect();
        let eligibility: Vec<Option<bool>> = fan_out(eligibility_checks).await;

        let eligible: Vec<Badge> = not_minted
            .into_iter()
            .zip(eligibility)
            .filter(|(_, status)| *status == Some(true))
            .map(|(badge, _)| badge)
            .collect();

        let names: Vec<&str> = eligible.iter().map(|b| b.name.as_str()).collect();
        info!(
            "wallet is eligible for {} badges{}",
            eligible.len(),
            if names.is_empty() {
                String::new()
            } else {
                format!(": {}", names.join(", "))
            }
        );

        let payload_fetches: Vec<_> = eligible
            .iter()
            .map(|badge| async move {
                match self.claim_payload(ctx, badge).await {
                    Ok(tx) => Some(tx),
                    Err(e) => {
                        warn!("claim payload fetch failed for badge {}: {}", badge.name, e);
                        None
                    }
                }
            })
            .collect();
        let payloads: Vec<Option<ClaimTx>> = fan_out(payload_fetches).await;

        let ready: Vec<ReadyBadge> = eligible
            .into_iter()
            .zip(payloads)
            .filter_map(|(badge, tx)| tx.map(|tx| ReadyBadge { badge, tx }))
            .collect();

        let budget = mint_budget(user_max, minted);
        Ok(select_for_mint(ready, budget, &mut rand::thread_rng()))
    }

    async fn mint_badge(
        &self,
        ctx: &ActivityContext,
        client: &Arc<FarmClient>,
        ready: &ReadyBadge,
    ) -> Result<String, ActivityError> {
        if self.has_badge(ctx, &ready.badge.badge_contract).await? {
            return Err(ActivityError::AlreadyDone(format!(
                "badge {} is already minted",
                ready.badge.name
            )));
        }

        let to: Address = ready
            .tx
            .to
            .parse()
            .map_err(|e| anyhow!("bad claim address {}: {}", ready.tx.to, e))?;
        let data = Bytes::from(
            hex::decode(ready.tx.data.trim_start_matches("0x")).map_err(anyhow::Error::from)?,
        );

        let gas_price = apply_multiplier(
            client.get_gas_price().await.map_err(anyhow::Error::from)?,
            draw_multiplier(ctx.config.gas_price_multiplier),
        );

        let tx = TransactionRequest::new()
            .from(ctx.wallet.address())
            .to(to)
            .data(data)
            .gas_price(gas_price);

        let typed: TypedTransaction = tx.clone().into();
        let estimated = client
            .estimate_gas(&typed, None)
            .await
            .map_err(anyhow::Error::from)?;
        let gas_limit =
            apply_multiplier(estimated, draw_multiplier(ctx.config.gas_limit_multiplier));
        debug!("gas limit: estimated {}, submitting {}", estimated, gas_limit);

        let tx = tx.gas(gas_limit);
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(anyhow::Error::from)?;
        let receipt = pending
            .await
            .map_err(anyhow::Error::from)?
            .context("badge mint receipt missing")?;

        Ok(format!("{:?}", receipt.transaction_hash))
    }
}

impl Default for CanvasActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Activity<ActivityContext> for CanvasActivity {
    fn name(&self) -> &str {
        "canvas"
    }

    async fn run(&self, ctx: ActivityContext) -> Result<ActivityReport, ActivityError> {
        let config = ctx
            .config
            .canvas
            .clone()
            .ok_or_else(|| anyhow!("missing [canvas] configuration"))?;

        let client = Arc::new(SignerMiddleware::new(
            ctx.provider.clone(),
            ctx.wallet.clone(),
        ));
        let canvas = Self::canvas_contract(client.clone())?;
        let mut report = ActivityReport::default();

        match self.mint_profile(&ctx, &config, &canvas).await {
            Ok((tx_hash, username)) => {
                info!("minted profile with username {}", username);
                report.push(ReportEntry::new(
                    format!("Minted profile '{}'", username),
                    Some(tx_hash),
                ));
            }
            Err(ActivityError::AlreadyDone(msg)) => info!("{}", msg),
            Err(e) => return Err(e),
        }

        if let Err(e) = self.harvest_ref_code(&ctx, &config).await {
            warn!("failed to harvest personal referral code: {}", e);
        }

        let user_max =
            rand::thread_rng().gen_range(config.badge_limit.0..=config.badge_limit.1) as usize;
        debug!("badge limit for this wallet: {}", user_max);

        let ready = match self.ready_badges(&ctx, &config, user_max).await {
            Ok(ready) => ready,
            // the badge cap is only a terminal state when nothing else
            // was minted this run
            Err(ActivityError::AlreadyDone(msg)) if !report.is_empty() => {
                info!("{}", msg);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        for (i, ready_badge) in ready.iter().enumerate() {
            if i > 0 {
                let (min, max) = ctx.config.activity_delay_secs;
                let delay = rand::thread_rng().gen_range(min..=max);
                debug!("sleeping {} seconds before the next badge", delay);
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            match self.mint_badge(&ctx, &client, ready_badge).await {
                Ok(tx_hash) => {
                    info!("minted badge {}", ready_badge.badge.name);
                    report.push(ReportEntry::new(
                        format!("Minted badge {}", ready_badge.badge.name),
                        Some(tx_hash),
                    ));
                }
                Err(ActivityError::AlreadyDone(msg)) => info!("{}", msg),
                Err(e) => {
                    warn!("badge {} mint failed: {}", ready_badge.badge.name, e);
                    report.push(ReportEntry::new(
                        format!("Badge {} failed: {}", ready_badge.badge.name, e.user_message()),
                        None,
                    ));
                }
            }
        }

        Ok(report)
    }
}

/// Drives a batch of pre-built per-badge futures with bounded
/// concurrency. Results come back in input order.
async fn fan_out<F: std::future::Future>(futures: Vec<F>) -> Vec<F::Output> {
    stream::iter(futures)
        .buffered(FANOUT_CONCURRENCY)
        .collect()
        .await
}

/// How many more badges this wallet may mint before hitting its cap.
fn mint_budget(user_max: usize, minted: usize) -> usize {
    user_max.saturating_sub(minted)
}

fn select_for_mint(mut ready: Vec<ReadyBadge>, budget: usize, rng: &mut impl Rng) -> Vec<ReadyBadge> {
    if budget >= ready.len() {
        return ready;
    }
    ready.shuffle(rng);
    ready.truncate(budget);
    ready
}

fn code_is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Null => false,
        _ => true,
    }
}

fn random_username(rng: &mut impl Rng) -> String {
    const ADJECTIVES: &[&str] = &[
        "swift", "quiet", "lunar", "crimson", "frosty", "golden", "hidden", "misty", "bold",
        "clever", "amber", "dusty", "vivid", "pale", "stark",
    ];
    const NOUNS: &[&str] = &[
        "falcon", "otter", "comet", "harbor", "willow", "ember", "ridge", "drift", "pixel",
        "canyon", "sparrow", "maple", "anchor", "summit", "brook",
    ];

    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    format!("{}{}{}", adjective, noun, rng.gen_range(10..10_000))
}
