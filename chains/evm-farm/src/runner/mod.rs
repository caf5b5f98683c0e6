use crate::activity::{self, ActivityContext, ActivityReport, FarmActivity};
use crate::config::FarmConfig;
use crate::utils::gas::wait_for_gas;
use anyhow::{anyhow, Result};
use ethers::prelude::*;
use farm_core::{ActivityError, Notifier, RotatingProxy, WalletLedger, WalletRecord};
use rand::Rng;
use std::time::Duration;
use tracing::{error, info, warn};

/// Drives the whole run: draws wallets from the ledger one at a time,
/// prepares their network identity, executes the configured activity
/// and files the wallet under success or fail. The loop only ends when
/// the pending file is empty.
pub struct FarmRunner {
    config: FarmConfig,
    ledger: WalletLedger,
    notifier: Option<Notifier>,
    rotating_proxy: Option<RotatingProxy>,
    activity: Box<FarmActivity>,
}

impl FarmRunner {
    pub fn new(config: FarmConfig) -> Result<Self> {
        let activity = activity::select(&config.activity)?;
        let ledger = WalletLedger::new(&config.wallets_file, &config.results_dir);
        let notifier = Notifier::from_config(&config.telegram);
        let rotating_proxy = RotatingProxy::from_config(&config.general_proxy);

        Ok(Self {
            config,
            ledger,
            notifier,
            rotating_proxy,
            activity,
        })
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let record = match self.ledger.draw(self.config.shuffle_wallets)? {
                Some(record) => record,
                None => {
                    info!("No wallets remaining");
                    self.notify(&completed_message(self.activity.name())).await;
                    return Ok(());
                }
            };

            info!(
                "{} - processing ({} wallets pending)",
                record.name,
                self.ledger.remaining()?
            );

            match self.process_wallet(&record).await {
                Ok((address, report)) => {
                    for entry in &report.entries {
                        match &entry.tx_hash {
                            Some(hash) => info!("{} - {}, hash: {}", record.name, entry.info, hash),
                            None => info!("{} - {}", record.name, entry.info),
                        }
                    }
                    self.ledger.commit_success(&record)?;
                    info!(target: "outcome", "{} - Success", record.name);
                    self.notify(&success_message(
                        &record.name,
                        self.activity.name(),
                        &self.config.explorer_url,
                        address,
                        &report,
                    ))
                    .await;
                }
                Err(ActivityError::AlreadyDone(message)) => {
                    info!("{} - {}", record.name, message);
                    self.ledger.commit_success(&record)?;
                    info!(target: "outcome", "{} - Finished", record.name);
                    self.notify(&finished_message(&record.name, self.activity.name(), &message))
                        .await;
                }
                Err(e) => {
                    let message = e.user_message();
                    error!("{} - failed, reason: {}", record.name, message);
                    self.ledger.commit_failure(&record)?;
                    info!(target: "outcome", "{} - Failed", record.name);
                    self.notify(&fail_message(&record.name, self.activity.name(), &message))
                        .await;
                }
            }

            self.pause_between_accounts().await;
        }
    }

    async fn process_wallet(
        &self,
        record: &WalletRecord,
    ) -> Result<(Address, ActivityReport), ActivityError> {
        let proxy = self.resolve_proxy(record).await?;
        let http = self.build_http(proxy.as_deref())?;

        let url = reqwest::Url::parse(&self.config.rpc_url)
            .map_err(|e| anyhow!("bad rpc url: {}", e))?;
        let provider = Provider::new(Http::new_with_client(url, http.clone()));

        let wallet: LocalWallet = record
            .secret
            .expose()
            .parse()
            .map_err(|e| anyhow!("{} - invalid private key: {}", record.name, e))?;
        let wallet = wallet.with_chain_id(self.config.chain_id);
        let address = wallet.address();

        wait_for_gas(&provider, &self.config.gas_gate).await;

        let ctx = ActivityContext {
            provider,
            wallet,
            config: self.config.clone(),
            proxy,
            http,
        };

        let report = self.activity.run(ctx).await?;
        Ok((address, report))
    }

    /// Per-wallet proxies win; wallets without one share the rotating
    /// proxy and get a fresh exit IP before doing anything.
    async fn resolve_proxy(&self, record: &WalletRecord) -> Result<Option<String>> {
        if let Some(proxy) = &record.proxy {
            return Ok(Some(proxy.clone()));
        }

        if let Some(rotating) = &self.rotating_proxy {
            info!("{} - using general proxy", record.name);
            info!("{} - changing proxy ip", record.name);
            // rotation request goes out directly, the old exit IP may be dead
            rotating.rotate_ip(&reqwest::Client::new()).await?;
            return Ok(Some(rotating.address.clone()));
        }

        warn!("{} - running without proxy", record.name);
        Ok(None)
    }

    fn build_http(&self, proxy: Option<&str>) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.provider_timeout_secs));
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }

    async fn notify(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.send(text).await;
        }
    }

    async fn pause_between_accounts(&self) {
        let (min, max) = self.config.account_delay_secs;
        if max == 0 {
            return;
        }

        let delay = rand::thread_rng().gen_range(min..=max);
        info!(
            "Sleeping {:.2} minutes before the next wallet",
            delay as f64 / 60.0
        );
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}

fn success_message(
    name: &str,
    module: &str,
    explorer_url: &str,
    address: Address,
    report: &ActivityReport,
) -> String {
    let mut message = format!(
        "✅ #success\n\n<b>Wallet: </b>{}\n<b>Module: </b>{}",
        name, module
    );

    for entry in &report.entries {
        message.push_str(&format!("\n<b>Info: </b>{}", entry.info));
        if let Some(hash) = &entry.tx_hash {
            message.push_str(&format!(
                "\n<b>Links: </b><a href=\"{0}/address/{1:?}\">Wallet</a> | <a href=\"{0}/tx/{2}\">Tx</a> | <a href=\"https://debank.com/profile/{1:?}/history\">DeBank</a>",
                explorer_url, address, hash
            ));
        }
    }

    message
}

fn finished_message(name: &str, module: &str, info: &str) -> String {
    format!(
        "🎯 #finished\n\n<b>Wallet: </b>{}\n<b>Module: </b>{}\n<b>Info: </b>{}",
        name, module, info
    )
}

fn fail_message(name: &str, module: &str, info: &str) -> String {
    format!(
        "⛔️ #fail\n\n<b>Wallet: </b>{}\n<b>Module: </b>{}\n<b>Info: </b>{}",
        name, module, info
    )
}

fn completed_message(module: &str) -> String {
    format!("🚀 #completed\n\nNo wallets remaining in module {}", module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ReportEntry;
    use crate::config::FarmConfig;
    use async_trait::async_trait;
    use farm_core::GasGateConfig;
    use std::fs;
    use tempfile::TempDir;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn address() -> Address {
        "0x000000000000000000000000000000000000dEaD"
            .parse()
            .unwrap()
    }

    struct StubActivity {
        result: fn() -> Result<ActivityReport, ActivityError>,
    }

    #[async_trait]
    impl crate::activity::Activity<ActivityContext> for StubActivity {
        fn name(&self) -> &str {
            "stub"
        }

        async fn run(&self, _ctx: ActivityContext) -> Result<ActivityReport, ActivityError> {
            (self.result)()
        }
    }

    fn test_runner(
        dir: &TempDir,
        result: fn() -> Result<ActivityReport, ActivityError>,
    ) -> FarmRunner {
        let wallets = dir.path().join("wallets.txt");
        fs::write(&wallets, format!("w1|{}", TEST_KEY)).unwrap();
        let results_dir = dir.path().join("results");

        let config = FarmConfig {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 1,
            explorer_url: "https://etherscan.io".to_string(),
            shuffle_wallets: false,
            wallets_file: wallets.to_string_lossy().into_owned(),
            results_dir: results_dir.to_string_lossy().into_owned(),
            provider_timeout_secs: 5,
            account_delay_secs: (0, 0),
            activity_delay_secs: (0, 0),
            gas_price_multiplier: (1.0, 1.0),
            gas_limit_multiplier: (1.0, 1.0),
            gas_gate: GasGateConfig {
                enabled: false,
                start_gwei: 1.0,
                step_gwei: 0.0,
                step_interval_minutes: 1.0,
                max_gwei: 1.0,
            },
            general_proxy: Default::default(),
            telegram: Default::default(),
            activity: "stub".to_string(),
            deposit: None,
            canvas: None,
        };

        FarmRunner {
            ledger: WalletLedger::new(&config.wallets_file, &config.results_dir),
            notifier: None,
            rotating_proxy: None,
            activity: Box::new(StubActivity { result }),
            config,
        }
    }

    #[tokio::test]
    async fn already_done_wallet_is_filed_under_success() {
        let dir = TempDir::new().unwrap();
        let runner = test_runner(&dir, || {
            Err(ActivityError::AlreadyDone("already deposited".to_string()))
        });

        runner.run().await.unwrap();

        let success = fs::read_to_string(dir.path().join("results/success.txt")).unwrap();
        assert!(success.contains("w1|"));
        assert!(fs::read_to_string(dir.path().join("wallets.txt"))
            .unwrap()
            .trim()
            .is_empty());
        assert!(!dir.path().join("results/fail.txt").exists());
    }

    #[tokio::test]
    async fn successful_wallet_is_filed_under_success() {
        let dir = TempDir::new().unwrap();
        let runner = test_runner(&dir, || {
            let mut report = ActivityReport::default();
            report.push(ReportEntry::new("done", Some("0xhash".to_string())));
            Ok(report)
        });

        runner.run().await.unwrap();

        let success = fs::read_to_string(dir.path().join("results/success.txt")).unwrap();
        assert!(success.contains("w1|"));
    }

    #[tokio::test]
    async fn failed_wallet_is_filed_under_fail() {
        let dir = TempDir::new().unwrap();
        let runner = test_runner(&dir, || {
            Err(ActivityError::Network("rpc unreachable".to_string()))
        });

        runner.run().await.unwrap();

        let fail = fs::read_to_string(dir.path().join("results/fail.txt")).unwrap();
        assert!(fail.contains("w1|"));
        assert!(!dir.path().join("results/success.txt").exists());
    }

    #[test]
    fn success_message_links_every_transaction() {
        let mut report = ActivityReport::default();
        report.push(ReportEntry::new(
            "Deposited 0.5 ETH",
            Some("0xabc123".to_string()),
        ));
        report.push(ReportEntry::new("Minted badge Origins", None));

        let message = success_message(
            "wallet-1",
            "deposit",
            "https://etherscan.io",
            address(),
            &report,
        );

        assert!(message.starts_with("✅ #success"));
        assert!(message.contains("Deposited 0.5 ETH"));
        assert!(message.contains("https://etherscan.io/tx/0xabc123"));
        assert!(message.contains("debank.com/profile/0x000000000000000000000000000000000000dead"));
        // entries without a hash carry no link block
        assert_eq!(message.matches("<b>Links: </b>").count(), 1);
    }

    #[test]
    fn finished_and_fail_messages_carry_the_reason() {
        let finished = finished_message("wallet-1", "deposit", "already deposited 0.5 ETH");
        assert!(finished.starts_with("🎯 #finished"));
        assert!(finished.contains("already deposited 0.5 ETH"));

        let fail = fail_message("wallet-1", "deposit", "insufficient funds");
        assert!(fail.starts_with("⛔️ #fail"));
        assert!(fail.contains("insufficient funds"));
    }

    #[test]
    fn completed_message_names_the_module() {
        assert!(completed_message("canvas").contains("module canvas"));
    }
}
