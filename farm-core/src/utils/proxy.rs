use crate::config::GeneralProxyConfig;
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Shared rotating proxy: one address for every wallet without its own
/// proxy, with an on-demand IP-change endpoint.
pub struct RotatingProxy {
    pub address: String,
    rotate_url: String,
    settle_delay: Duration,
}

impl RotatingProxy {
    const ROTATE_ATTEMPTS: u32 = 10;
    const RETRY_DELAY_SECS: u64 = 6;

    /// Returns `None` unless both the proxy address and the rotate URL
    /// are configured - a bare address without a rotate link is useless
    /// as a shared proxy, every wallet would exit from the same IP.
    pub fn from_config(config: &GeneralProxyConfig) -> Option<Self> {
        let address = config.address.clone().filter(|a| !a.is_empty())?;
        let rotate_url = config.rotate_url.clone().filter(|u| !u.is_empty())?;
        Some(Self {
            address,
            rotate_url,
            settle_delay: Duration::from_secs(config.settle_delay_secs),
        })
    }

    /// Requests an IP change and waits for the proxy to settle. The
    /// rotate endpoint may answer 200 before the new exit IP is live,
    /// hence the settle delay after a successful response.
    pub async fn rotate_ip(&self, http: &reqwest::Client) -> Result<()> {
        for _ in 0..Self::ROTATE_ATTEMPTS {
            match self.request_rotation(http).await {
                Ok(body) => {
                    debug!("IP change response: {}", body);
                    debug!(
                        "Changed ip, sleeping {} seconds",
                        self.settle_delay.as_secs()
                    );
                    tokio::time::sleep(self.settle_delay).await;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to change proxy ip, retrying: {}", e);
                    tokio::time::sleep(Duration::from_secs(Self::RETRY_DELAY_SECS)).await;
                }
            }
        }

        Err(anyhow!(
            "failed to change proxy IP after {} attempts",
            Self::ROTATE_ATTEMPTS
        ))
    }

    async fn request_rotation(&self, http: &reqwest::Client) -> Result<String> {
        let response = http
            .get(&self.rotate_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("rotate endpoint returned {}", response.status()));
        }

        Ok(response.text().await.unwrap_or_default())
    }
}
