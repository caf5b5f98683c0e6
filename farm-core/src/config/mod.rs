use serde::{Deserialize, Serialize};

/// Gas gate parameters: the personal willingness-to-pay ceiling starts
/// at `start_gwei` and rises by `step_gwei` every `step_interval_minutes`
/// up to `max_gwei`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasGateConfig {
    pub enabled: bool,
    pub start_gwei: f64,
    pub step_gwei: f64,
    pub step_interval_minutes: f64,
    pub max_gwei: f64,
}

/// Shared rotating proxy used for wallets without a dedicated one.
/// `rotate_url` triggers an IP change; the proxy may answer before it
/// is actually ready, hence the settle delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralProxyConfig {
    pub address: Option<String>,
    pub rotate_url: Option<String>,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
}

impl Default for GeneralProxyConfig {
    fn default() -> Self {
        Self {
            address: None,
            rotate_url: None,
            settle_delay_secs: default_settle_delay(),
        }
    }
}

fn default_settle_delay() -> u64 {
    15
}

/// Telegram notification settings. Empty token disables notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}
