use crate::error::ActivityError;
use async_trait::async_trait;

/// One line of an activity report: a human note plus the transaction
/// hash when the step submitted one.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub info: String,
    pub tx_hash: Option<String>,
}

impl ReportEntry {
    pub fn new(info: impl Into<String>, tx_hash: Option<String>) -> Self {
        Self {
            info: info.into(),
            tx_hash,
        }
    }
}

/// Ordered outcome of one activity execution. An empty report means
/// "nothing to notify" (read-only activities).
#[derive(Debug, Clone, Default)]
pub struct ActivityReport {
    pub entries: Vec<ReportEntry>,
}

impl ActivityReport {
    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A pluggable unit of on-chain work, selected by configuration and run
/// once per drawn wallet.
#[async_trait]
pub trait Activity<Ctx>: Send + Sync {
    /// Returns the name of the activity
    fn name(&self) -> &str;

    /// Executes the activity against a prepared chain connection
    async fn run(&self, ctx: Ctx) -> Result<ActivityReport, ActivityError>;
}
