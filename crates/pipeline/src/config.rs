//! Explicit configuration handed to the orchestrator.

use crate::threshold::DEFAULT_LOW_STOCK_THRESHOLD;

/// Sender address used when none is configured.
pub const DEFAULT_MAIL_FROM: &str = "alerts@example.com";

/// Store name printed in notification footers when none is configured.
pub const DEFAULT_STORE_NAME: &str = "Salon Store";

/// Pipeline settings. Nothing here is read from process state; callers
/// build it (the CLI from its TOML/env layer, tests directly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Inventory strictly below this value counts as low stock.
    pub low_stock_threshold: i64,
    /// Store name used in the notification footer.
    pub store_name: String,
    /// `From` address of notification mail.
    pub mail_from: String,
    /// Operator-configured recipients added to every notification.
    pub fallback_recipients: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            store_name: DEFAULT_STORE_NAME.to_string(),
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            fallback_recipients: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Replace the fallback list with the entries of a comma-separated string.
    pub fn with_fallback_csv(mut self, csv: &str) -> Self {
        self.fallback_recipients = crate::recipients::parse_recipient_list(csv);
        self
    }
}
