use serde::{Deserialize, Serialize};

use super::merge_str;

/// CUSIP used for classes of stock that don't have one.
pub const NO_CUSIP: &str = "N/A";

#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub cusip: String,
    pub class_name: String,
    pub issue_name: String,
    pub ticker: String,
    pub trading_platform: String,
    pub security_type: String,
    pub total_authorized_shares: Option<u64>,
    pub status: String,
}

impl Security {
    /// Later values win for every field `other` fills in. Fields `other`
    /// leaves blank keep what we already had.
    pub fn merge_from(&mut self, other: Security) {
        merge_str(&mut self.class_name, other.class_name);
        merge_str(&mut self.issue_name, other.issue_name);
        merge_str(&mut self.ticker, other.ticker);
        merge_str(&mut self.trading_platform, other.trading_platform);
        merge_str(&mut self.security_type, other.security_type);
        merge_str(&mut self.status, other.status);
        if other.total_authorized_shares.is_some() {
            self.total_authorized_shares = other.total_authorized_shares;
        }
    }
}
