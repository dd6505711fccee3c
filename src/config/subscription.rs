use serde::{Deserialize, Serialize};

use super::hydrate::Hydrate;
use crate::share::fingerprint::Fingerprint;

/// Subscription source (`subscription_list.json` element)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRow {
    pub name: String,
    pub note: String,
    pub hash: String,
    pub url: String,
    #[serde(rename = "autoUpdate")]
    pub auto_update: bool,
    /// Fetch through the proxy
    #[serde(rename = "isProxy")]
    pub is_proxy: bool,
    /// The URL serves an HTML page with share links embedded in it
    #[serde(rename = "isHtml")]
    pub is_html: bool,
}

impl Hydrate for SubscriptionRow {
    const KIND: &'static str = "subscription";
}

impl Fingerprint for SubscriptionRow {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }
}
