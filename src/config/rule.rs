use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hydrate::{merge_over, take_list, Hydrate};
use crate::error::HydrateError;
use crate::share::fingerprint::{hash_json, Fingerprint};

/// Global routing policy (`rule_config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Proxy everything except private networks
    #[serde(rename = "globalProxy")]
    pub global_proxy: bool,
    /// Outbound for traffic that matches no rule: proxy / direct, empty for none
    #[serde(rename = "unmatchedStrategy")]
    pub unmatched_strategy: String,
    /// Index into the rule mode list
    pub mode: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            global_proxy: false,
            unmatched_strategy: "proxy".to_string(),
            mode: 0,
        }
    }
}

impl Hydrate for RuleConfig {
    const KIND: &'static str = "rule config";
}

/// Newline-separated domain lists applied ahead of any rule mode (`rule_domain.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDomain {
    pub proxy: String,
    pub direct: String,
    pub reject: String,
}

impl Hydrate for RuleDomain {
    const KIND: &'static str = "rule domain";
}

/// Named, reusable rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleModeRow {
    pub name: String,
    pub note: String,
    /// AsIs / IPIfNonMatch / IPOnDemand
    #[serde(rename = "domainStrategy")]
    pub domain_strategy: String,
    /// Fingerprint of `rules`
    pub hash: String,
    pub rules: Vec<RuleRow>,
}

impl Default for RuleModeRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            note: String::new(),
            domain_strategy: "AsIs".to_string(),
            hash: String::new(),
            rules: Vec::new(),
        }
    }
}

impl Hydrate for RuleModeRow {
    const KIND: &'static str = "rule mode";

    fn hydrate(mut stored: Value) -> Result<Self, HydrateError> {
        // rules are merged one level deeper so old rows pick up new rule fields
        let rules = take_list::<RuleRow>(&mut stored, "rules")?;
        let mut row = merge_over(Self::default(), stored, Self::KIND)?;
        if let Some(rules) = rules {
            row.rules = rules;
        }
        Ok(row)
    }
}

impl Fingerprint for RuleModeRow {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }

    fn content_hash(&self) -> String {
        hash_json(&self.rules)
    }
}

impl RuleModeRow {
    /// Replace the rules and refresh the hash
    pub fn set_rules(&mut self, rules: Vec<RuleRow>) {
        self.rules = rules;
        self.refresh_hash();
    }
}

/// Which condition fields of a [`RuleRow`] are meaningful
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    #[default]
    Domain,
    Ip,
    Multi,
}

/// One routing rule inside a rule mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRow {
    pub name: String,
    pub note: String,
    /// proxy / direct / reject
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
    #[serde(rename = "ruleType")]
    pub rule_type: RuleType,
    pub domain: String,
    pub ip: String,
    pub port: String,
    #[serde(rename = "sourcePort")]
    pub source_port: String,
    /// tcp / udp / tcp,udp
    pub network: String,
    /// Comma-separated sniffed protocols: http, tls, quic, bittorrent
    pub protocol: String,
}

impl Default for RuleRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            note: String::new(),
            outbound_tag: "proxy".to_string(),
            rule_type: RuleType::Domain,
            domain: String::new(),
            ip: String::new(),
            port: String::new(),
            source_port: String::new(),
            network: String::new(),
            protocol: String::new(),
        }
    }
}

impl Hydrate for RuleRow {
    const KIND: &'static str = "rule";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_config_defaults() {
        let config = RuleConfig::hydrate(json!({})).unwrap();
        assert!(!config.global_proxy);
        assert_eq!(config.unmatched_strategy, "proxy");
        assert_eq!(config.mode, 0);
    }

    #[test]
    fn test_rule_mode_hydrates_nested_rules() {
        let row = RuleModeRow::hydrate(json!({
            "name": "cn",
            "rules": [{"name": "ads", "outboundTag": "reject", "domain": "geosite:category-ads-all"}]
        }))
        .unwrap();
        assert_eq!(row.domain_strategy, "AsIs");
        assert_eq!(row.rules.len(), 1);
        assert_eq!(row.rules[0].rule_type, RuleType::Domain);
        assert_eq!(row.rules[0].port, "");
    }

    #[test]
    fn test_rule_mode_hash_covers_rules_only() {
        let mut a = RuleModeRow {
            name: "a".to_string(),
            ..Default::default()
        };
        a.set_rules(vec![RuleRow::default()]);

        let mut b = a.clone();
        b.name = "renamed".to_string();
        b.refresh_hash();
        assert_eq!(a.hash, b.hash);

        b.set_rules(vec![]);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_unknown_rule_type_fails() {
        assert!(RuleRow::hydrate(json!({"ruleType": "geo"})).is_err());
    }
}
