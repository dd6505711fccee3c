use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::defaults::{default_dns_mode_list, default_dns_table_list, default_rule_mode_list};
use super::dns::{DnsConfig, DnsModeRow, DnsTableRow};
use super::hydrate::Hydrate;
use super::ray_common::RayCommonConfig;
use super::rule::{RuleConfig, RuleDomain, RuleModeRow};
use super::server::ServerRow;
use super::subscription::SubscriptionRow;
use crate::ray::CompileInputs;

/// Named JSON documents kept in the data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Server,
    RuleConfig,
    RuleDomain,
    RuleModeList,
    DnsConfig,
    DnsModeList,
    DnsTableList,
    RayCommonConfig,
    SubscriptionList,
    RayConfig,
}

impl Doc {
    /// Every document the compiler reads
    pub const INPUTS: [Doc; 7] = [
        Doc::Server,
        Doc::RuleConfig,
        Doc::RuleDomain,
        Doc::RuleModeList,
        Doc::DnsConfig,
        Doc::DnsModeList,
        Doc::RayCommonConfig,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Doc::Server => "server.json",
            Doc::RuleConfig => "rule_config.json",
            Doc::RuleDomain => "rule_domain.json",
            Doc::RuleModeList => "rule_mode_list.json",
            Doc::DnsConfig => "dns_config.json",
            Doc::DnsModeList => "dns_mode_list.json",
            Doc::DnsTableList => "dns_table_list.json",
            Doc::RayCommonConfig => "ray_common_config.json",
            Doc::SubscriptionList => "subscription_list.json",
            Doc::RayConfig => "ray_config.json",
        }
    }
}

/// File-backed persistence rooted at the data directory
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, doc: Doc) -> PathBuf {
        self.dir.join(doc.file_name())
    }

    fn read_value(&self, doc: Doc) -> Result<Option<Value>> {
        let path = self.path(doc);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        Ok(Some(value))
    }

    /// Hydrated record, `None` when the file does not exist
    pub fn read<T: Hydrate>(&self, doc: Doc) -> Result<Option<T>> {
        match self.read_value(doc)? {
            Some(value) => {
                let record = T::hydrate(value)
                    .with_context(|| format!("Failed to load {}", doc.file_name()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Hydrated list, `None` when the file does not exist
    pub fn read_list<T: Hydrate>(&self, doc: Doc) -> Result<Option<Vec<T>>> {
        match self.read_value(doc)? {
            Some(value) => {
                let list = T::hydrate_list(value)
                    .with_context(|| format!("Failed to load {}", doc.file_name()))?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    /// Write `value` as pretty JSON, creating the data directory if needed
    pub fn write<T: Serialize + ?Sized>(&self, doc: Doc, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_file(doc.file_name(), &contents)?;
        Ok(())
    }

    /// Write a file relative to the data directory
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Last modification time, `None` if the file is missing
    pub fn modified(&self, doc: Doc) -> Option<SystemTime> {
        fs::metadata(self.path(doc)).and_then(|m| m.modified()).ok()
    }

    pub fn servers(&self) -> Result<Vec<ServerRow>> {
        Ok(self.read_list(Doc::Server)?.unwrap_or_default())
    }

    pub fn rule_modes(&self) -> Result<Vec<RuleModeRow>> {
        Ok(self
            .read_list(Doc::RuleModeList)?
            .unwrap_or_else(default_rule_mode_list))
    }

    pub fn dns_modes(&self) -> Result<Vec<DnsModeRow>> {
        Ok(self
            .read_list(Doc::DnsModeList)?
            .unwrap_or_else(default_dns_mode_list))
    }

    pub fn dns_table(&self) -> Result<Vec<DnsTableRow>> {
        Ok(self
            .read_list(Doc::DnsTableList)?
            .unwrap_or_else(default_dns_table_list))
    }

    pub fn subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        Ok(self.read_list(Doc::SubscriptionList)?.unwrap_or_default())
    }

    pub fn rule_config(&self) -> Result<RuleConfig> {
        Ok(self.read(Doc::RuleConfig)?.unwrap_or_default())
    }

    pub fn rule_domain(&self) -> Result<RuleDomain> {
        Ok(self.read(Doc::RuleDomain)?.unwrap_or_default())
    }

    /// Every compiler input, with built-in defaults for missing documents
    pub fn load_inputs(&self) -> Result<CompileInputs> {
        Ok(CompileInputs {
            servers: self.servers()?,
            rule_config: self.rule_config()?,
            rule_domain: self.rule_domain()?,
            rule_modes: self.rule_modes()?,
            dns_config: self.read::<DnsConfig>(Doc::DnsConfig)?.unwrap_or_default(),
            dns_modes: self.dns_modes()?,
            ray_common: self
                .read::<RayCommonConfig>(Doc::RayCommonConfig)?
                .unwrap_or_default(),
        })
    }

    /// Newest modification time across the compiler inputs
    pub fn inputs_modified(&self) -> Option<SystemTime> {
        Doc::INPUTS.iter().filter_map(|doc| self.modified(*doc)).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rule::RuleType;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_documents_use_defaults() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        let inputs = store.load_inputs().unwrap();
        assert!(inputs.servers.is_empty());
        assert_eq!(inputs.rule_config, RuleConfig::default());
        assert_eq!(inputs.rule_modes.len(), 3);
        assert_eq!(inputs.dns_modes.len(), 2);
        assert!(inputs.ray_common.socks_enable);
        assert!(store.inputs_modified().is_none());
    }

    #[test]
    fn test_older_records_are_hydrated() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        std::fs::write(
            store.path(Doc::RuleModeList),
            json!([{"name": "old", "rules": [{"outboundTag": "direct", "ruleType": "ip", "ip": "geoip:cn"}]}])
                .to_string(),
        )
        .unwrap();

        let modes = store.rule_modes().unwrap();
        assert_eq!(modes[0].domain_strategy, "AsIs");
        assert_eq!(modes[0].rules[0].rule_type, RuleType::Ip);
        assert_eq!(modes[0].rules[0].network, "");
        assert!(store.modified(Doc::RuleModeList).is_some());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path().join("nested"));
        let config = RuleConfig {
            global_proxy: true,
            ..Default::default()
        };
        store.write(Doc::RuleConfig, &config).unwrap();
        assert_eq!(store.rule_config().unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        std::fs::write(store.path(Doc::Server), "{not json").unwrap();
        assert!(store.servers().is_err());
    }
}
