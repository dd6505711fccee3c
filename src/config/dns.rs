use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hydrate::{merge_over, take_list, Hydrate};
use super::port::Port;
use crate::error::HydrateError;
use crate::share::fingerprint::Fingerprint;

pub const QUERY_USE_IP: &str = "UseIP";
pub const QUERY_USE_IPV4: &str = "UseIPv4";
pub const QUERY_USE_IPV6: &str = "UseIPv6";

/// Engine default for a server's query timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 4000;

/// Engine default DNS port
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Built-in DNS switch (`dns_config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    pub enable: bool,
    /// Index into the DNS mode list
    pub mode: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            mode: 0,
        }
    }
}

impl Hydrate for DnsConfig {
    const KIND: &'static str = "dns config";
}

/// Static domain -> address override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsHostRow {
    pub name: String,
    pub note: String,
    pub domain: String,
    /// One address, or several separated by newlines
    pub host: String,
}

impl Hydrate for DnsHostRow {
    const KIND: &'static str = "dns host";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsServerType {
    /// Bare address string
    #[default]
    Address,
    /// Detailed server object
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsServerRow {
    pub name: String,
    pub note: String,
    #[serde(rename = "type")]
    pub server_type: DnsServerType,
    pub address: String,
    pub port: Port,
    pub domains: String,
    #[serde(rename = "expectIPs")]
    pub expect_ips: String,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    /// UseIP / UseIPv4 / UseIPv6
    #[serde(rename = "queryStrategy")]
    pub query_strategy: String,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: u64,
    #[serde(rename = "skipFallback")]
    pub skip_fallback: bool,
    #[serde(rename = "allowUnexpectedIPs")]
    pub allow_unexpected_ips: bool,
}

impl Default for DnsServerRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            note: String::new(),
            server_type: DnsServerType::Address,
            address: String::new(),
            port: Port::unset(),
            domains: String::new(),
            expect_ips: String::new(),
            client_ip: String::new(),
            query_strategy: QUERY_USE_IP.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            skip_fallback: false,
            allow_unexpected_ips: false,
        }
    }
}

impl Hydrate for DnsServerRow {
    const KIND: &'static str = "dns server";
}

/// Named DNS configuration (`dns_mode_list.json` element)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsModeRow {
    pub name: String,
    pub note: String,
    pub hash: String,
    pub hosts: Vec<DnsHostRow>,
    pub servers: Vec<DnsServerRow>,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    #[serde(rename = "queryStrategy")]
    pub query_strategy: String,
    #[serde(rename = "disableCache")]
    pub disable_cache: bool,
    #[serde(rename = "disableFallback")]
    pub disable_fallback: bool,
    #[serde(rename = "disableFallbackIfMatch")]
    pub disable_fallback_if_match: bool,
}

impl Default for DnsModeRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            note: String::new(),
            hash: String::new(),
            hosts: Vec::new(),
            servers: Vec::new(),
            client_ip: String::new(),
            query_strategy: QUERY_USE_IP.to_string(),
            disable_cache: false,
            disable_fallback: false,
            disable_fallback_if_match: false,
        }
    }
}

impl Hydrate for DnsModeRow {
    const KIND: &'static str = "dns mode";

    fn hydrate(mut stored: Value) -> Result<Self, HydrateError> {
        let hosts = take_list::<DnsHostRow>(&mut stored, "hosts")?;
        let servers = take_list::<DnsServerRow>(&mut stored, "servers")?;
        let mut row = merge_over(Self::default(), stored, Self::KIND)?;
        if let Some(hosts) = hosts {
            row.hosts = hosts;
        }
        if let Some(servers) = servers {
            row.servers = servers;
        }
        Ok(row)
    }
}

impl Fingerprint for DnsModeRow {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }
}

/// Public resolver catalogue entry (`dns_table_list.json` element)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsTableRow {
    pub name: String,
    pub note: String,
    pub hash: String,
    #[serde(rename = "IPv4")]
    pub ipv4: String,
    #[serde(rename = "IPv6")]
    pub ipv6: String,
    #[serde(rename = "DoH")]
    pub doh: String,
    #[serde(rename = "DoT")]
    pub dot: String,
}

impl Hydrate for DnsTableRow {
    const KIND: &'static str = "public dns";
}

impl Fingerprint for DnsTableRow {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_row_defaults() {
        let row = DnsServerRow::hydrate(json!({"address": "8.8.8.8"})).unwrap();
        assert_eq!(row.server_type, DnsServerType::Address);
        assert_eq!(row.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(row.query_strategy, QUERY_USE_IP);
    }

    #[test]
    fn test_mode_row_hydrates_nested_servers() {
        let row = DnsModeRow::hydrate(json!({
            "name": "cf",
            "servers": [{"type": "object", "address": "https://1.1.1.1/dns-query", "port": ""}],
            "hosts": [{"domain": "dns.google", "host": "8.8.8.8"}]
        }))
        .unwrap();
        assert_eq!(row.servers[0].server_type, DnsServerType::Object);
        assert_eq!(row.servers[0].timeout_ms, 4000);
        assert_eq!(row.hosts[0].name, "");
        assert!(!row.disable_cache);
    }

    #[test]
    fn test_table_row_field_names() {
        let row = DnsTableRow {
            ipv4: "1.1.1.1".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["IPv4"], "1.1.1.1");
        assert!(value.get("DoH").is_some());
    }
}
