use serde_json::{Map, Value};

use super::types::{DnsAddress, DnsObject, DnsServer, DnsServerObject};
use crate::config::dns::{
    DnsConfig, DnsModeRow, DnsServerRow, DnsServerType, DEFAULT_DNS_PORT, DEFAULT_TIMEOUT_MS,
    QUERY_USE_IP, QUERY_USE_IPV4, QUERY_USE_IPV6,
};
use crate::util::process_lines;

pub const DNS_TAG: &str = "doay-dns";

/// DNS block for the selected mode, or `None` when the built-in DNS is off or
/// the mode index points past the list
pub fn compile_dns(config: &DnsConfig, modes: &[DnsModeRow]) -> Option<DnsObject> {
    if !config.enable {
        return None;
    }
    match modes.get(config.mode) {
        Some(mode) => Some(compile_dns_mode(mode)),
        None => {
            log::debug!("DNS mode index {} is out of range", config.mode);
            None
        }
    }
}

/// Compile one DNS mode into its sparse engine form.
///
/// When any server pins an IP family, the top-level strategy is forced to
/// `UseIP`. The input row is left untouched.
pub fn compile_dns_mode(row: &DnsModeRow) -> DnsObject {
    let row = coerce_query_strategy(row);

    let hosts = if row.hosts.is_empty() {
        None
    } else {
        let mut map = Map::new();
        for host in &row.hosts {
            let value = if host.host.contains('\n') {
                Value::from(process_lines(&host.host))
            } else {
                Value::from(host.host.clone())
            };
            map.insert(host.domain.clone(), value);
        }
        Some(map)
    };

    let servers = if row.servers.is_empty() {
        None
    } else {
        Some(row.servers.iter().map(compile_dns_server).collect())
    };

    DnsObject {
        tag: DNS_TAG.to_string(),
        hosts,
        servers,
        client_ip: non_empty(&row.client_ip),
        query_strategy: strategy_if_custom(&row.query_strategy),
        disable_cache: row.disable_cache.then_some(true),
        disable_fallback: row.disable_fallback.then_some(true),
        disable_fallback_if_match: row.disable_fallback_if_match.then_some(true),
    }
}

/// Copy of `row` whose own strategy is `UseIP` if any detailed server uses
/// `UseIPv4` or `UseIPv6`
pub fn coerce_query_strategy(row: &DnsModeRow) -> DnsModeRow {
    let pinned = row.servers.iter().any(|s| {
        s.server_type == DnsServerType::Object
            && (s.query_strategy == QUERY_USE_IPV4 || s.query_strategy == QUERY_USE_IPV6)
    });

    let mut row = row.clone();
    if pinned {
        row.query_strategy = QUERY_USE_IP.to_string();
    }
    row
}

pub fn compile_dns_server(row: &DnsServerRow) -> DnsServer {
    if row.server_type == DnsServerType::Address {
        return DnsServer::Address(row.address.clone());
    }

    // a custom port takes the place of the address text
    let address = match row.port.get() {
        Some(port) if port != DEFAULT_DNS_PORT => DnsAddress::Port(port),
        _ => DnsAddress::Text(row.address.clone()),
    };

    let timeout_ms = if row.timeout_ms > 0 && row.timeout_ms != DEFAULT_TIMEOUT_MS {
        Some(row.timeout_ms)
    } else {
        None
    };

    DnsServer::Object(DnsServerObject {
        address,
        domains: non_empty_lines(&row.domains),
        expect_ips: non_empty_lines(&row.expect_ips),
        client_ip: non_empty(&row.client_ip),
        query_strategy: strategy_if_custom(&row.query_strategy),
        timeout_ms,
        skip_fallback: row.skip_fallback.then_some(true),
        allow_unexpected_ips: row.allow_unexpected_ips.then_some(true),
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn non_empty_lines(value: &str) -> Option<Vec<String>> {
    if value.is_empty() {
        None
    } else {
        Some(process_lines(value))
    }
}

fn strategy_if_custom(value: &str) -> Option<String> {
    if value.is_empty() || value == QUERY_USE_IP {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dns::DnsHostRow;
    use crate::config::port::Port;
    use serde_json::json;

    fn object_server(strategy: &str, timeout_ms: u64) -> DnsServerRow {
        DnsServerRow {
            server_type: DnsServerType::Object,
            address: "https://1.1.1.1/dns-query".to_string(),
            query_strategy: strategy.to_string(),
            timeout_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_or_missing_mode() {
        let modes = vec![DnsModeRow::default()];
        let off = DnsConfig {
            enable: false,
            mode: 0,
        };
        assert!(compile_dns(&off, &modes).is_none());
        let missing = DnsConfig {
            enable: true,
            mode: 3,
        };
        assert!(compile_dns(&missing, &modes).is_none());
        assert!(compile_dns(&DnsConfig::default(), &modes).is_some());
    }

    #[test]
    fn test_strategy_coercion_without_mutation() {
        let row = DnsModeRow {
            query_strategy: "UseIPv6".to_string(),
            servers: vec![object_server("UseIPv4", 4000)],
            ..Default::default()
        };
        let dns = compile_dns_mode(&row);
        // UseIP is the default and therefore left out
        assert_eq!(dns.query_strategy, None);
        assert_eq!(row.query_strategy, "UseIPv6");
        assert_eq!(coerce_query_strategy(&row).query_strategy, "UseIP");

        let untouched = DnsModeRow {
            query_strategy: "UseIPv6".to_string(),
            ..Default::default()
        };
        assert_eq!(compile_dns_mode(&untouched).query_strategy.as_deref(), Some("UseIPv6"));
    }

    #[test]
    fn test_default_timeout_is_omitted() {
        let default = serde_json::to_value(compile_dns_server(&object_server("UseIP", 4000))).unwrap();
        assert!(default.get("timeoutMs").is_none());
        assert!(default.get("queryStrategy").is_none());

        let custom = serde_json::to_value(compile_dns_server(&object_server("UseIP", 8000))).unwrap();
        assert_eq!(custom["timeoutMs"], 8000);
    }

    #[test]
    fn test_address_server_is_bare_string() {
        let row = DnsServerRow {
            address: "8.8.8.8".to_string(),
            timeout_ms: 1,
            ..Default::default()
        };
        assert_eq!(compile_dns_server(&row), DnsServer::Address("8.8.8.8".to_string()));
    }

    #[test]
    fn test_custom_port_replaces_address() {
        let mut row = object_server("UseIP", 4000);
        row.port = Port::new(5353);
        let value = serde_json::to_value(compile_dns_server(&row)).unwrap();
        assert_eq!(value["address"], 5353);

        row.port = Port::new(53);
        let value = serde_json::to_value(compile_dns_server(&row)).unwrap();
        assert_eq!(value["address"], "https://1.1.1.1/dns-query");
    }

    #[test]
    fn test_sparse_output() {
        let row = DnsModeRow {
            hosts: vec![
                DnsHostRow {
                    domain: "dns.google".to_string(),
                    host: "8.8.8.8\n8.8.4.4".to_string(),
                    ..Default::default()
                },
                DnsHostRow {
                    domain: "one.one".to_string(),
                    host: "1.1.1.1".to_string(),
                    ..Default::default()
                },
            ],
            servers: vec![DnsServerRow {
                server_type: DnsServerType::Object,
                address: "localhost".to_string(),
                domains: "geosite:cn\nbaidu.com".to_string(),
                skip_fallback: true,
                ..Default::default()
            }],
            disable_cache: true,
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(compile_dns_mode(&row)).unwrap(),
            json!({
                "tag": "doay-dns",
                "hosts": {"dns.google": ["8.8.8.8", "8.8.4.4"], "one.one": "1.1.1.1"},
                "servers": [{"address": "localhost", "domains": ["geosite:cn", "baidu.com"], "skipFallback": true}],
                "disableCache": true
            })
        );
    }
}
