use super::outbound::{DIRECT_TAG, PROXY_TAG, REJECT_TAG};
use super::types::{Routing, RoutingRule};
use crate::config::rule::{RuleConfig, RuleDomain, RuleModeRow, RuleRow, RuleType};
use crate::util::{process_lines, split_lines};

pub const DEFAULT_DOMAIN_STRATEGY: &str = "AsIs";

/// Build the routing block.
///
/// Rule order is significant since the engine stops at the first match:
/// static domain lists (proxy, direct, reject), then the selected mode's rules,
/// then the unmatched catch-all. Global proxy mode replaces all of it with a
/// single private-network carve-out.
pub fn compile_routing(config: &RuleConfig, domain: &RuleDomain, modes: &[RuleModeRow]) -> Routing {
    if config.global_proxy {
        return global_proxy_routing();
    }

    let mut rules = compile_rule_domain(domain);
    let mut domain_strategy = String::new();

    match modes.get(config.mode) {
        Some(mode) if !mode.rules.is_empty() => {
            domain_strategy = mode.domain_strategy.clone();
            rules.extend(compile_rule_mode(&mode.rules));
        }
        Some(_) => log::debug!("Rule mode {} has no rules", config.mode),
        None => log::debug!("Rule mode index {} is out of range", config.mode),
    }

    if !config.unmatched_strategy.is_empty() {
        let mut rule = RoutingRule::field("doay-unmatched", config.unmatched_strategy.clone());
        rule.port = Some("1-65535".to_string());
        rules.push(rule);
    }

    if domain_strategy.is_empty() {
        domain_strategy = DEFAULT_DOMAIN_STRATEGY.to_string();
    }

    Routing {
        domain_strategy,
        rules,
    }
}

/// Everything goes through the proxy except private domains and addresses
pub fn global_proxy_routing() -> Routing {
    let mut rule = RoutingRule::field("doay-global-proxy", DIRECT_TAG);
    rule.domain = Some(vec!["geosite:private".to_string()]);
    rule.ip = Some(vec!["geoip:private".to_string()]);

    Routing {
        domain_strategy: DEFAULT_DOMAIN_STRATEGY.to_string(),
        rules: vec![rule],
    }
}

/// Static proxy/direct/reject domain rules, each only when its list is non-empty
pub fn compile_rule_domain(domain: &RuleDomain) -> Vec<RoutingRule> {
    [
        ("doay-domain-proxy", PROXY_TAG, &domain.proxy),
        ("doay-domain-direct", DIRECT_TAG, &domain.direct),
        ("doay-domain-reject", REJECT_TAG, &domain.reject),
    ]
    .into_iter()
    .filter(|(_, _, text)| !text.is_empty())
    .map(|(tag, outbound, text)| {
        let mut rule = RoutingRule::field(tag, outbound);
        rule.domain = Some(process_lines(text));
        rule
    })
    .collect()
}

/// Rules of one mode, tagged `{n}-doay-mode-{outbound}` with 1-based `n`
pub fn compile_rule_mode(rows: &[RuleRow]) -> Vec<RoutingRule> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| compile_rule_row(i + 1, row))
        .collect()
}

fn compile_rule_row(position: usize, row: &RuleRow) -> RoutingRule {
    let tag = format!("{}-doay-mode-{}", position, row.outbound_tag);
    let mut rule = RoutingRule::field(tag, row.outbound_tag.clone());

    match row.rule_type {
        RuleType::Domain => rule.domain = Some(process_lines(&row.domain)),
        RuleType::Ip => rule.ip = Some(process_lines(&row.ip)),
        RuleType::Multi => {
            // a multi row with nothing filled in still yields a bare rule
            if !row.domain.is_empty() {
                rule.domain = Some(process_lines(&row.domain));
            }
            if !row.ip.is_empty() {
                rule.ip = Some(process_lines(&row.ip));
            }
            if !row.port.is_empty() {
                rule.port = Some(process_lines(&row.port).join(","));
            }
            if !row.source_port.is_empty() {
                rule.source_port = Some(process_lines(&row.source_port).join(","));
            }
            if !row.network.is_empty() {
                rule.network = Some(row.network.clone());
            }
            if !row.protocol.is_empty() {
                rule.protocol = Some(split_lines(&row.protocol, ','));
            }
            if rule.is_bare() {
                log::warn!("Rule {} has no conditions and matches all traffic", rule.rule_tag);
            }
        }
    }

    rule
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn domain() -> RuleDomain {
        RuleDomain {
            proxy: "google.com\n\n  github.com ".to_string(),
            direct: "baidu.com".to_string(),
            reject: "ads.example".to_string(),
        }
    }

    fn modes() -> Vec<RuleModeRow> {
        vec![RuleModeRow {
            name: "m".to_string(),
            domain_strategy: "IPIfNonMatch".to_string(),
            rules: vec![
                RuleRow {
                    outbound_tag: "direct".to_string(),
                    rule_type: RuleType::Ip,
                    ip: "geoip:cn".to_string(),
                    ..Default::default()
                },
                RuleRow {
                    outbound_tag: "reject".to_string(),
                    rule_type: RuleType::Multi,
                    port: "443\n80".to_string(),
                    network: "udp".to_string(),
                    protocol: "quic, bittorrent".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }]
    }

    #[test]
    fn test_global_proxy_short_circuits() {
        let config = RuleConfig {
            global_proxy: true,
            ..Default::default()
        };
        let routing = compile_routing(&config, &domain(), &modes());
        assert_eq!(routing, global_proxy_routing());
        assert_eq!(routing.rules.len(), 1);
        assert_eq!(routing.rules[0].rule_tag, "doay-global-proxy");
        assert_eq!(routing.rules[0].outbound_tag, "direct");
    }

    #[test]
    fn test_rule_order() {
        let routing = compile_routing(&RuleConfig::default(), &domain(), &modes());
        let tags: Vec<_> = routing.rules.iter().map(|r| r.rule_tag.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "doay-domain-proxy",
                "doay-domain-direct",
                "doay-domain-reject",
                "1-doay-mode-direct",
                "2-doay-mode-reject",
                "doay-unmatched",
            ]
        );
        assert_eq!(routing.domain_strategy, "IPIfNonMatch");
        assert_eq!(
            routing.rules[0].domain,
            Some(vec!["google.com".to_string(), "github.com".to_string()])
        );
        assert_eq!(routing.rules[5].port.as_deref(), Some("1-65535"));
        assert_eq!(routing.rules[5].outbound_tag, "proxy");
    }

    #[test]
    fn test_multi_rule_fields() {
        let rules = compile_rule_mode(&modes()[0].rules);
        let value = serde_json::to_value(&rules[1]).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "field",
                "ruleTag": "2-doay-mode-reject",
                "outboundTag": "reject",
                "port": "443,80",
                "network": "udp",
                "protocol": ["quic", "bittorrent"]
            })
        );
    }

    #[test]
    fn test_empty_multi_rule_is_bare() {
        let rules = compile_rule_mode(&[RuleRow {
            rule_type: RuleType::Multi,
            ..Default::default()
        }]);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_bare());
        assert_eq!(
            serde_json::to_value(&rules[0]).unwrap(),
            json!({"type": "field", "ruleTag": "1-doay-mode-proxy", "outboundTag": "proxy"})
        );
    }

    #[test]
    fn test_out_of_range_mode_falls_back() {
        let config = RuleConfig {
            mode: 9,
            unmatched_strategy: String::new(),
            ..Default::default()
        };
        let routing = compile_routing(&config, &RuleDomain::default(), &modes());
        assert!(routing.rules.is_empty());
        assert_eq!(routing.domain_strategy, "AsIs");
    }

    #[test]
    fn test_compile_is_idempotent() {
        let config = RuleConfig::default();
        let a = serde_json::to_string(&compile_routing(&config, &domain(), &modes())).unwrap();
        let b = serde_json::to_string(&compile_routing(&config, &domain(), &modes())).unwrap();
        assert_eq!(a, b);
    }
}
