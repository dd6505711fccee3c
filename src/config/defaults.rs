//! Built-in rule modes, DNS modes and the public DNS catalogue.
//!
//! Used whenever the corresponding document is missing from the data directory.

use super::dns::{DnsHostRow, DnsModeRow, DnsServerRow, DnsServerType, DnsTableRow};
use super::rule::{RuleModeRow, RuleRow, RuleType};
use crate::share::fingerprint::Fingerprint;

const CN_DNS_DOMAINS: &str = "domain:114dns.com\ndomain:360.cn\ndomain:alidns.com\ndomain:chinamobile.com\ndomain:chinatelecom.com.cn\ndomain:chinaunicom.com\ndomain:cnnic.cn\ndomain:dns.360.cn\ndomain:dnspod.cn\ndomain:doh.pub\ndomain:dot.pub\ndomain:onedns.net";
const CN_DNS_IPS: &str = "1.12.12.12\n1.2.4.8\n101.226.4.6\n101.6.6.6\n114.114.114.110\n114.114.114.114\n114.114.114.119\n114.114.115.110\n114.114.115.115\n114.114.115.119\n117.50.22.22\n119.29.29.29\n180.76.76.76\n182.254.116.116\n210.2.4.8\n223.5.5.5\n223.6.6.6";

fn rule(name: &str, note: &str, outbound: &str, rule_type: RuleType) -> RuleRow {
    RuleRow {
        name: name.to_string(),
        note: note.to_string(),
        outbound_tag: outbound.to_string(),
        rule_type,
        ..Default::default()
    }
}

fn domain_rule(name: &str, note: &str, outbound: &str, domain: &str) -> RuleRow {
    RuleRow {
        domain: domain.to_string(),
        ..rule(name, note, outbound, RuleType::Domain)
    }
}

fn ip_rule(name: &str, note: &str, outbound: &str, ip: &str) -> RuleRow {
    RuleRow {
        ip: ip.to_string(),
        ..rule(name, note, outbound, RuleType::Ip)
    }
}

/// Rules every built-in mode starts with
fn common_rules() -> Vec<RuleRow> {
    vec![
        RuleRow {
            port: "443".to_string(),
            network: "udp".to_string(),
            ..rule(
                "UDP 443 traffic",
                "Block UDP 443 (QUIC), used by some games and streaming sites",
                "reject",
                RuleType::Multi,
            )
        },
        RuleRow {
            protocol: "bittorrent".to_string(),
            ..rule(
                "BitTorrent traffic",
                "Keep BitTorrent off the proxy server so it does not get banned",
                "reject",
                RuleType::Multi,
            )
        },
        domain_rule(
            "Ad domains",
            "Block community-maintained ad and ad-network domains",
            "reject",
            "geosite:category-ads-all",
        ),
    ]
}

fn private_rules() -> Vec<RuleRow> {
    vec![
        ip_rule(
            "Private IPs",
            "Direct for private addresses the proxy cannot reach, e.g. 192.168.1.1",
            "direct",
            "geoip:private",
        ),
        domain_rule(
            "Private domains",
            "Direct for private names the proxy cannot reach, e.g. localhost",
            "direct",
            "geosite:private",
        ),
    ]
}

fn mode(name: &str, note: &str, rules: Vec<RuleRow>) -> RuleModeRow {
    let mut row = RuleModeRow {
        name: name.to_string(),
        note: note.to_string(),
        domain_strategy: "IPIfNonMatch".to_string(),
        ..Default::default()
    };
    row.set_rules(rules);
    row
}

pub fn default_rule_mode_list() -> Vec<RuleModeRow> {
    let mut cn = vec![RuleRow {
        domain: CN_DNS_DOMAINS.to_string(),
        ip: CN_DNS_IPS.to_string(),
        ..rule(
            "Mainland China DNS servers",
            "Direct for common mainland China DNS servers",
            "direct",
            RuleType::Multi,
        )
    }];
    cn.extend(common_rules());
    cn.push(domain_rule(
        "GFW blocked domains",
        "Proxy domains known to be blocked by the GFW",
        "proxy",
        "geosite:gfw",
    ));
    cn.extend(private_rules());
    cn.push(ip_rule("Mainland China IPs", "Direct for all mainland China IPs", "direct", "geoip:cn"));
    cn.push(domain_rule(
        "Mainland China domains",
        "Direct for common mainland China domains",
        "direct",
        "geosite:cn",
    ));

    let country = |name: &str, code: &str| {
        let mut rules = common_rules();
        rules.extend(private_rules());
        rules.push(ip_rule(
            &format!("{} IPs", name),
            &format!("Direct for all {} IPs", name),
            "direct",
            &format!("geoip:{}", code),
        ));
        mode(
            &format!("{} mode", name),
            &format!("Rules tuned for networks in {}", name),
            rules,
        )
    };

    vec![
        mode("Mainland China mode", "Rules tuned for networks in mainland China", cn),
        country("Russia", "ru"),
        country("Iran", "ir"),
    ]
}

fn host(name: &str, domain: &str, address: &str) -> DnsHostRow {
    DnsHostRow {
        name: name.to_string(),
        note: String::new(),
        domain: domain.to_string(),
        host: address.to_string(),
    }
}

fn address_server(name: &str, address: &str) -> DnsServerRow {
    DnsServerRow {
        name: name.to_string(),
        address: address.to_string(),
        ..Default::default()
    }
}

fn object_server(name: &str, address: &str, domains: &str, expect_ips: &str, skip_fallback: bool) -> DnsServerRow {
    DnsServerRow {
        name: name.to_string(),
        server_type: DnsServerType::Object,
        address: address.to_string(),
        domains: domains.to_string(),
        expect_ips: expect_ips.to_string(),
        skip_fallback,
        ..Default::default()
    }
}

pub fn default_dns_mode_list() -> Vec<DnsModeRow> {
    let ads = host("Ad domains", "geosite:category-ads-all", "127.0.0.1");

    let mut cloudflare = DnsModeRow {
        name: "Cloudflare DNS first".to_string(),
        note: "Resolve with Cloudflare and Google DNS; mainland China domains go to AliDNS".to_string(),
        hosts: vec![
            host("Google DNS", "dns.google", "8.8.8.8"),
            host("Cloudflare DNS", "one.one.one.one", "1.1.1.1"),
            host("AliDNS", "dns.alidns.com", "223.5.5.5"),
            host("DNSPod", "dns.pub", "119.29.29.29"),
            ads.clone(),
        ],
        servers: vec![
            object_server(
                "Cloudflare DNS",
                "https://1.1.1.1/dns-query",
                "geosite:geolocation-!cn",
                "geoip:!cn",
                false,
            ),
            address_server("Google DNS", "8.8.8.8"),
            object_server("AliDNS", "223.5.5.5", "geosite:cn", "geoip:cn", true),
            address_server("Local DNS", "localhost"),
        ],
        ..Default::default()
    };
    cloudflare.refresh_hash();

    let mut google = DnsModeRow {
        name: "Google DNS first".to_string(),
        note: "Resolve with Google DNS, then AliDNS".to_string(),
        hosts: vec![
            host("Google DNS", "dns.google", "8.8.8.8"),
            host("AliDNS", "dns.alidns.com", "223.5.5.5"),
            ads,
        ],
        servers: vec![
            address_server("Google DNS", "8.8.8.8"),
            address_server("AliDNS", "223.5.5.5"),
            address_server("Local DNS", "localhost"),
        ],
        ..Default::default()
    };
    google.refresh_hash();

    vec![cloudflare, google]
}

fn table(name: &str, note: &str, ipv4: &str, ipv6: &str, doh: &str, dot: &str) -> DnsTableRow {
    let mut row = DnsTableRow {
        name: name.to_string(),
        note: note.to_string(),
        hash: String::new(),
        ipv4: ipv4.to_string(),
        ipv6: ipv6.to_string(),
        doh: doh.to_string(),
        dot: dot.to_string(),
    };
    row.refresh_hash();
    row
}

pub fn default_dns_table_list() -> Vec<DnsTableRow> {
    vec![
        table(
            "[Global] Google Public DNS",
            "Largest public resolver, fast, DNSSEC",
            "8.8.8.8\n8.8.4.4",
            "2001:4860:4860::8888\n2001:4860:4860::8844",
            "https://dns.google/dns-query",
            "dns.google",
        ),
        table(
            "[Global] Cloudflare DNS",
            "Privacy focused, many edge locations",
            "1.1.1.1\n1.0.0.1",
            "2606:4700:4700::1111\n2606:4700:4700::1001",
            "https://cloudflare-dns.com/dns-query",
            "one.one.one.one",
        ),
        table(
            "AliDNS",
            "Fastest in mainland China, CDN aware",
            "223.5.5.5\n223.6.6.6",
            "2400:3200::1\n2400:3200:baba::1",
            "https://dns.alidns.com/dns-query",
            "dns.alidns.com",
        ),
        table(
            "Tencent DNSPod",
            "Tuned for games and video",
            "1.12.12.12\n119.29.29.29",
            "2402:4e00:1::\n2402:4e00::",
            "https://doh.pub/dns-query",
            "dot.pub",
        ),
        table(
            "114 DNS",
            "Long-running mainland China resolver, IPv4 only",
            "114.114.114.114\n114.114.115.115",
            "",
            "https://114.114.114.114/dns-query",
            "",
        ),
        table(
            "Baidu DNS",
            "",
            "180.76.76.76",
            "2400:da00::6666",
            "https://180.76.76.76/dns-query",
            "",
        ),
        table(
            "Tsinghua University DNS",
            "",
            "101.6.6.6",
            "2001:da8:202:10::36",
            "https://101.6.6.6/dns-query",
            "",
        ),
        table(
            "[Global] OpenDNS (Cisco)",
            "Malware filtering and parental controls",
            "208.67.222.222\n208.67.220.220",
            "2620:119:35::35\n2620:119:53::53",
            "https://doh.opendns.com/dns-query",
            "",
        ),
        table(
            "[Global] Quad9",
            "Non-profit, blocks malicious domains",
            "9.9.9.9\n149.112.112.112",
            "2620:fe::fe",
            "https://dns.quad9.net/dns-query",
            "",
        ),
        table(
            "[Global] AdGuard DNS",
            "Blocks ads and trackers",
            "94.140.14.14\n94.140.15.15",
            "2a10:50c0::ad1:ff\n2a10:50c0::ad2:ff",
            "https://dns.adguard.com/dns-query",
            "",
        ),
        table(
            "[Global] DNS.SB",
            "",
            "185.222.222.222\n45.11.45.11",
            "2a09::1\n2a09::2",
            "https://doh.dns.sb/dns-query",
            "dns.sb",
        ),
    ]
}
