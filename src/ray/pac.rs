//! Proxy auto-config (`proxy.js`) generation.

use serde::Serialize;

use crate::config::rule::{RuleConfig, RuleDomain};
use crate::util::process_lines;

/// Domain lists and fallback baked into a PAC script
#[derive(Debug, Clone, PartialEq)]
pub struct PacRules {
    /// `host:port` of the local socks inbound
    pub proxy: String,
    pub proxy_domains: Vec<String>,
    pub direct_domains: Vec<String>,
    pub reject_domains: Vec<String>,
    pub unmatched_direct: bool,
}

/// What a PAC script answers for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacAction {
    Proxy,
    Direct,
    Reject,
}

impl PacRules {
    pub fn new(proxy: impl Into<String>, config: &RuleConfig, domain: &RuleDomain) -> Self {
        let lower = |text: &str| process_lines(&text.to_lowercase());
        Self {
            proxy: proxy.into(),
            proxy_domains: lower(&domain.proxy),
            direct_domains: lower(&domain.direct),
            reject_domains: lower(&domain.reject),
            unmatched_direct: config.unmatched_strategy == "direct",
        }
    }

    /// Same decision the generated `FindProxyForURL` makes
    pub fn find_proxy(&self, host: &str) -> PacAction {
        let host = host.to_lowercase();
        if is_host_match(&self.proxy_domains, &host) {
            PacAction::Proxy
        } else if is_host_match(&self.direct_domains, &host) {
            PacAction::Direct
        } else if is_host_match(&self.reject_domains, &host) {
            PacAction::Reject
        } else if self.unmatched_direct {
            PacAction::Direct
        } else {
            PacAction::Proxy
        }
    }

    pub fn render(&self) -> String {
        let fallback = if self.unmatched_direct { "\"DIRECT\"" } else { "proxy" };
        format!(
            r#"
var proxy = 'SOCKS5 {proxy}';

var proxyDomains = {proxy_domains};

var directDomains = {direct_domains};

var rejectDomains = {reject_domains};

if (!String.prototype.endsWith) {{
	String.prototype.endsWith = function(s) {{
		return this.length >= s.length && this.lastIndexOf(s) === this.length - s.length;
	}};
}}

function isHostMatch(domains, host) {{
	return domains.some(v => v === host || host.endsWith('.' + v));
}}

function FindProxyForURL(url, host) {{
	if (isHostMatch(proxyDomains, host)) return proxy;
	if (isHostMatch(directDomains, host)) return "DIRECT";
	if (isHostMatch(rejectDomains, host)) return "PROXY 0.0.0.0:80";
	return {fallback};
}}
"#,
            proxy = self.proxy,
            proxy_domains = js_array(&self.proxy_domains),
            direct_domains = js_array(&self.direct_domains),
            reject_domains = js_array(&self.reject_domains),
            fallback = fallback,
        )
    }
}

/// Exact match or any subdomain of an entry
fn is_host_match(domains: &[String], host: &str) -> bool {
    domains.iter().any(|d| {
        host == d
            || host
                .strip_suffix(d.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Tab-indented JSON array
fn js_array(items: &[String]) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    match items.serialize(&mut ser) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| "[]".to_string()),
        Err(e) => {
            log::error!("Failed to render PAC domain list: {}", e);
            "[]".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(unmatched: &str) -> PacRules {
        let config = RuleConfig {
            unmatched_strategy: unmatched.to_string(),
            ..Default::default()
        };
        let domain = RuleDomain {
            proxy: "Google.com\n\ngithub.com".to_string(),
            direct: "baidu.com".to_string(),
            reject: String::new(),
        };
        PacRules::new("127.0.0.1:1086", &config, &domain)
    }

    #[test]
    fn test_host_matching() {
        let pac = rules("direct");
        assert_eq!(pac.find_proxy("google.com"), PacAction::Proxy);
        assert_eq!(pac.find_proxy("www.google.com"), PacAction::Proxy);
        assert_eq!(pac.find_proxy("notgoogle.com"), PacAction::Direct);
        assert_eq!(pac.find_proxy("map.baidu.com"), PacAction::Direct);
        assert_eq!(rules("proxy").find_proxy("example.org"), PacAction::Proxy);
    }

    #[test]
    fn test_render() {
        let script = rules("direct").render();
        assert!(script.contains("var proxy = 'SOCKS5 127.0.0.1:1086';"));
        assert!(script.contains("var proxyDomains = [\n\t\"google.com\",\n\t\"github.com\"\n];"));
        assert!(script.contains("var rejectDomains = [];"));
        assert!(script.contains("\treturn \"DIRECT\";\n}"));

        let script = rules("proxy").render();
        assert!(script.contains("\treturn proxy;\n}"));
    }
}
