use serde::Serialize;
use serde_json::{Map, Value};

use super::transport::{
    GrpcSettings, HttpSettings, HttpUpgradeSettings, KcpSettings, RealitySettings, TcpSettings,
    TlsSettings, WsSettings, XhttpSettings,
};
use crate::config::port::Port;

/// Complete engine configuration document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RayDocument {
    pub log: LogConf,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<Routing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogConf {
    pub loglevel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inbound {
    pub tag: String,
    pub protocol: String,
    pub listen: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<InboundSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sniffing: Option<Sniffing>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundSettings {
    pub udp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sniffing {
    pub enabled: bool,
    #[serde(rename = "destOverride")]
    pub dest_override: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outbound {
    pub tag: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<OutboundSettings>,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<Mux>,
}

impl Outbound {
    /// Settings-less outbound such as `freedom` or `blackhole`
    pub fn bare(tag: &str, protocol: &str) -> Self {
        Self {
            tag: tag.to_string(),
            protocol: protocol.to_string(),
            settings: None,
            stream_settings: None,
            mux: None,
        }
    }
}

/// vmess/vless address users through `vnext`, ss/trojan through `servers`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundSettings {
    Vnext { vnext: Vec<VnextServer> },
    Servers { servers: Vec<ServerEndpoint> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnextServer {
    pub address: String,
    pub port: Port,
    pub users: Vec<VnextUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnextUser {
    pub id: String,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEndpoint {
    pub address: String,
    pub port: Port,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mux {
    pub enabled: bool,
    pub concurrency: i64,
}

/// `streamSettings`: network name, security layer and one transport block
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamSettings {
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
    #[serde(rename = "realitySettings", skip_serializing_if = "Option::is_none")]
    pub reality_settings: Option<RealitySettings>,
    #[serde(rename = "tcpSettings", skip_serializing_if = "Option::is_none")]
    pub tcp_settings: Option<TcpSettings>,
    #[serde(rename = "kcpSettings", skip_serializing_if = "Option::is_none")]
    pub kcp_settings: Option<KcpSettings>,
    #[serde(rename = "grpcSettings", skip_serializing_if = "Option::is_none")]
    pub grpc_settings: Option<GrpcSettings>,
    #[serde(rename = "wsSettings", skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(rename = "httpSettings", skip_serializing_if = "Option::is_none")]
    pub http_settings: Option<HttpSettings>,
    #[serde(rename = "httpupgradeSettings", skip_serializing_if = "Option::is_none")]
    pub httpupgrade_settings: Option<HttpUpgradeSettings>,
    #[serde(rename = "xhttpSettings", skip_serializing_if = "Option::is_none")]
    pub xhttp_settings: Option<XhttpSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routing {
    #[serde(rename = "domainStrategy")]
    pub domain_strategy: String,
    pub rules: Vec<RoutingRule>,
}

/// One `field` rule. Condition fields are present only when populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(rename = "ruleTag")]
    pub rule_tag: String,
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(rename = "sourcePort", skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Vec<String>>,
}

impl RoutingRule {
    pub fn field(rule_tag: impl Into<String>, outbound_tag: impl Into<String>) -> Self {
        Self {
            rule_type: "field".to_string(),
            rule_tag: rule_tag.into(),
            outbound_tag: outbound_tag.into(),
            domain: None,
            ip: None,
            port: None,
            source_port: None,
            network: None,
            protocol: None,
        }
    }

    /// No condition field is set
    pub fn is_bare(&self) -> bool {
        self.domain.is_none()
            && self.ip.is_none()
            && self.port.is_none()
            && self.source_port.is_none()
            && self.network.is_none()
            && self.protocol.is_none()
    }
}

/// Sparse DNS block: every default-valued field is left out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsObject {
    pub tag: String,
    /// domain -> address or list of addresses, in row order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<DnsServer>>,
    #[serde(rename = "clientIP", skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(rename = "queryStrategy", skip_serializing_if = "Option::is_none")]
    pub query_strategy: Option<String>,
    #[serde(rename = "disableCache", skip_serializing_if = "Option::is_none")]
    pub disable_cache: Option<bool>,
    #[serde(rename = "disableFallback", skip_serializing_if = "Option::is_none")]
    pub disable_fallback: Option<bool>,
    #[serde(rename = "disableFallbackIfMatch", skip_serializing_if = "Option::is_none")]
    pub disable_fallback_if_match: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DnsServer {
    Address(String),
    Object(DnsServerObject),
}

/// A server `address` is usually text; a custom port replaces it with a number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DnsAddress {
    Text(String),
    Port(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsServerObject {
    pub address: DnsAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,
    #[serde(rename = "expectIPs", skip_serializing_if = "Option::is_none")]
    pub expect_ips: Option<Vec<String>>,
    #[serde(rename = "clientIP", skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(rename = "queryStrategy", skip_serializing_if = "Option::is_none")]
    pub query_strategy: Option<String>,
    #[serde(rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(rename = "skipFallback", skip_serializing_if = "Option::is_none")]
    pub skip_fallback: Option<bool>,
    #[serde(rename = "allowUnexpectedIPs", skip_serializing_if = "Option::is_none")]
    pub allow_unexpected_ips: Option<bool>,
}

/// Serializes as `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub listen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    pub system: SystemPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemPolicy {
    #[serde(rename = "statsInboundUplink")]
    pub stats_inbound_uplink: bool,
    #[serde(rename = "statsInboundDownlink")]
    pub stats_inbound_downlink: bool,
    #[serde(rename = "statsOutboundUplink")]
    pub stats_outbound_uplink: bool,
    #[serde(rename = "statsOutboundDownlink")]
    pub stats_outbound_downlink: bool,
}
