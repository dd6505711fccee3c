use std::path::Path;

use super::dns::compile_dns;
use super::outbound::{compile_outbound, compile_outbounds};
use super::routing::compile_routing;
use super::types::{
    Inbound, InboundSettings, LogConf, Metrics, Policy, RayDocument, Sniffing, Stats, SystemPolicy,
};
use crate::config::dns::{DnsConfig, DnsModeRow};
use crate::config::ray_common::{RayCommonConfig, DEFAULT_STATS_PORT};
use crate::config::rule::{RuleConfig, RuleDomain, RuleModeRow};
use crate::config::server::ServerRow;
use crate::error::CompileError;

const DEFAULT_LOG_LEVEL: &str = "warning";

/// Everything the compiler reads, already hydrated
#[derive(Debug, Clone, Default)]
pub struct CompileInputs {
    pub servers: Vec<ServerRow>,
    pub rule_config: RuleConfig,
    pub rule_domain: RuleDomain,
    pub rule_modes: Vec<RuleModeRow>,
    pub dns_config: DnsConfig,
    pub dns_modes: Vec<DnsModeRow>,
    pub ray_common: RayCommonConfig,
}

impl CompileInputs {
    /// The row with `on == 1`
    pub fn active_server(&self) -> Option<&ServerRow> {
        self.servers.iter().find(|s| s.is_on())
    }
}

/// Local listen address of the engine's inbounds
#[derive(Debug, Clone, PartialEq)]
pub struct Listen {
    pub host: String,
    pub socks_port: u16,
    pub http_port: u16,
}

/// Assemble the full engine document around the active server.
///
/// Either a complete document is returned or an error; nothing half-built.
pub fn compile_document(
    inputs: &CompileInputs,
    listen: &Listen,
    data_dir: Option<&Path>,
) -> Result<RayDocument, CompileError> {
    let server = inputs.active_server().ok_or(CompileError::NoActiveServer)?;
    let common = &inputs.ray_common;

    let mut doc = RayDocument {
        log: log_conf(common, data_dir, "xray"),
        inbounds: inbounds(listen, common),
        outbounds: compile_outbounds(server, common)?,
        routing: Some(compile_routing(
            &inputs.rule_config,
            &inputs.rule_domain,
            &inputs.rule_modes,
        )),
        dns: compile_dns(&inputs.dns_config, &inputs.dns_modes),
        stats: None,
        metrics: None,
        policy: None,
    };

    if common.stats_enable {
        apply_stats(&mut doc, common);
    }

    log::debug!(
        "Compiled engine document for server {:?} with {} routing rules",
        server.ps,
        doc.routing.as_ref().map(|r| r.rules.len()).unwrap_or(0)
    );
    Ok(doc)
}

/// `loglevel` plus access/error files under `<data_dir>/logs/` when a data dir is known
pub fn log_conf(common: &RayCommonConfig, data_dir: Option<&Path>, file_prefix: &str) -> LogConf {
    let loglevel = if common.ray_log_level.is_empty() {
        DEFAULT_LOG_LEVEL.to_string()
    } else {
        common.ray_log_level.clone()
    };

    let log_file = |kind: &str| {
        data_dir.map(|dir| {
            dir.join("logs")
                .join(format!("{}_{}.log", file_prefix, kind))
                .display()
                .to_string()
        })
    };

    LogConf {
        loglevel,
        access: log_file("access"),
        error: log_file("error"),
    }
}

/// socks and http inbounds, each emitted only when its `*_enable` flag is set
pub fn inbounds(listen: &Listen, common: &RayCommonConfig) -> Vec<Inbound> {
    let mut list = Vec::new();

    if common.socks_enable {
        list.push(Inbound {
            tag: "socks-in".to_string(),
            protocol: "socks".to_string(),
            listen: listen.host.clone(),
            port: listen.socks_port,
            settings: Some(InboundSettings {
                udp: common.socks_udp,
            }),
            sniffing: Some(Sniffing {
                enabled: common.socks_sniffing,
                dest_override: common.socks_sniffing_dest_override.clone(),
            }),
        });
    }

    if common.http_enable {
        list.push(Inbound {
            tag: "http-in".to_string(),
            protocol: "http".to_string(),
            listen: listen.host.clone(),
            port: listen.http_port,
            settings: None,
            sniffing: None,
        });
    }

    list
}

/// Add the `stats`, `metrics` and `policy` blocks
pub fn apply_stats(doc: &mut RayDocument, common: &RayCommonConfig) {
    let port = common.stats_port.get().unwrap_or_else(|| {
        log::warn!("stats_port is not set, using {}", DEFAULT_STATS_PORT);
        DEFAULT_STATS_PORT
    });

    doc.stats = Some(Stats::default());
    doc.metrics = Some(Metrics {
        listen: format!("127.0.0.1:{}", port),
    });
    doc.policy = Some(Policy {
        system: SystemPolicy {
            stats_inbound_uplink: true,
            stats_inbound_downlink: true,
            stats_outbound_uplink: true,
            stats_outbound_downlink: true,
        },
    });
}

/// Minimal document routing a local socks port through one server
pub fn speed_test_document(
    server: &ServerRow,
    common: &RayCommonConfig,
    data_dir: Option<&Path>,
    port: u16,
) -> Result<RayDocument, CompileError> {
    Ok(RayDocument {
        log: log_conf(common, data_dir, "xray_speed_test"),
        inbounds: vec![Inbound {
            tag: "socks-test-in".to_string(),
            protocol: "socks".to_string(),
            listen: "127.0.0.1".to_string(),
            port,
            settings: None,
            sniffing: None,
        }],
        outbounds: vec![compile_outbound(server)?],
        routing: None,
        dns: None,
        stats: None,
        metrics: None,
        policy: None,
    })
}

/// `<host with non-word chars replaced by _>-<id>.json`
pub fn speed_test_filename(server: &ServerRow) -> String {
    let host: String = server
        .host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-{}.json", host, server.id)
}
