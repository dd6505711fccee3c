use super::transport::{
    grpc_settings, http_camouflage, http_settings, httpupgrade_settings, kcp_settings,
    reality_settings, tls_settings, ws_settings, xhttp_settings,
};
use super::types::{
    Mux, Outbound, OutboundSettings, ServerEndpoint, StreamSettings, VnextServer, VnextUser,
};
use crate::config::ray_common::RayCommonConfig;
use crate::config::server::{Network, ServerData, ServerRow, SsRow, TrojanRow, VlessRow, VmessRow};
use crate::error::CompileError;

pub const PROXY_TAG: &str = "proxy";
pub const DIRECT_TAG: &str = "direct";
pub const REJECT_TAG: &str = "reject";

/// Compile a stored server row into the single `proxy` outbound.
///
/// A row whose `type` is outside the supported set is logged and returned as an
/// error; no partial outbound is produced.
pub fn compile_outbound(row: &ServerRow) -> Result<Outbound, CompileError> {
    match row.protocol() {
        Ok(data) => Ok(compile_server_data(&data)),
        Err(e) => {
            log::error!("Cannot compile server {:?} (id {}): {}", row.ps, row.id, e);
            Err(e)
        }
    }
}

pub fn compile_server_data(data: &ServerData) -> Outbound {
    match data {
        ServerData::Vmess(row) => vmess_outbound(row),
        ServerData::Vless(row) => vless_outbound(row),
        ServerData::Shadowsocks(row) => ss_outbound(row),
        ServerData::Trojan(row) => trojan_outbound(row),
    }
}

/// `[proxy (+mux), direct, reject]`
pub fn compile_outbounds(row: &ServerRow, common: &RayCommonConfig) -> Result<Vec<Outbound>, CompileError> {
    let mut proxy = compile_outbound(row)?;
    proxy.mux = Some(Mux {
        enabled: common.outbounds_mux,
        concurrency: common.outbounds_concurrency,
    });

    Ok(vec![
        proxy,
        Outbound::bare(DIRECT_TAG, "freedom"),
        Outbound::bare(REJECT_TAG, "blackhole"),
    ])
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn vmess_outbound(row: &VmessRow) -> Outbound {
    let mut stream = StreamSettings {
        network: row.net.clone(),
        ..Default::default()
    };

    if row.tls {
        stream.security = Some("tls".to_string());
        stream.tls_settings = Some(tls_settings(&row.host, &row.alpn, &row.fp));
    }

    match Network::parse(&row.net) {
        Some(Network::Raw) if row.header_type == "http" => {
            stream.tcp_settings = Some(http_camouflage());
        }
        Some(Network::Kcp) => {
            stream.kcp_settings = Some(kcp_settings(&row.header_type, &row.host, &row.path));
        }
        Some(Network::Grpc) => {
            stream.grpc_settings = Some(grpc_settings(&row.host, &row.path, row.mode == "multi"));
        }
        Some(Network::Ws) => {
            stream.ws_settings = Some(ws_settings(&row.add, &row.host, &row.path));
        }
        Some(Network::Http) => {
            stream.http_settings = Some(http_settings(&row.host, &row.path));
        }
        Some(Network::HttpUpgrade) => {
            stream.httpupgrade_settings = Some(httpupgrade_settings(&row.host, &row.path));
        }
        _ => {}
    }

    Outbound {
        tag: PROXY_TAG.to_string(),
        protocol: "vmess".to_string(),
        settings: Some(OutboundSettings::Vnext {
            vnext: vec![VnextServer {
                address: row.add.clone(),
                port: row.port,
                users: vec![VnextUser {
                    id: row.id.clone(),
                    alter_id: Some(or_default(&row.aid, "0")),
                    security: Some(or_default(&row.scy, "auto")),
                    encryption: None,
                    flow: None,
                }],
            }],
        }),
        stream_settings: Some(stream),
        mux: None,
    }
}

fn vless_outbound(row: &VlessRow) -> Outbound {
    let mut stream = StreamSettings {
        network: row.net.clone(),
        security: Some(or_default(&row.scy, "none")),
        ..Default::default()
    };

    if !row.scy.is_empty() && row.scy != "none" {
        stream.tls_settings = Some(tls_settings(&row.host, &row.alpn, &row.fp));
    }
    if row.scy == "reality" {
        stream.reality_settings = Some(reality_settings(&row.path, &row.fp, &row.pbk, &row.sid, &row.spx));
    }

    match Network::parse(&row.net) {
        Some(Network::Ws) => {
            stream.ws_settings = Some(ws_settings(&row.add, &row.host, &row.path));
        }
        Some(Network::Grpc) => {
            stream.grpc_settings = Some(grpc_settings(&row.host, &row.path, row.mode == "multi"));
        }
        Some(Network::Xhttp) => {
            stream.xhttp_settings = Some(xhttp_settings(&row.host, &row.path, &row.mode, &row.extra));
        }
        _ => {}
    }

    let flow = if row.flow.is_empty() {
        None
    } else {
        Some(row.flow.clone())
    };

    Outbound {
        tag: PROXY_TAG.to_string(),
        protocol: "vless".to_string(),
        settings: Some(OutboundSettings::Vnext {
            vnext: vec![VnextServer {
                address: row.add.clone(),
                port: row.port,
                users: vec![VnextUser {
                    id: row.id.clone(),
                    alter_id: None,
                    security: None,
                    encryption: Some("none".to_string()),
                    flow,
                }],
            }],
        }),
        stream_settings: Some(stream),
        mux: None,
    }
}

fn ss_outbound(row: &SsRow) -> Outbound {
    Outbound {
        tag: PROXY_TAG.to_string(),
        protocol: "shadowsocks".to_string(),
        settings: Some(OutboundSettings::Servers {
            servers: vec![ServerEndpoint {
                address: row.add.clone(),
                port: row.port,
                method: Some(row.scy.clone()),
                password: row.pwd.clone(),
            }],
        }),
        stream_settings: None,
        mux: None,
    }
}

fn trojan_outbound(row: &TrojanRow) -> Outbound {
    let mut stream = StreamSettings {
        network: row.net.clone(),
        security: Some("tls".to_string()),
        ..Default::default()
    };

    match Network::parse(&row.net) {
        Some(Network::Ws) => {
            stream.ws_settings = Some(ws_settings(&row.add, &row.host, &row.path));
        }
        Some(Network::Grpc) => {
            stream.grpc_settings = Some(grpc_settings(&row.host, &row.path, false));
        }
        _ => {}
    }

    Outbound {
        tag: PROXY_TAG.to_string(),
        protocol: "trojan".to_string(),
        settings: Some(OutboundSettings::Servers {
            servers: vec![ServerEndpoint {
                address: row.add.clone(),
                port: row.port,
                method: None,
                password: row.pwd.clone(),
            }],
        }),
        stream_settings: Some(stream),
        mux: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::hydrate::Hydrate;
    use crate::config::port::Port;
    use serde_json::json;

    fn row(value: serde_json::Value) -> ServerRow {
        ServerRow::hydrate(value).unwrap()
    }

    #[test]
    fn test_vless_reality_grpc() {
        let outbound = compile_outbound(&row(json!({
            "type": "vless",
            "data": {
                "add": "1.2.3.4", "port": 443, "id": "uuid", "scy": "reality",
                "net": "grpc", "path": "svc", "fp": "chrome", "pbk": "key", "sid": "01"
            }
        })))
        .unwrap();

        assert_eq!(outbound.tag, "proxy");
        assert_eq!(outbound.protocol, "vless");
        let stream = outbound.stream_settings.unwrap();
        assert_eq!(stream.security.as_deref(), Some("reality"));
        let reality = stream.reality_settings.unwrap();
        assert_eq!(reality.public_key, "key");
        assert_eq!(reality.server_name, "svc");
        assert_eq!(reality.short_id, "01");
        assert_eq!(stream.grpc_settings.unwrap().service_name, "svc");
    }

    #[test]
    fn test_unknown_type_is_error() {
        let result = compile_outbound(&row(json!({"type": "wireguard", "data": {}})));
        assert!(matches!(result, Err(CompileError::UnknownType(t)) if t == "wireguard"));
    }

    #[test]
    fn test_vmess_defaults_and_shape() {
        let outbound = compile_outbound(&row(json!({
            "type": "vmess",
            "data": {"add": "v.example", "port": 8443, "id": "id", "net": "ws", "path": "/ray", "tls": true}
        })))
        .unwrap();

        let value = serde_json::to_value(&outbound).unwrap();
        let user = &value["settings"]["vnext"][0]["users"][0];
        assert_eq!(user["alterId"], "0");
        assert_eq!(user["security"], "auto");
        assert_eq!(value["settings"]["vnext"][0]["port"], 8443);
        assert_eq!(value["streamSettings"]["network"], "ws");
        assert_eq!(value["streamSettings"]["security"], "tls");
        assert_eq!(value["streamSettings"]["tlsSettings"]["allowInsecure"], false);
        assert_eq!(value["streamSettings"]["wsSettings"]["headers"]["Host"], "v.example");
        assert!(value.get("mux").is_none());
    }

    #[test]
    fn test_vmess_raw_http_camouflage() {
        let outbound = compile_server_data(&ServerData::Vmess(VmessRow {
            net: "raw".to_string(),
            header_type: "http".to_string(),
            ..Default::default()
        }));
        let stream = outbound.stream_settings.unwrap();
        assert!(stream.tcp_settings.is_some());
        assert!(stream.tls_settings.is_none());
        assert!(stream.security.is_none());
    }

    #[test]
    fn test_vless_without_security() {
        let outbound = compile_server_data(&ServerData::Vless(VlessRow {
            add: "a".to_string(),
            port: Port::new(80),
            net: "xhttp".to_string(),
            ..Default::default()
        }));
        let value = serde_json::to_value(&outbound).unwrap();
        assert_eq!(value["streamSettings"]["security"], "none");
        assert!(value["streamSettings"].get("tlsSettings").is_none());
        assert_eq!(value["streamSettings"]["xhttpSettings"]["mode"], "auto");
        assert_eq!(value["settings"]["vnext"][0]["users"][0], json!({"id": "", "encryption": "none"}));
    }

    #[test]
    fn test_vless_xhttp_extra_object_is_passed_through() {
        let outbound = compile_outbound(&row(json!({
            "type": "vless",
            "data": {
                "add": "x.example", "port": 443, "id": "uuid", "scy": "tls", "net": "xhttp",
                "host": "cdn.example", "path": "/up", "mode": "stream-one",
                "extra": "{\"xPaddingBytes\": \"100-1000\", \"noGRPCHeader\": true}"
            }
        })))
        .unwrap();

        let value = serde_json::to_value(&outbound).unwrap();
        let xhttp = &value["streamSettings"]["xhttpSettings"];
        assert_eq!(xhttp["mode"], "stream-one");
        assert_eq!(xhttp["extra"], json!({"xPaddingBytes": "100-1000", "noGRPCHeader": true}));
    }

    #[test]
    fn test_vless_xhttp_non_object_extra_is_dropped() {
        for extra in ["[1, 2]", "\"text\"", "{broken"] {
            let outbound = compile_server_data(&ServerData::Vless(VlessRow {
                add: "x.example".to_string(),
                port: Port::new(443),
                net: "xhttp".to_string(),
                extra: extra.to_string(),
                ..Default::default()
            }));
            let value = serde_json::to_value(&outbound).unwrap();
            assert!(value["streamSettings"]["xhttpSettings"].get("extra").is_none(), "{}", extra);
        }
    }

    #[test]
    fn test_ss_has_no_stream_settings() {
        let value = serde_json::to_value(compile_server_data(&ServerData::Shadowsocks(SsRow {
            add: "s".to_string(),
            port: Port::unset(),
            pwd: "pw".to_string(),
            scy: "aes-128-gcm".to_string(),
        })))
        .unwrap();
        assert_eq!(
            value,
            json!({
                "tag": "proxy",
                "protocol": "shadowsocks",
                "settings": {"servers": [{"address": "s", "port": "", "method": "aes-128-gcm", "password": "pw"}]}
            })
        );
    }

    #[test]
    fn test_trojan_grpc_is_single_mode() {
        let outbound = compile_server_data(&ServerData::Trojan(TrojanRow {
            net: "grpc".to_string(),
            path: "svc".to_string(),
            ..Default::default()
        }));
        let stream = outbound.stream_settings.unwrap();
        assert_eq!(stream.security.as_deref(), Some("tls"));
        assert!(!stream.grpc_settings.unwrap().multi_mode);
    }

    #[test]
    fn test_outbound_list_appends_direct_and_reject() {
        let common = RayCommonConfig {
            outbounds_mux: true,
            outbounds_concurrency: 4,
            ..Default::default()
        };
        let list = compile_outbounds(&row(json!({"type": "ss", "data": {"add": "s"}})), &common).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].mux, Some(Mux { enabled: true, concurrency: 4 }));
        assert_eq!(list[1], Outbound::bare("direct", "freedom"));
        assert_eq!(list[2].protocol, "blackhole");
        assert!(list[1].mux.is_none());
    }
}
