//! Stream transport blocks and the TLS / REALITY security layers.

use serde::Serialize;
use serde_json::Value;

use crate::util::split_lines;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsSettings {
    /// Certificate verification is never disabled
    #[serde(rename = "allowInsecure")]
    pub allow_insecure: bool,
    #[serde(rename = "serverName", skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpn: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// `alpn` is comma-separated, e.g. `h2, http/1.1`
pub fn tls_settings(host: &str, alpn: &str, fp: &str) -> TlsSettings {
    TlsSettings {
        allow_insecure: false,
        server_name: non_empty(host),
        alpn: if alpn.is_empty() {
            None
        } else {
            Some(split_lines(alpn, ','))
        },
        fingerprint: non_empty(fp),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealitySettings {
    pub show: bool,
    #[serde(rename = "serverName")]
    pub server_name: String,
    pub fingerprint: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "shortId")]
    pub short_id: String,
    #[serde(rename = "spiderX")]
    pub spider_x: String,
}

pub fn reality_settings(server_name: &str, fp: &str, pbk: &str, sid: &str, spx: &str) -> RealitySettings {
    RealitySettings {
        show: false,
        server_name: server_name.to_string(),
        fingerprint: fp.to_string(),
        public_key: pbk.to_string(),
        short_id: sid.to_string(),
        spider_x: spx.to_string(),
    }
}

/// raw transport with HTTP/1.1 header camouflage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpSettings {
    pub header: HttpHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpHeader {
    #[serde(rename = "type")]
    pub header_type: String,
    pub request: HttpRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub version: String,
    pub method: String,
    pub path: Vec<String>,
    pub headers: HttpRequestHeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestHeaders {
    #[serde(rename = "Host")]
    pub host: Vec<String>,
    #[serde(rename = "User-Agent")]
    pub user_agent: Vec<String>,
    #[serde(rename = "Accept-Encoding")]
    pub accept_encoding: Vec<String>,
    #[serde(rename = "Connection")]
    pub connection: Vec<String>,
    #[serde(rename = "Pragma")]
    pub pragma: String,
}

const CAMOUFLAGE_HOSTS: [&str; 2] = ["www.baidu.com", "www.bing.com"];
const CAMOUFLAGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

/// Static request header; none of it is user-editable
pub fn http_camouflage() -> TcpSettings {
    TcpSettings {
        header: HttpHeader {
            header_type: "http".to_string(),
            request: HttpRequest {
                version: "1.1".to_string(),
                method: "GET".to_string(),
                path: vec!["/".to_string()],
                headers: HttpRequestHeaders {
                    host: CAMOUFLAGE_HOSTS.iter().map(|h| h.to_string()).collect(),
                    user_agent: vec![CAMOUFLAGE_USER_AGENT.to_string()],
                    accept_encoding: vec!["gzip, deflate".to_string()],
                    connection: vec!["keep-alive".to_string()],
                    pragma: "no-cache".to_string(),
                },
            },
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KcpSettings {
    pub mtu: u32,
    pub tti: u32,
    #[serde(rename = "uplinkCapacity")]
    pub uplink_capacity: u32,
    #[serde(rename = "downlinkCapacity")]
    pub downlink_capacity: u32,
    pub congestion: bool,
    #[serde(rename = "readBufferSize")]
    pub read_buffer_size: u32,
    #[serde(rename = "writeBufferSize")]
    pub write_buffer_size: u32,
    pub header: KcpHeader,
    pub seed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KcpHeader {
    #[serde(rename = "type")]
    pub header_type: String,
    pub domain: String,
}

/// mKCP with fixed tuning; `seed` comes from the row's path field
pub fn kcp_settings(header_type: &str, host: &str, seed: &str) -> KcpSettings {
    KcpSettings {
        mtu: 1350,
        tti: 50,
        uplink_capacity: 20,
        downlink_capacity: 100,
        congestion: false,
        read_buffer_size: 2,
        write_buffer_size: 2,
        header: KcpHeader {
            header_type: or_default(header_type, "none"),
            domain: host.to_string(),
        },
        seed: seed.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcSettings {
    pub authority: String,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "multiMode")]
    pub multi_mode: bool,
    pub idle_timeout: u32,
    pub permit_without_stream: bool,
    pub initial_windows_size: u32,
}

pub fn grpc_settings(authority: &str, service_name: &str, multi_mode: bool) -> GrpcSettings {
    GrpcSettings {
        authority: authority.to_string(),
        service_name: service_name.to_string(),
        multi_mode,
        idle_timeout: 60,
        permit_without_stream: false,
        initial_windows_size: 0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsSettings {
    pub host: String,
    pub path: String,
    pub headers: WsHeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsHeaders {
    #[serde(rename = "Host")]
    pub host: String,
}

/// The `Host` header falls back to the server address
pub fn ws_settings(add: &str, host: &str, path: &str) -> WsSettings {
    WsSettings {
        host: add.to_string(),
        path: path.to_string(),
        headers: WsHeaders {
            host: or_default(host, add),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpSettings {
    pub path: String,
    pub host: Vec<String>,
}

pub fn http_settings(host: &str, path: &str) -> HttpSettings {
    HttpSettings {
        path: path.to_string(),
        host: vec![host.to_string()],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpUpgradeSettings {
    pub path: String,
    pub host: String,
}

pub fn httpupgrade_settings(host: &str, path: &str) -> HttpUpgradeSettings {
    HttpUpgradeSettings {
        path: path.to_string(),
        host: host.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XhttpSettings {
    pub host: String,
    pub path: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// `extra` is passed through only when it holds a JSON object
pub fn xhttp_settings(host: &str, path: &str, mode: &str, extra: &str) -> XhttpSettings {
    let extra = match extra.trim() {
        "" => None,
        text => match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) => {
                log::warn!("Ignoring xhttp extra that is not a JSON object");
                None
            }
            Err(e) => {
                log::warn!("Ignoring malformed xhttp extra: {}", e);
                None
            }
        },
    };

    XhttpSettings {
        host: host.to_string(),
        path: path.to_string(),
        mode: or_default(mode, "auto"),
        extra,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tls_omits_empty_fields() {
        let value = serde_json::to_value(tls_settings("", "", "")).unwrap();
        assert_eq!(value, json!({"allowInsecure": false}));

        let tls = tls_settings("sni.example", "h2, http/1.1", "chrome");
        assert_eq!(tls.alpn, Some(vec!["h2".to_string(), "http/1.1".to_string()]));
        assert_eq!(tls.server_name.as_deref(), Some("sni.example"));
    }

    #[test]
    fn test_ws_host_header_falls_back_to_address() {
        let ws = ws_settings("1.2.3.4", "", "/ws");
        assert_eq!(ws.headers.host, "1.2.3.4");
        assert_eq!(ws.host, "1.2.3.4");
    }

    #[test]
    fn test_grpc_uses_snake_case_tuning_keys() {
        let value = serde_json::to_value(grpc_settings("a", "svc", true)).unwrap();
        assert_eq!(value["serviceName"], "svc");
        assert_eq!(value["multiMode"], true);
        assert_eq!(value["idle_timeout"], 60);
        assert_eq!(value["permit_without_stream"], false);
    }

    #[test]
    fn test_kcp_defaults() {
        let kcp = kcp_settings("", "h", "seed");
        assert_eq!(kcp.header.header_type, "none");
        assert_eq!(kcp.mtu, 1350);
        assert_eq!(kcp.seed, "seed");
    }

    #[test]
    fn test_xhttp_extra_passthrough() {
        let x = xhttp_settings("h", "/p", "", r#"{"xPaddingBytes":"100-1000"}"#);
        assert_eq!(x.mode, "auto");
        assert_eq!(x.extra, Some(json!({"xPaddingBytes": "100-1000"})));

        assert_eq!(xhttp_settings("h", "/p", "packet-up", "[1]").extra, None);
        assert_eq!(xhttp_settings("h", "/p", "", "{oops").extra, None);
    }

    #[test]
    fn test_camouflage_header_shape() {
        let value = serde_json::to_value(http_camouflage()).unwrap();
        assert_eq!(value["header"]["type"], "http");
        assert_eq!(value["header"]["request"]["headers"]["Pragma"], "no-cache");
        assert_eq!(value["header"]["request"]["headers"]["Host"][1], "www.bing.com");
    }
}
