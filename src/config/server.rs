use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hydrate::Hydrate;
use super::port::Port;
use crate::error::CompileError;
use crate::share::fingerprint::{hash_json, Fingerprint};
use crate::util::generate_unique_id;

/// One configured remote endpoint as persisted in `server.json`.
///
/// `data` is kept as raw JSON so that a list holding a foreign protocol still
/// loads; it is checked against the closed [`ServerData`] union on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRow {
    pub id: String,
    /// Postscript / display name
    pub ps: String,
    /// 1 when this is the active server, 0 otherwise
    pub on: u8,
    /// `address:port` label
    pub host: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Security label such as `auto+tls+ws`
    pub scy: String,
    pub hash: String,
    pub data: Value,
}

impl Default for ServerRow {
    fn default() -> Self {
        Self {
            id: String::new(),
            ps: String::new(),
            on: 0,
            host: String::new(),
            kind: String::new(),
            scy: String::new(),
            hash: String::new(),
            data: Value::Object(Default::default()),
        }
    }
}

impl Hydrate for ServerRow {
    const KIND: &'static str = "server";
}

impl Fingerprint for ServerRow {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }

    fn content_hash(&self) -> String {
        hash_json(&self.data)
    }
}

impl ServerRow {
    /// Build a new, inactive row with a fresh id and fingerprint
    pub fn new(ps: impl Into<String>, data: ServerData) -> Self {
        let value = data.to_value();
        Self {
            id: generate_unique_id(),
            ps: ps.into(),
            on: 0,
            host: data.host_label(),
            kind: data.kind().to_string(),
            scy: data.scy_label(),
            hash: hash_json(&value),
            data: value,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on == 1
    }

    /// Resolve `type` + `data` into the typed protocol payload
    pub fn protocol(&self) -> Result<ServerData, CompileError> {
        ServerData::from_parts(&self.kind, self.data.clone())
    }
}

/// Closed set of supported server protocols
#[derive(Debug, Clone, PartialEq)]
pub enum ServerData {
    Vmess(VmessRow),
    Vless(VlessRow),
    Shadowsocks(SsRow),
    Trojan(TrojanRow),
}

impl ServerData {
    pub fn from_parts(kind: &str, data: Value) -> Result<Self, CompileError> {
        fn parse<T: Hydrate>(kind: &'static str, data: Value) -> Result<T, CompileError> {
            T::hydrate(data).map_err(|source| CompileError::InvalidData { kind, source })
        }

        match kind {
            "vmess" => Ok(ServerData::Vmess(parse("vmess", data)?)),
            "vless" => Ok(ServerData::Vless(parse("vless", data)?)),
            "ss" => Ok(ServerData::Shadowsocks(parse("ss", data)?)),
            "trojan" => Ok(ServerData::Trojan(parse("trojan", data)?)),
            other => Err(CompileError::UnknownType(other.to_string())),
        }
    }

    /// The `type` tag used in storage and share links
    pub fn kind(&self) -> &'static str {
        match self {
            ServerData::Vmess(_) => "vmess",
            ServerData::Vless(_) => "vless",
            ServerData::Shadowsocks(_) => "ss",
            ServerData::Trojan(_) => "trojan",
        }
    }

    pub fn to_value(&self) -> Value {
        let value = match self {
            ServerData::Vmess(row) => serde_json::to_value(row),
            ServerData::Vless(row) => serde_json::to_value(row),
            ServerData::Shadowsocks(row) => serde_json::to_value(row),
            ServerData::Trojan(row) => serde_json::to_value(row),
        };
        value.unwrap_or_else(|e| {
            log::error!("Failed to serialize server data: {}", e);
            Value::Object(Default::default())
        })
    }

    pub fn host_label(&self) -> String {
        let (add, port) = match self {
            ServerData::Vmess(row) => (&row.add, row.port),
            ServerData::Vless(row) => (&row.add, row.port),
            ServerData::Shadowsocks(row) => (&row.add, row.port),
            ServerData::Trojan(row) => (&row.add, row.port),
        };
        format!("{}:{}", add, port)
    }

    pub fn scy_label(&self) -> String {
        match self {
            ServerData::Vmess(row) => {
                let mut scy = row.scy.clone();
                if row.tls {
                    scy.push_str("+tls");
                }
                append_net(&mut scy, &row.net);
                scy
            }
            ServerData::Vless(row) => {
                let mut scy = row.scy.clone();
                append_net(&mut scy, &row.net);
                scy
            }
            ServerData::Shadowsocks(row) => row.scy.clone(),
            ServerData::Trojan(row) => {
                let mut scy = row.scy.clone();
                append_net(&mut scy, &row.net);
                scy
            }
        }
    }
}

fn append_net(scy: &mut String, net: &str) {
    if !net.is_empty() {
        scy.push('+');
        scy.push_str(net);
    }
}

/// Stream transport selected by a row's `net` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Raw,
    Kcp,
    Ws,
    Http,
    Grpc,
    HttpUpgrade,
    Xhttp,
}

impl Network {
    /// `tcp` is the legacy name of `raw`
    pub fn parse(net: &str) -> Option<Self> {
        match net {
            "raw" | "tcp" => Some(Network::Raw),
            "kcp" => Some(Network::Kcp),
            "ws" => Some(Network::Ws),
            "http" => Some(Network::Http),
            "grpc" => Some(Network::Grpc),
            "httpupgrade" => Some(Network::HttpUpgrade),
            "xhttp" => Some(Network::Xhttp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Raw => "raw",
            Network::Kcp => "kcp",
            Network::Ws => "ws",
            Network::Http => "http",
            Network::Grpc => "grpc",
            Network::HttpUpgrade => "httpupgrade",
            Network::Xhttp => "xhttp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmessRow {
    pub add: String,
    pub port: Port,
    pub id: String,
    /// alterId
    pub aid: String,
    /// raw / kcp / ws / http / grpc / httpupgrade
    pub net: String,
    /// Cipher: none / auto / zero / aes-128-gcm / chacha20-poly1305
    pub scy: String,
    pub host: String,
    /// Path, gRPC serviceName or mKCP seed depending on `net`
    pub path: String,
    /// Header camouflage type for raw and kcp
    #[serde(rename = "type")]
    pub header_type: String,
    /// gRPC mode: gun / multi
    pub mode: String,
    pub tls: bool,
    pub alpn: String,
    pub fp: String,
}

impl Hydrate for VmessRow {
    const KIND: &'static str = "vmess";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlessRow {
    pub add: String,
    pub port: Port,
    pub id: String,
    /// raw / ws / grpc / xhttp
    pub net: String,
    /// none / tls / reality
    pub scy: String,
    pub host: String,
    /// Path for ws/xhttp, serviceName for grpc, SNI for reality
    pub path: String,
    pub mode: String,
    /// XHTTP extra parameters as JSON text
    pub extra: String,
    pub alpn: String,
    pub fp: String,
    pub flow: String,
    pub pbk: String,
    pub sid: String,
    pub spx: String,
}

impl Hydrate for VlessRow {
    const KIND: &'static str = "vless";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsRow {
    pub add: String,
    pub port: Port,
    pub pwd: String,
    /// Cipher method
    pub scy: String,
}

impl Hydrate for SsRow {
    const KIND: &'static str = "ss";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrojanRow {
    pub add: String,
    pub port: Port,
    pub pwd: String,
    /// ws / grpc
    pub net: String,
    /// Always tls
    pub scy: String,
    pub host: String,
    pub path: String,
}

impl Hydrate for TrojanRow {
    const KIND: &'static str = "trojan";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_type_is_an_error() {
        let row = ServerRow::hydrate(json!({"type": "wireguard", "data": {}})).unwrap();
        assert!(matches!(row.protocol(), Err(CompileError::UnknownType(t)) if t == "wireguard"));
    }

    #[test]
    fn test_partial_data_is_hydrated() {
        let row = ServerRow::hydrate(json!({
            "type": "vless",
            "data": {"add": "1.2.3.4", "port": 443, "id": "uuid"}
        }))
        .unwrap();
        match row.protocol().unwrap() {
            ServerData::Vless(v) => {
                assert_eq!(v.add, "1.2.3.4");
                assert_eq!(v.port.get(), Some(443));
                assert_eq!(v.flow, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_row_labels_and_hash() {
        let data = ServerData::Vmess(VmessRow {
            add: "example.com".to_string(),
            port: Port::new(8080),
            scy: "auto".to_string(),
            net: "ws".to_string(),
            tls: true,
            ..Default::default()
        });
        let row = ServerRow::new("demo", data);
        assert_eq!(row.kind, "vmess");
        assert_eq!(row.host, "example.com:8080");
        assert_eq!(row.scy, "auto+tls+ws");
        assert_eq!(row.on, 0);
        assert_eq!(row.hash, row.content_hash());
    }

    #[test]
    fn test_network_aliases() {
        assert_eq!(Network::parse("tcp"), Some(Network::Raw));
        assert_eq!(Network::parse("quic"), None);
        assert_eq!(Network::HttpUpgrade.as_str(), "httpupgrade");
    }
}
