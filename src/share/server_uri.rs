//! Server share links: `vmess://`, `vless://`, `ss://` and `trojan://`.
//!
//! Two forms are understood for every scheme. The URL form carries the
//! credential in the user-info part and everything else in the query string.
//! The base64 form wraps a flat JSON object using the stored field names.
//! Export emits the URL form by default.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::record_uri::ImportSummary;
use super::{decode_base64, encode_base64, safe_decode_uri};
use crate::config::port::Port;
use crate::config::server::{Network, ServerData, ServerRow, SsRow, TrojanRow, VlessRow, VmessRow};
use crate::error::{HydrateError, ShareError};

/// Parse one share link into a fresh, inactive server row
pub fn uri_to_server_row(uri: &str) -> Result<ServerRow, ShareError> {
    let uri = uri.trim();
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| ShareError::UnsupportedScheme(uri.to_string()))?;

    let url_form = rest.split('#').next().unwrap_or_default().contains('@');

    let (ps, data) = match (scheme, url_form) {
        ("vmess", true) => vmess_from_url(uri)?,
        ("vmess", false) => vmess_from_json(rest)?,
        ("vless", true) => vless_from_url(uri)?,
        ("vless", false) => vless_from_json(rest)?,
        ("ss", true) => ss_from_url(uri)?,
        ("ss", false) => ss_from_json(rest)?,
        ("trojan", true) => trojan_from_url(uri)?,
        ("trojan", false) => trojan_from_json(rest)?,
        (other, _) => return Err(ShareError::UnsupportedScheme(other.to_string())),
    };

    Ok(ServerRow::new(ps, data))
}

/// Rows parsed from a batch of share links
#[derive(Debug, Clone)]
pub struct ServerImport {
    /// Newly imported rows first, then the existing list
    pub rows: Vec<ServerRow>,
    pub summary: ImportSummary,
}

/// Import one link per line, skipping rows whose hash is already known
pub fn import_servers(input: &str, existing: &[ServerRow]) -> ServerImport {
    let mut fresh: Vec<ServerRow> = Vec::new();
    let mut summary = ImportSummary::default();

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let row = match uri_to_server_row(line) {
            Ok(row) => row,
            Err(e) => {
                log::warn!("Failed to parse share link {:?}: {}", line, e);
                summary.failed += 1;
                continue;
            }
        };

        let known = existing.iter().chain(fresh.iter()).any(|s| s.hash == row.hash);
        if known {
            summary.existing += 1;
        } else {
            summary.imported += 1;
            fresh.push(row);
        }
    }

    log::info!("server import: {}", summary);
    fresh.extend(existing.iter().cloned());
    ServerImport {
        rows: fresh,
        summary,
    }
}

struct Link {
    url: Url,
    params: HashMap<String, String>,
}

impl Link {
    fn parse(uri: &str) -> Result<Self, ShareError> {
        let url = Url::parse(uri)?;
        let mut params = HashMap::new();
        for (key, value) in url.query_pairs() {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Ok(Self { url, params })
    }

    /// First non-empty value among `keys`
    fn get(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.params.get(*k))
            .find(|v| !v.is_empty())
            .cloned()
    }

    fn get_or(&self, keys: &[&str], default: &str) -> String {
        self.get(keys).unwrap_or_else(|| default.to_string())
    }

    fn host(&self) -> Result<String, ShareError> {
        match self.url.host_str() {
            Some(host) if !host.is_empty() => Ok(host.trim_matches(['[', ']']).to_string()),
            _ => Err(ShareError::MissingField("host")),
        }
    }

    fn port(&self) -> Port {
        self.url.port().map(Port::new).unwrap_or_default()
    }

    fn username(&self) -> String {
        safe_decode_uri(self.url.username())
    }

    fn ps(&self) -> String {
        self.url
            .fragment()
            .map(|f| safe_decode_uri(f.trim()))
            .unwrap_or_default()
    }
}

/// `tcp` is stored as `raw`; unknown names pass through
fn normalize_net(net: String) -> String {
    match Network::parse(&net) {
        Some(network) => network.as_str().to_string(),
        None => net,
    }
}

fn vmess_from_url(uri: &str) -> Result<(String, ServerData), ShareError> {
    let link = Link::parse(uri)?;
    let row = VmessRow {
        add: link.host()?,
        port: link.port(),
        id: link.username(),
        aid: link.get_or(&["aid"], "0"),
        net: normalize_net(link.get_or(&["net", "type"], "raw")),
        scy: link.get_or(&["scy", "security", "enc", "encryption"], "auto"),
        host: link.get_or(&["host"], ""),
        path: link.get_or(&["path", "sni", "serviceName", "seed"], ""),
        header_type: link.get_or(&["type", "headerType"], ""),
        mode: link.get_or(&["mode"], ""),
        tls: link.get(&["tls"]).as_deref() == Some("tls")
            || link.get(&["security"]).as_deref() == Some("tls"),
        alpn: link.get_or(&["alpn"], ""),
        fp: link.get_or(&["fp"], "chrome"),
    };
    Ok((link.ps(), ServerData::Vmess(row)))
}

fn vless_from_url(uri: &str) -> Result<(String, ServerData), ShareError> {
    let link = Link::parse(uri)?;
    let extra = match link.get(&["extra"]) {
        Some(raw) => decode_base64(&raw).unwrap_or_else(|e| {
            log::warn!("Failed to decode vless extra: {}", e);
            raw
        }),
        None => String::new(),
    };
    let row = VlessRow {
        add: link.host()?,
        port: link.port(),
        id: link.username(),
        net: normalize_net(link.get_or(&["net", "type"], "raw")),
        scy: link.get_or(&["scy", "security"], "none"),
        host: link.get_or(&["host"], ""),
        path: link.get_or(&["path", "sni", "serviceName"], ""),
        mode: link.get_or(&["mode"], ""),
        extra,
        alpn: link.get_or(&["alpn"], ""),
        fp: link.get_or(&["fp"], "chrome"),
        flow: link.get_or(&["flow"], ""),
        pbk: link.get_or(&["pbk"], ""),
        sid: link.get_or(&["sid"], ""),
        spx: link.get_or(&["spx"], ""),
    };
    Ok((link.ps(), ServerData::Vless(row)))
}

/// SIP002: the user-info is base64 of `method:password`
fn ss_from_url(uri: &str) -> Result<(String, ServerData), ShareError> {
    let link = Link::parse(uri)?;
    let user = link.username();
    let credential = decode_base64(&user).unwrap_or(user);
    let (method, password) = credential.split_once(':').unwrap_or((credential.as_str(), ""));
    let row = SsRow {
        add: link.host()?,
        port: link.port(),
        pwd: password.to_string(),
        scy: method.to_string(),
    };
    Ok((link.ps(), ServerData::Shadowsocks(row)))
}

fn trojan_from_url(uri: &str) -> Result<(String, ServerData), ShareError> {
    let link = Link::parse(uri)?;
    let row = TrojanRow {
        add: link.host()?,
        port: link.port(),
        pwd: link.username(),
        net: normalize_net(link.get_or(&["net", "type"], "")),
        scy: "tls".to_string(),
        host: link.get_or(&["host"], ""),
        path: link.get_or(&["path", "sni", "serviceName"], ""),
    };
    Ok((link.ps(), ServerData::Trojan(row)))
}

struct JsonLink(Map<String, Value>);

impl JsonLink {
    fn parse(body: &str) -> Result<Self, ShareError> {
        let body = body.split('#').next().unwrap_or_default();
        match serde_json::from_str(&decode_base64(body)?)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(HydrateError::NotAnObject("share link").into()),
        }
    }

    fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => safe_decode_uri(s),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(true)) => "true".to_string(),
            _ => String::new(),
        }
    }

    fn text_or(&self, key: &str, default: &str) -> String {
        let value = self.text(key);
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    }

    fn port(&self) -> Port {
        let port = match self.0.get("port") {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
            _ => None,
        };
        port.map(Port::new).unwrap_or_default()
    }
}

fn vmess_from_json(body: &str) -> Result<(String, ServerData), ShareError> {
    let d = JsonLink::parse(body)?;
    let row = VmessRow {
        add: d.text("add"),
        port: d.port(),
        id: d.text("id"),
        aid: d.text_or("aid", "0"),
        net: normalize_net(d.text_or("net", "raw")),
        scy: d.text_or("scy", "auto"),
        host: d.text("host"),
        path: d.text("path"),
        header_type: d.text("type"),
        mode: d.text("mode"),
        tls: d.text("tls") == "tls",
        alpn: d.text("alpn"),
        fp: d.text_or("fp", "chrome"),
    };
    Ok((d.text("ps"), ServerData::Vmess(row)))
}

fn vless_from_json(body: &str) -> Result<(String, ServerData), ShareError> {
    let d = JsonLink::parse(body)?;
    let row = VlessRow {
        add: d.text("add"),
        port: d.port(),
        id: d.text("id"),
        net: normalize_net(d.text_or("net", "raw")),
        scy: d.text_or("scy", "none"),
        host: d.text("host"),
        path: d.text("path"),
        mode: d.text("mode"),
        extra: d.text("extra"),
        alpn: d.text("alpn"),
        fp: d.text("fp"),
        flow: d.text("flow"),
        pbk: d.text("pbk"),
        sid: d.text("sid"),
        spx: d.text("spx"),
    };
    Ok((d.text("ps"), ServerData::Vless(row)))
}

fn ss_from_json(body: &str) -> Result<(String, ServerData), ShareError> {
    let d = JsonLink::parse(body)?;
    let row = SsRow {
        add: d.text("add"),
        port: d.port(),
        pwd: d.text("pwd"),
        scy: d.text("scy"),
    };
    Ok((d.text("ps"), ServerData::Shadowsocks(row)))
}

fn trojan_from_json(body: &str) -> Result<(String, ServerData), ShareError> {
    let d = JsonLink::parse(body)?;
    let row = TrojanRow {
        add: d.text("add"),
        port: d.port(),
        pwd: d.text("pwd"),
        net: normalize_net(d.text("net")),
        scy: d.text_or("scy", "tls"),
        host: d.text("host"),
        path: d.text("path"),
    };
    Ok((d.text("ps"), ServerData::Trojan(row)))
}

/// URL-form share link
pub fn server_to_uri(row: &ServerRow) -> Result<String, ShareError> {
    let uri = match row.protocol()? {
        ServerData::Vmess(d) => {
            let mut q = Query::new();
            q.set_if("aid", &d.aid);
            q.set_if("net", &d.net);
            q.set_if("scy", &d.scy);
            q.set_if("host", &d.host);
            q.set_if("path", &d.path);
            q.set_if("type", &d.header_type);
            q.set_if("mode", &d.mode);
            if d.tls {
                q.set("tls", "tls");
                q.set_if("alpn", &d.alpn);
                q.set_if("fp", &d.fp);
            }
            build_uri("vmess", &d.id, &d.add, d.port, q, &row.ps)
        }
        ServerData::Vless(d) => {
            let mut q = Query::new();
            q.set("encryption", "none");
            q.set("security", or_default(&d.scy, "none"));
            q.set("type", or_default(&d.net, "raw"));
            q.set_if("host", &d.host);
            q.set_if("path", &d.path);
            q.set_if("mode", &d.mode);
            if !d.extra.is_empty() {
                q.set("extra", &encode_base64(&d.extra));
            }
            q.set_if("alpn", &d.alpn);
            q.set_if("fp", &d.fp);
            q.set_if("flow", &d.flow);
            q.set_if("pbk", &d.pbk);
            q.set_if("sid", &d.sid);
            q.set_if("spx", &d.spx);
            build_uri("vless", &d.id, &d.add, d.port, q, &row.ps)
        }
        ServerData::Shadowsocks(d) => {
            let user = encode_base64(&format!("{}:{}", d.scy, d.pwd));
            build_uri("ss", &user, &d.add, d.port, Query::new(), &row.ps)
        }
        ServerData::Trojan(d) => {
            let mut q = Query::new();
            q.set("encryption", "none");
            q.set("security", "tls");
            q.set("type", or_default(&d.net, "grpc"));
            q.set_if("host", &d.host);
            if d.net == "grpc" {
                q.set_if("serviceName", &d.path);
            } else {
                q.set_if("path", &d.path);
            }
            build_uri("trojan", &d.pwd, &d.add, d.port, q, &row.ps)
        }
    };
    Ok(uri)
}

/// Base64-JSON share link. Falsy fields are left out.
pub fn server_to_base64_uri(row: &ServerRow) -> Result<String, ShareError> {
    let data = row.protocol()?;
    let mut map = Map::new();
    map.insert("ps".to_string(), Value::String(row.ps.clone()));

    let fields = match &data {
        ServerData::Vmess(d) => {
            map.insert("v".to_string(), Value::from(2));
            to_object(d)?
        }
        ServerData::Vless(d) => to_object(d)?,
        ServerData::Shadowsocks(d) => to_object(d)?,
        ServerData::Trojan(d) => to_object(d)?,
    };
    map.extend(fields);
    map.retain(|_, v| is_truthy(v));

    if let ServerData::Vmess(_) = data {
        if map.contains_key("tls") {
            map.insert("tls".to_string(), Value::from("tls"));
        } else {
            map.remove("alpn");
            map.remove("fp");
        }
    }

    let json = serde_json::to_string(&Value::Object(map))?;
    Ok(format!("{}://{}", data.kind(), encode_base64(&json)))
}

fn to_object<T: Serialize>(row: &T) -> Result<Map<String, Value>, ShareError> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        _ => Err(HydrateError::NotAnObject("server data").into()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

struct Query(url::form_urlencoded::Serializer<'static, String>, bool);

impl Query {
    fn new() -> Self {
        Self(url::form_urlencoded::Serializer::new(String::new()), false)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.0.append_pair(key, value);
        self.1 = true;
    }

    fn set_if(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.set(key, value);
        }
    }
}

fn build_uri(scheme: &str, user: &str, add: &str, port: Port, mut query: Query, ps: &str) -> String {
    let host = if add.contains(':') && !add.starts_with('[') {
        format!("[{}]", add)
    } else {
        add.to_string()
    };

    let mut uri = format!("{}://{}@{}", scheme, urlencoding::encode(user), host);
    if port.is_set() {
        uri.push_str(&format!(":{}", port));
    }
    if query.1 {
        uri.push('?');
        uri.push_str(&query.0.finish());
    }
    if !ps.is_empty() {
        uri.push('#');
        uri.push_str(&urlencoding::encode(ps));
    }
    uri
}
