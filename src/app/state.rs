use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::TcpListener;
use std::ops::Range;
use std::path::PathBuf;

use super::runner::run_bounded;
use crate::config::dns::{DnsModeRow, DnsServerRow, DnsServerType};
use crate::config::rule::{RuleModeRow, RuleRow, RuleType};
use crate::config::server::ServerRow;
use crate::config::{AppConfig, Doc, Store};
use crate::error::{ApplyError, ValidationError};
use crate::ray::{compile_document, speed_test_document, speed_test_filename, PacRules, RayDocument};
use crate::share::fingerprint::Fingerprint;
use crate::share::{self, ImportSummary, RecordKind, ShareRecord};
use crate::util::{process_domain, process_ip, process_port, split_lines};

/// Ports handed out to speed-test inbounds
pub const SPEED_TEST_PORTS: Range<u16> = 25000..35000;
const PORT_ATTEMPTS: usize = 100;

/// Make `id` the only active server. Nothing changes when `id` is unknown.
pub fn enable_server(servers: &mut [ServerRow], id: &str) -> bool {
    if !servers.iter().any(|s| s.id == id) {
        return false;
    }
    for server in servers.iter_mut() {
        server.on = u8::from(server.id == id);
    }
    true
}

pub fn delete_servers(servers: Vec<ServerRow>, ids: &[String]) -> Vec<ServerRow> {
    servers.into_iter().filter(|s| !ids.contains(&s.id)).collect()
}

/// Clean up an edited rule before it is stored
pub fn normalize_rule_row(mut row: RuleRow) -> Result<RuleRow, ValidationError> {
    row.name = row.name.trim().to_string();
    row.note = row.note.trim().to_string();
    if row.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    row.domain = process_domain(&row.domain);
    row.ip = process_ip(&row.ip);

    match row.rule_type {
        RuleType::Domain | RuleType::Ip => {
            if row.rule_type == RuleType::Domain {
                if row.domain.is_empty() {
                    return Err(ValidationError::EmptyDomain);
                }
                row.ip.clear();
            } else {
                if row.ip.is_empty() {
                    return Err(ValidationError::EmptyIp);
                }
                row.domain.clear();
            }
            row.port.clear();
            row.source_port.clear();
            row.network.clear();
            row.protocol.clear();
        }
        RuleType::Multi => {
            row.port = process_port(&row.port);
            row.source_port = process_port(&row.source_port);
            row.network = row.network.trim().to_string();
            row.protocol = split_lines(&row.protocol, ',').join(",");

            let conditions = [
                &row.domain,
                &row.ip,
                &row.port,
                &row.source_port,
                &row.network,
                &row.protocol,
            ];
            if conditions.iter().all(|c| c.is_empty()) {
                return Err(ValidationError::EmptyConditions);
            }
        }
    }

    Ok(row)
}

/// Clean up an edited DNS server before it is stored
pub fn normalize_dns_server_row(row: DnsServerRow) -> Result<DnsServerRow, ValidationError> {
    let name = row.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let note = row.note.trim().to_string();
    let address = row.address.trim().to_string();

    match row.server_type {
        DnsServerType::Object => Ok(DnsServerRow {
            name,
            note,
            address,
            domains: process_domain(&row.domains),
            expect_ips: process_ip(&row.expect_ips),
            client_ip: row.client_ip.trim().to_string(),
            ..row
        }),
        // plain addresses carry none of the detailed settings
        DnsServerType::Address => Ok(DnsServerRow {
            name,
            note,
            address,
            ..Default::default()
        }),
    }
}

/// Insert (`index == None`) or replace a rule, then rehash the mode
pub fn save_rule_row(mode: &mut RuleModeRow, index: Option<usize>, row: RuleRow) -> Result<(), ValidationError> {
    let row = normalize_rule_row(row)?;
    let mut rules = std::mem::take(&mut mode.rules);
    match index {
        Some(i) if i < rules.len() => rules[i] = row,
        _ => rules.push(row),
    }
    mode.set_rules(rules);
    Ok(())
}

/// Insert (`index == None`) or replace a DNS server, then rehash the mode
pub fn save_dns_server_row(
    mode: &mut DnsModeRow,
    index: Option<usize>,
    row: DnsServerRow,
) -> Result<(), ValidationError> {
    let row = normalize_dns_server_row(row)?;
    match index {
        Some(i) if i < mode.servers.len() => mode.servers[i] = row,
        _ => mode.servers.push(row),
    }
    mode.refresh_hash();
    Ok(())
}

/// Pick `count` distinct ports in `range` that can currently be bound on loopback
pub fn allocate_ports(count: usize, range: Range<u16>) -> Result<Vec<u16>> {
    let mut ports = Vec::with_capacity(count);
    let mut taken = HashSet::new();

    for _ in 0..count {
        let port = (0..PORT_ATTEMPTS)
            .map(|_| rand::random_range(range.clone()))
            .find(|p| !taken.contains(p) && TcpListener::bind(("127.0.0.1", *p)).is_ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No free port in {}-{} after {} attempts",
                    range.start,
                    range.end,
                    PORT_ATTEMPTS
                )
            })?;
        taken.insert(port);
        ports.push(port);
    }

    Ok(ports)
}

/// The two-step hand-off to the running proxy engine
#[allow(async_fn_in_trait)]
pub trait EngineControl {
    async fn save_config(&self, doc: &RayDocument) -> Result<()>;
    async fn restart(&self) -> Result<()>;
}

/// Save the document, then restart. A failed save never restarts.
pub async fn apply<E: EngineControl>(engine: &E, doc: &RayDocument) -> Result<(), ApplyError> {
    if let Err(e) = engine.save_config(doc).await {
        log::error!("Failed to save engine config: {:#}", e);
        return Err(ApplyError::SaveFailed);
    }

    if let Err(e) = engine.restart().await {
        log::error!("Failed to restart engine: {:#}", e);
        return Err(ApplyError::RestartFailed);
    }

    log::info!("Engine config applied");
    Ok(())
}

/// Writes `ray_config.json` into the data directory and runs an optional shell command
#[derive(Debug, Clone)]
pub struct LocalEngine {
    store: Store,
    restart_command: Option<String>,
}

impl LocalEngine {
    pub fn new(store: Store, restart_command: Option<String>) -> Self {
        Self {
            store,
            restart_command,
        }
    }
}

impl EngineControl for LocalEngine {
    async fn save_config(&self, doc: &RayDocument) -> Result<()> {
        self.store.write(Doc::RayConfig, doc)
    }

    async fn restart(&self) -> Result<()> {
        let Some(command) = &self.restart_command else {
            log::info!("No restart command configured");
            return Ok(());
        };

        log::info!("Running restart command: {}", command);
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", command))?;

        if !status.success() {
            anyhow::bail!("Restart command exited with {}", status);
        }
        Ok(())
    }
}

/// Settings plus the data directory they point at
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = config.store()?;
        Ok(Self { config, store })
    }

    pub fn compile(&self) -> Result<RayDocument> {
        let inputs = self.store.load_inputs()?;
        let doc = compile_document(&inputs, &self.config.listen(), Some(self.store.dir()))?;
        Ok(doc)
    }

    pub fn pac_rules(&self) -> Result<PacRules> {
        Ok(PacRules::new(
            self.config.socks_proxy(),
            &self.store.rule_config()?,
            &self.store.rule_domain()?,
        ))
    }

    pub fn pac(&self) -> Result<String> {
        Ok(self.pac_rules()?.render())
    }

    pub fn engine(&self) -> LocalEngine {
        LocalEngine::new(self.store.clone(), self.config.restart_command.clone())
    }

    /// Compile, save, restart and refresh `proxy.js` when enabled
    pub async fn apply<E: EngineControl>(&self, engine: &E) -> Result<(), ApplyError> {
        let doc = self.compile()?;
        apply(engine, &doc).await?;

        if self.config.auto_setup_pac {
            let path = self.store.write_file("proxy.js", &self.pac()?)?;
            log::info!("PAC file written to {}", path.display());
        }
        Ok(())
    }

    pub fn enable_server(&self, id: &str) -> Result<ServerRow> {
        let mut servers = self.store.servers()?;
        if !enable_server(&mut servers, id) {
            anyhow::bail!("Server '{}' not found", id);
        }
        self.store.write(Doc::Server, &servers)?;

        servers
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", id))
    }

    pub fn delete_servers(&self, ids: &[String]) -> Result<usize> {
        let servers = self.store.servers()?;
        let before = servers.len();
        let servers = delete_servers(servers, ids);
        self.store.write(Doc::Server, &servers)?;
        Ok(before - servers.len())
    }

    /// Normalize `row`, append it to rule mode `index` and save the list
    pub fn add_rule(&self, index: usize, row: RuleRow) -> Result<RuleModeRow> {
        let mut modes = self.store.rule_modes()?;
        let mode = modes
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("Rule mode {} not found", index))?;
        save_rule_row(mode, None, row)?;
        let saved = mode.clone();
        self.store.write(Doc::RuleModeList, &modes)?;
        Ok(saved)
    }

    /// Normalize `row`, append it to DNS mode `index` and save the list
    pub fn add_dns_server(&self, index: usize, row: DnsServerRow) -> Result<DnsModeRow> {
        let mut modes = self.store.dns_modes()?;
        let mode = modes
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("DNS mode {} not found", index))?;
        save_dns_server_row(mode, None, row)?;
        let saved = mode.clone();
        self.store.write(Doc::DnsModeList, &modes)?;
        Ok(saved)
    }

    pub fn import_servers(&self, input: &str) -> Result<ImportSummary> {
        let import = share::import_servers(input, &self.store.servers()?);
        if import.summary.imported > 0 {
            self.store.write(Doc::Server, &import.rows)?;
        }
        Ok(import.summary)
    }

    /// One share link per server; rows that cannot be encoded are logged and skipped
    pub fn export_servers(&self, base64: bool) -> Result<Vec<String>> {
        let links = self
            .store
            .servers()?
            .iter()
            .filter_map(|row| {
                let link = if base64 {
                    share::server_to_base64_uri(row)
                } else {
                    share::server_to_uri(row)
                };
                link.map_err(|e| log::warn!("Skipping server {:?}: {}", row.ps, e))
                    .ok()
            })
            .collect();
        Ok(links)
    }

    pub fn export_records(&self, kind: RecordKind) -> Result<String> {
        Ok(match kind {
            RecordKind::Rule => share::export_records(&self.store.rule_modes()?),
            RecordKind::Dns => share::export_records(&self.store.dns_modes()?),
            RecordKind::PublicDns => share::export_records(&self.store.dns_table()?),
            RecordKind::Sub => share::export_records(&self.store.subscriptions()?),
        })
    }

    pub fn import_records(&self, kind: RecordKind, input: &str) -> Result<ImportSummary> {
        match kind {
            RecordKind::Rule => self.import_into(Doc::RuleModeList, input, self.store.rule_modes()?),
            RecordKind::Dns => self.import_into(Doc::DnsModeList, input, self.store.dns_modes()?),
            RecordKind::PublicDns => {
                self.import_into(Doc::DnsTableList, input, self.store.dns_table()?)
            }
            RecordKind::Sub => {
                self.import_into(Doc::SubscriptionList, input, self.store.subscriptions()?)
            }
        }
    }

    fn import_into<T: ShareRecord>(&self, doc: Doc, input: &str, existing: Vec<T>) -> Result<ImportSummary> {
        let import = share::import_records(input, &existing);
        if import.summary.imported > 0 {
            self.store.write(doc, &import.rows)?;
        }
        Ok(import.summary)
    }

    /// Write one speed-test document per server under `speed_test/`.
    ///
    /// Results follow the server list order; a server that fails to compile
    /// yields an error in its slot.
    pub async fn write_speed_test_confs(&self, concurrency: usize) -> Result<Vec<(ServerRow, Result<PathBuf>)>> {
        let servers = self.store.servers()?;
        let ports = allocate_ports(servers.len(), SPEED_TEST_PORTS)?;
        let common = self.store.load_inputs()?.ray_common;

        let jobs: Vec<_> = servers.into_iter().zip(ports).collect();
        let results = run_bounded(jobs, concurrency, |(server, port)| {
            let store = self.store.clone();
            let common = common.clone();
            async move {
                let written = speed_test_document(&server, &common, Some(store.dir()), port)
                    .map_err(anyhow::Error::from)
                    .and_then(|doc| {
                        let contents = serde_json::to_string_pretty(&doc)?;
                        store.write_file(
                            PathBuf::from("speed_test").join(speed_test_filename(&server)),
                            &contents,
                        )
                    });
                (server, written)
            }
        })
        .await;

        Ok(results)
    }
}
