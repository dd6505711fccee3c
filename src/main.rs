use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

mod app;
mod config;
mod error;
mod ray;
mod share;
mod util;

use app::{AppState, Debouncer, RateLimiter};
use config::dns::{DnsServerRow, DnsServerType};
use config::rule::{RuleRow, RuleType};
use config::Doc;
use share::RecordKind;

#[derive(Parser)]
#[command(name = "doayctl")]
#[command(version = "0.1.0")]
#[command(about = "Compile and manage Doay proxy engine configuration", long_about = None)]
struct Cli {
    /// Directory holding server.json, rule_*.json, dns_*.json ...
    #[arg(long)]
    data_dir: Option<String>,

    /// none, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the engine config, or write it to a file
    Compile {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compile, save ray_config.json and run the restart command
    Apply,
    /// Print one compiled section
    Show {
        #[arg(value_enum)]
        section: Section,
    },
    /// Print the PAC script, or write it to a file
    Pac {
        #[arg(long)]
        out: Option<PathBuf>,

        /// Only print what the script answers for this host
        #[arg(long, conflicts_with = "out")]
        host: Option<String>,
    },
    /// Make a server the active one
    Enable { id: String },
    /// Delete servers by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Append a rule to a rule mode
    AddRule {
        /// Index into the rule mode list
        mode: usize,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        note: String,
        /// proxy, direct or reject
        #[arg(long, default_value = "proxy")]
        outbound: String,
        #[arg(long = "type", value_enum, default_value_t = RuleKindArg::Domain)]
        rule_type: RuleKindArg,
        /// Repeatable
        #[arg(long)]
        domain: Vec<String>,
        #[arg(long)]
        ip: Vec<String>,
        #[arg(long)]
        port: Vec<String>,
        #[arg(long, default_value = "")]
        network: String,
        /// Comma-separated: http, tls, quic, bittorrent
        #[arg(long, default_value = "")]
        protocol: String,
    },
    /// Append a DNS server to a DNS mode
    AddDnsServer {
        /// Index into the DNS mode list
        mode: usize,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        /// Store as a detailed server object instead of a plain address
        #[arg(long)]
        object: bool,
        #[arg(long)]
        domain: Vec<String>,
        #[arg(long)]
        expect_ip: Vec<String>,
        #[arg(long)]
        skip_fallback: bool,
    },
    /// List servers
    Servers,
    /// Import share links, one per line
    ImportServers { file: PathBuf },
    /// Print a share link per server
    ExportServers {
        /// Use the base64 JSON form
        #[arg(long)]
        base64: bool,
    },
    /// Print doay<Kind>:// lines: rule, dns, public-dns or sub
    Export {
        #[arg(value_parser = parse_kind)]
        kind: RecordKind,
    },
    /// Import doay<Kind>:// lines
    Import {
        #[arg(value_parser = parse_kind)]
        kind: RecordKind,
        file: PathBuf,
    },
    /// Write one speed-test config per server under speed_test/
    SpeedTestConfs {
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
    /// Re-apply whenever an input document changes
    Watch {
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleKindArg {
    Domain,
    Ip,
    Multi,
}

impl From<RuleKindArg> for RuleType {
    fn from(kind: RuleKindArg) -> Self {
        match kind {
            RuleKindArg::Domain => RuleType::Domain,
            RuleKindArg::Ip => RuleType::Ip,
            RuleKindArg::Multi => RuleType::Multi,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Section {
    Outbound,
    Routing,
    Dns,
}

fn parse_kind(s: &str) -> Result<RecordKind, String> {
    RecordKind::from_str(s).ok_or_else(|| format!("unknown record kind '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load or create config
    let mut config = config::AppConfig::load().unwrap_or_default();

    // Write the defaults on first run so there is a file to edit
    if !config::AppConfig::default_path()?.exists() {
        let _ = config.save();
    }
    config.merge_cli(cli.data_dir.clone(), cli.log_level.clone());

    env_logger::Builder::new()
        .parse_filters(config.log_filter())
        .parse_default_env()
        .init();

    let state = AppState::new(config)?;
    log::debug!("Data directory: {}", state.store.dir().display());

    match cli.command {
        Command::Compile { out } => {
            let json = serde_json::to_string_pretty(&state.compile()?)?;
            write_or_print(out, &json)?;
        }
        Command::Apply => match state.apply(&state.engine()).await {
            Ok(()) => println!("✓ Config applied"),
            Err(e) => {
                eprintln!("✗ Apply failed: {:#}", anyhow::Error::from(e));
                std::process::exit(1);
            }
        },
        Command::Show { section } => {
            let doc = state.compile()?;
            let json = match section {
                Section::Outbound => serde_json::to_string_pretty(&doc.outbounds)?,
                Section::Routing => serde_json::to_string_pretty(&doc.routing)?,
                Section::Dns => serde_json::to_string_pretty(&doc.dns)?,
            };
            println!("{}", json);
        }
        Command::Pac { out, host: None } => write_or_print(out, &state.pac()?)?,
        Command::Pac { host: Some(host), .. } => {
            println!("{}: {:?}", host, state.pac_rules()?.find_proxy(&host));
        }
        Command::Enable { id } => {
            let server = state.enable_server(&id)?;
            println!("✓ Enabled {} ({})", server.ps, server.host);
        }
        Command::Delete { ids } => {
            let removed = state.delete_servers(&ids)?;
            println!("✓ Deleted {} servers", removed);
        }
        Command::AddRule {
            mode,
            name,
            note,
            outbound,
            rule_type,
            domain,
            ip,
            port,
            network,
            protocol,
        } => {
            let row = RuleRow {
                name,
                note,
                outbound_tag: outbound,
                rule_type: rule_type.into(),
                domain: domain.join("\n"),
                ip: ip.join("\n"),
                port: port.join("\n"),
                network,
                protocol,
                ..Default::default()
            };
            let mode = state.add_rule(mode, row)?;
            println!("✓ Rule added to {} ({} rules)", mode.name, mode.rules.len());
        }
        Command::AddDnsServer {
            mode,
            name,
            address,
            object,
            domain,
            expect_ip,
            skip_fallback,
        } => {
            let row = DnsServerRow {
                name,
                server_type: if object {
                    DnsServerType::Object
                } else {
                    DnsServerType::Address
                },
                address,
                domains: domain.join("\n"),
                expect_ips: expect_ip.join("\n"),
                skip_fallback,
                ..Default::default()
            };
            let mode = state.add_dns_server(mode, row)?;
            println!("✓ DNS server added to {} ({} servers)", mode.name, mode.servers.len());
        }
        Command::Servers => print_servers(&state)?,
        Command::ImportServers { file } => {
            let summary = state.import_servers(&read_input(&file)?)?;
            println!("✓ {}", summary);
        }
        Command::ExportServers { base64 } => {
            for link in state.export_servers(base64)? {
                println!("{}", link);
            }
        }
        Command::Export { kind } => println!("{}", state.export_records(kind)?),
        Command::Import { kind, file } => {
            let summary = state.import_records(kind, &read_input(&file)?)?;
            println!("✓ {}", summary);
        }
        Command::SpeedTestConfs { concurrency } => {
            for (server, result) in state.write_speed_test_confs(concurrency).await? {
                match result {
                    Ok(path) => println!("✓ {} -> {}", server.ps, path.display()),
                    Err(e) => eprintln!("✗ {}: {:#}", server.ps, e),
                }
            }
        }
        Command::Watch { debounce_ms } => watch(state, Duration::from_millis(debounce_ms)).await?,
    }

    Ok(())
}

fn read_input(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_or_print(out: Option<PathBuf>, contents: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(&path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Written to {}", path.display());
        }
        None => println!("{}", contents),
    }
    Ok(())
}

fn print_servers(state: &AppState) -> Result<()> {
    let servers = state.store.servers()?;
    if servers.is_empty() {
        println!("No servers configured");
        return Ok(());
    }

    for server in &servers {
        let marker = if server.is_on() { "*" } else { " " };
        println!(
            "{} {}  {:<8} {:<24} {:<20} {}",
            marker, server.id, server.kind, server.host, server.scy, server.ps
        );
    }
    println!("\n{} servers", servers.len());
    Ok(())
}

/// Poll the input documents and re-apply after edits settle.
///
/// Speed-test configs are refreshed when the server list changed during the
/// burst, at most once per `SPEED_TEST_INTERVAL_MINUTES`.
async fn watch(state: AppState, window: Duration) -> Result<()> {
    const SPEED_TEST_INTERVAL_MINUTES: i64 = 30;

    let applier = state.clone();
    let limiter = RateLimiter::new(chrono::Duration::minutes(SPEED_TEST_INTERVAL_MINUTES));
    let debouncer = Debouncer::with_merge(
        window,
        |pending: bool, next| pending || next,
        move |servers_changed: bool| {
            // the slot is only spent when a refresh actually runs
            let refresh = servers_changed && limiter.check_and_set("speed-test");
            let state = applier.clone();
            async move {
                match state.apply(&state.engine()).await {
                    Ok(()) => println!("✓ Config applied"),
                    Err(e) => eprintln!("✗ Apply failed: {:#}", anyhow::Error::from(e)),
                }
                if refresh {
                    refresh_speed_test_confs(&state).await;
                }
            }
        },
    );

    println!("Watching {} (Ctrl+C to stop)", state.store.dir().display());
    let mut last_seen = state.store.inputs_modified();
    let mut last_servers = state.store.modified(Doc::Server);
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let modified = state.store.inputs_modified();
                if modified != last_seen {
                    log::debug!("Input documents changed");
                    last_seen = modified;

                    let servers = state.store.modified(Doc::Server);
                    let servers_changed = servers != last_servers;
                    last_servers = servers;
                    debouncer.trigger(servers_changed);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    debouncer.close().await;
    Ok(())
}

async fn refresh_speed_test_confs(state: &AppState) {
    match state.write_speed_test_confs(8).await {
        Ok(results) => {
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            log::info!("Speed-test configs refreshed ({} failed)", failed);
        }
        Err(e) => log::warn!("Failed to refresh speed-test configs: {:#}", e),
    }
}
