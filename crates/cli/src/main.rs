//! `escrow-audit` — audit ICS-20 escrow conservation between Cosmos chains

mod output;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use escrow_audit_cache::{CacheSettings, DescriptorCache, TendermintVersionFetcher};
use escrow_audit_client::{GrpcTransport, QueryClient, SchemaGate};
use escrow_audit_config::{AppConfig, AuditMode, ConfigLoader, TransportPreference};
use escrow_audit_orchestrator::{AuditRequest, Auditor};
use escrow_audit_registry::RegistryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "escrow-audit",
    version,
    about = "Audit ICS-20 escrow conservation between Cosmos chains"
)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the registry data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Audit the escrow between two chains
    Audit {
        /// Chain whose escrow account is audited first
        primary: String,

        /// Counterparty chain
        secondary: String,

        /// Channel id on the primary chain (manual mode)
        channel_id: Option<String>,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Also audit the reverse direction
        #[arg(long)]
        reverse: bool,

        #[arg(long, value_enum, default_value_t = TransportArg::Auto)]
        transport: TransportArg,
    },

    /// Re-validate and re-index the mirror-populated chain store
    UpdateChains,

    /// Show data store and cache state
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Quick,
    Comprehensive,
    Manual,
}

impl From<ModeArg> for AuditMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Quick => AuditMode::Quick,
            ModeArg::Comprehensive => AuditMode::Comprehensive,
            ModeArg::Manual => AuditMode::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Binary,
    Text,
    Auto,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,escrow_audit=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(3);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::from_file_with_env(path, "ESCROW_AUDIT")
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::from_env().unwrap_or_default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }

    match cli.command {
        Command::Audit {
            primary,
            secondary,
            channel_id,
            mode,
            reverse,
            transport,
        } => {
            audit(
                &config, primary, secondary, channel_id, mode, reverse, transport,
            )
            .await
        }
        Command::UpdateChains => update_chains(&config),
        Command::Status => status(&config),
    }
}

async fn audit(
    config: &AppConfig,
    primary: String,
    secondary: String,
    channel_id: Option<String>,
    mode: Option<ModeArg>,
    reverse: bool,
    transport: TransportArg,
) -> anyhow::Result<i32> {
    let mode = match mode {
        Some(mode) => mode.into(),
        None if channel_id.is_some() => AuditMode::Manual,
        None => config.audit.default_mode,
    };
    if mode == AuditMode::Manual && channel_id.is_none() {
        bail!("manual mode requires a channel id");
    }

    let preference = match transport {
        TransportArg::Binary => TransportPreference::Binary,
        TransportArg::Text => TransportPreference::Text,
        TransportArg::Auto => config.transport_preference(),
    };

    let registry = Arc::new(RegistryStore::open(&config.data.dir));
    let cache = Arc::new(DescriptorCache::new(
        CacheSettings {
            dir: config.cache_dir(),
            schema_ttl: Duration::from_millis(config.cache.schema_ttl_ms),
            version_check_interval: Duration::from_millis(config.cache.version_check_interval_ms),
            ..Default::default()
        },
        Arc::new(TendermintVersionFetcher),
    ));

    let grpc = Arc::new(GrpcTransport::new());
    let client = Arc::new(
        QueryClient::with_grpc(config.api.clone(), preference, grpc.clone())
            .with_schema_gate(SchemaGate::new(cache, grpc.clone())),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling audit");
            signal_cancel.cancel();
        }
    });

    let auditor = Auditor::new(registry, client, &config.audit);
    let request = AuditRequest {
        primary,
        secondary,
        mode,
        channel_id,
        reverse,
    };

    let report = auditor.run(&request, &cancel).await?;
    output::render(&report);
    grpc.shutdown().await;

    Ok(report.exit_code())
}

fn update_chains(config: &AppConfig) -> anyhow::Result<i32> {
    let store = RegistryStore::open(&config.data.dir);
    let valid = store
        .reindex()
        .with_context(|| format!("re-indexing {}", config.data.dir.display()))?;
    store.touch_last_update(chrono::Utc::now())?;
    info!(chains = valid, dir = %config.data.dir.display(), "chain store re-validated");
    println!("{valid} valid chain records in {}", config.data.dir.display());
    Ok(0)
}

fn status(config: &AppConfig) -> anyhow::Result<i32> {
    let store = RegistryStore::open(&config.data.dir);
    let cache = DescriptorCache::new(
        CacheSettings {
            dir: config.cache_dir(),
            ..Default::default()
        },
        Arc::new(TendermintVersionFetcher),
    );

    println!("data dir:       {}", config.data.dir.display());
    println!("cache dir:      {}", config.cache_dir().display());

    match store.list_chains() {
        Ok(chains) => println!("chains:         {}", chains.len()),
        Err(e) => println!("chains:         unavailable ({e})"),
    }
    match store.channel_pair_count() {
        Ok(count) => println!("channel pairs:  {count}"),
        Err(e) => println!("channel pairs:  unavailable ({e})"),
    }
    match store.last_update() {
        Ok(Some(stamp)) => {
            let age = chrono::Utc::now().signed_duration_since(stamp);
            println!("last update:    {stamp} ({}h ago)", age.num_hours());
        }
        Ok(None) => println!("last update:    never"),
        Err(e) => println!("last update:    unreadable ({e})"),
    }
    println!("schema cache:   {} entries", cache.schema_entry_count());
    println!("version cache:  {} entries", cache.version_entry_count());

    Ok(0)
}
