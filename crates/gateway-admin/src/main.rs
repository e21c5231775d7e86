//! gateway-admin: install operating keys on gateways.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gateway_admin::{
    AdminClient, AdminConfigFile, AdminError, GatewayAdminApi, GatewayDescriptor, KeyMaterial,
};
use shared_crypto::{Ed25519KeyPair, Ed25519PublicKey, KeyVersion};

/// Gateway admin client
#[derive(Parser, Debug)]
#[command(name = "gateway-admin", version)]
#[command(about = "Provision operating keys on gateways")]
struct Cli {
    /// Log filter, overriding RUST_LOG (e.g. "debug", "gateway_admin=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new gateway key
    Keygen,

    /// Install a key on one gateway
    Provision {
        /// Admin configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Gateway admin address (host:port)
        #[arg(long)]
        address: String,

        /// Gateway public key (hex)
        #[arg(long)]
        gateway_public_key: String,

        /// Key to install (hex seed, as printed by `keygen`)
        #[arg(long)]
        key: String,

        /// Version of the key to install
        #[arg(long, default_value_t = 1)]
        key_version: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let category = e
                .downcast_ref::<AdminError>()
                .map(AdminError::category)
                .unwrap_or("internal");
            eprintln!("error [{}]: {:#}", category, e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Keygen => {
            keygen();
            Ok(())
        }
        Command::Provision {
            config,
            address,
            gateway_public_key,
            key,
            key_version,
        } => provision(config, address, gateway_public_key, key, key_version).await,
    }
}

fn keygen() {
    let key = AdminClient::create_key();
    let public_key = key.public_key();
    let encoded = key.key_pair().encode_private_key();
    println!("key:         {}", encoded.as_str());
    println!("public key:  {}", public_key.to_hex());
    println!(
        "node id:     {}",
        gateway_admin::NodeId::from_public_key(&public_key)
    );
    println!("key version: {}", key.key_version().encode());
}

async fn provision(
    config: PathBuf,
    address: String,
    gateway_public_key: String,
    key: String,
    key_version: u32,
) -> Result<()> {
    let settings = AdminConfigFile::load(&config)
        .and_then(AdminConfigFile::with_env_overrides)
        .and_then(AdminConfigFile::into_settings)
        .with_context(|| format!("loading {}", config.display()))?;

    let public_key = Ed25519PublicKey::from_hex(&gateway_public_key)
        .map_err(|e| AdminError::Configuration(format!("gateway public key: {}", e)))?;
    let key_pair = Ed25519KeyPair::decode_private_key(&key)
        .map_err(|e| AdminError::Configuration(format!("key: {}", e)))?;
    let version = KeyVersion::decode(key_version)
        .map_err(|e| AdminError::Configuration(format!("key version: {}", e)))?;
    let key = KeyMaterial::new(key_pair, version);

    let descriptor = GatewayDescriptor::new(public_key, address);
    let client = AdminClient::tcp(&settings)?;

    let result = client.provision(&descriptor, &key).await;
    client.shutdown().await;

    let gateway = result.with_context(|| {
        format!(
            "provisioning {} at {}",
            descriptor.node_id().short(),
            descriptor.admin_address()
        )
    })?;
    info!(node = %gateway.node_id, "done");
    println!(
        "gateway {} accepted key version {}",
        gateway.node_id,
        gateway.key_version.encode()
    );
    Ok(())
}
