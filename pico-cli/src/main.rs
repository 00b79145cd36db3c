use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info};

use picopayments::bitcoin::hashes::hash160;
use picopayments::bitcoin::secp256k1::PublicKey;
use picopayments::bitcoin::{Address, Network, Script, ScriptBuf, Transaction};
use picopayments::channel::{ChannelState, CommitEntry};
use picopayments::persist::model::from_json;
use picopayments::tx::script::{CommitScriptParams, DepositScriptParams, Secret};
use picopayments::tx::solve::ScriptTemplate;
use pico_common::{from_hex, HexEncode};
use pico_util::config::{DEFAULT_NETWORK, LOG_NAME, NETWORK_NAMES};
use pico_util::observability::init_tracing_subscriber;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(
        short = 'n',
        long,
        help = "network for P2SH addresses",
        default_value = DEFAULT_NETWORK,
        value_parser = clap::builder::PossibleValuesParser::new(NETWORK_NAMES)
    )]
    network: String,

    #[clap(long, help = "directory for the log file, stderr only if unset", value_parser)]
    datadir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile or decode a deposit script
    #[clap(name = "deposit")]
    Deposit(DepositArgs),
    /// Compile or decode a commit script
    #[clap(name = "commit")]
    Commit(CommitArgs),
    /// Hash a secret
    #[clap(name = "secret-hash")]
    SecretHash { secret: String },
    /// Inspect a saved channel
    #[clap(name = "snapshot")]
    Snapshot(SnapshotArgs),
}

#[derive(Debug, Args)]
struct DepositArgs {
    #[clap(subcommand)]
    command: DepositCommands,
}

#[derive(Debug, Subcommand)]
enum DepositCommands {
    /// compile a deposit script from its parameters
    #[clap(name = "compile")]
    Compile {
        #[clap(long)]
        payer_pubkey: String,
        #[clap(long)]
        payee_pubkey: String,
        #[clap(long)]
        spend_secret_hash: String,
        #[clap(long, default_value_t = 5)]
        expire_time: u16,
    },
    /// decode the parameters of a hex deposit script
    #[clap(name = "decode")]
    Decode { script: String },
}

#[derive(Debug, Args)]
struct CommitArgs {
    #[clap(subcommand)]
    command: CommitCommands,
}

#[derive(Debug, Subcommand)]
enum CommitCommands {
    /// compile a commit script from its parameters
    #[clap(name = "compile")]
    Compile {
        #[clap(long)]
        payer_pubkey: String,
        #[clap(long)]
        payee_pubkey: String,
        #[clap(long)]
        spend_secret_hash: String,
        #[clap(long)]
        revoke_secret_hash: String,
        #[clap(long, default_value_t = 5)]
        delay_time: u16,
    },
    /// decode the parameters of a hex commit script
    #[clap(name = "decode")]
    Decode { script: String },
}

#[derive(Debug, Args)]
struct SnapshotArgs {
    #[clap(subcommand)]
    command: SnapshotCommands,
}

#[derive(Debug, Subcommand)]
enum SnapshotCommands {
    /// summarize a channel snapshot file, without secrets
    #[clap(name = "inspect")]
    Inspect { file: PathBuf },
}

fn parse_pubkey(name: &str, s: &str) -> anyhow::Result<PublicKey> {
    PublicKey::from_str(s).with_context(|| format!("invalid {}", name))
}

fn parse_hash(name: &str, s: &str) -> anyhow::Result<hash160::Hash> {
    hash160::Hash::from_str(s).with_context(|| format!("invalid {}", name))
}

fn parse_script(s: &str) -> anyhow::Result<ScriptBuf> {
    Ok(ScriptBuf::from_bytes(from_hex(s).map_err(|e| anyhow!("script is not hex: {}", e))?))
}

fn describe_script(script: &Script, network: Network) -> anyhow::Result<Value> {
    let address = Address::p2sh(script, network)?;
    Ok(json!({
        "script": script.as_bytes().to_hex(),
        "asm": script.to_asm_string(),
        "address": address.to_string(),
    }))
}

fn txid(tx: Option<&Transaction>) -> Option<String> {
    tx.map(|tx| tx.compute_txid().to_string())
}

fn describe_commits(entries: &[CommitEntry]) -> anyhow::Result<Vec<Value>> {
    entries
        .iter()
        .map(|entry| {
            let params = CommitScriptParams::from_script(&entry.script)?;
            Ok(json!({
                "txid": entry.transaction.compute_txid().to_string(),
                "revoke_secret_hash": params.revoke_secret_hash,
                "delay_time": params.delay_time,
            }))
        })
        .collect()
}

fn inspect_snapshot(file: &PathBuf) -> anyhow::Result<Value> {
    let contents =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let state = ChannelState::try_from(from_json(&contents)?)?;
    debug!("loaded snapshot from {}", file.display());

    let role = match (&state.payer_key, &state.payee_key) {
        (Some(_), Some(_)) => "both",
        (Some(_), None) => "payer",
        (None, Some(_)) => "payee",
        (None, None) => "none",
    };
    let deposit = match &state.deposit_script {
        Some(script) => Some(DepositScriptParams::from_script(script)?),
        None => None,
    };
    Ok(json!({
        "role": role,
        "spend_secret_known": state.spend_secret.is_some(),
        "deposit": deposit,
        "deposit_txid": txid(state.deposit_tx.as_ref()),
        "timeout_txid": txid(state.timeout_tx.as_ref()),
        "change_txid": txid(state.change_tx.as_ref()),
        "commits_requested": state.commits_requested.len(),
        "commits_active": describe_commits(&state.commits_active)?,
        "commits_revoked": describe_commits(&state.commits_revoked)?,
    }))
}

fn run(cli: Cli) -> anyhow::Result<Value> {
    let network = Network::from_str(&cli.network)
        .map_err(|e| anyhow!("unknown network {}: {}", cli.network, e))?;

    match cli.command {
        Commands::Deposit(args) => match args.command {
            DepositCommands::Compile {
                payer_pubkey,
                payee_pubkey,
                spend_secret_hash,
                expire_time,
            } => {
                let params = DepositScriptParams {
                    payer_pubkey: parse_pubkey("payer pubkey", &payer_pubkey)?,
                    payee_pubkey: parse_pubkey("payee pubkey", &payee_pubkey)?,
                    spend_secret_hash: parse_hash("spend secret hash", &spend_secret_hash)?,
                    expire_time,
                };
                describe_script(&params.to_script(), network)
            }
            DepositCommands::Decode { script } => {
                let script = parse_script(&script)?;
                Ok(serde_json::to_value(DepositScriptParams::from_script(&script)?)?)
            }
        },
        Commands::Commit(args) => match args.command {
            CommitCommands::Compile {
                payer_pubkey,
                payee_pubkey,
                spend_secret_hash,
                revoke_secret_hash,
                delay_time,
            } => {
                let params = CommitScriptParams {
                    payer_pubkey: parse_pubkey("payer pubkey", &payer_pubkey)?,
                    payee_pubkey: parse_pubkey("payee pubkey", &payee_pubkey)?,
                    spend_secret_hash: parse_hash("spend secret hash", &spend_secret_hash)?,
                    revoke_secret_hash: parse_hash("revoke secret hash", &revoke_secret_hash)?,
                    delay_time,
                };
                describe_script(&params.to_script(), network)
            }
            CommitCommands::Decode { script } => {
                let script = parse_script(&script)?;
                Ok(serde_json::to_value(CommitScriptParams::from_script(&script)?)?)
            }
        },
        Commands::SecretHash { secret } => {
            let bytes = from_hex(&secret).map_err(|e| anyhow!("secret is not hex: {}", e))?;
            let secret = Secret::new(&bytes);
            Ok(json!({ "hash160": secret.hash160() }))
        }
        Commands::Snapshot(args) => match args.command {
            SnapshotCommands::Inspect { file } => inspect_snapshot(&file),
        },
    }
}

/// Detect which template a script matches, for logging
fn template_name(script: &Script) -> &'static str {
    match ScriptTemplate::from_script(script) {
        Ok(ScriptTemplate::Deposit(_)) => "deposit",
        Ok(ScriptTemplate::Commit(_)) => "commit",
        Err(_) => "unknown",
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let _guard = init_tracing_subscriber(args.datadir.clone(), LOG_NAME)
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let result = run(args)?;
    if let Some(script) = result.get("script").and_then(Value::as_str) {
        info!("compiled {} script", template_name(&parse_script(script)?));
    }
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
