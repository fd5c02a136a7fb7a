//! lockbox: operator CLI for the encrypted file store
//!
//! Commands:
//!   keygen                         - print a fresh base64 master key
//!   config show                    - display current configuration
//!   ls   --user <id>               - list a user's files
//!   put  --user <id> <path>        - encrypt and store a local file
//!   get  --user <id> <file-id>     - decrypt a file to stdout or --output
//!   rm   --user <id> <file-id>     - delete a file
//!
//! `--admin` acts with admin rights. All file commands go straight to the
//! configured record and blob stores through the same pipelines as the
//! daemon, so access rules and errors are identical.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lockbox_core::config::LockboxConfig;
use lockbox_core::{FileId, Principal};
use lockbox_records::SqliteRecordStore;
use lockbox_storage::OperatorBlobStore;
use lockbox_vault::Vault;
use secrecy::ExposeSecret;
use std::io::Write;
use std::path::{Path, PathBuf};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    version,
    about = "Lockbox encrypted file store client",
    long_about = "lockbox: generate master keys and manage stored files without the daemon"
)]
struct Cli {
    /// Path to lockbox config.toml
    #[arg(long, short = 'c', env = "LOCKBOX_CONFIG", default_value = "/etc/lockbox/config.toml")]
    config: PathBuf,

    /// Log level for diagnostics on stderr
    #[arg(long, env = "LOCKBOX_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a freshly generated base64 master key
    Keygen,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List files owned by the acting user, newest first
    Ls {
        #[command(flatten)]
        actor: Actor,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Encrypt and store a local file
    Put {
        #[command(flatten)]
        actor: Actor,
        /// Local file to upload
        path: PathBuf,
        /// Display name (default: the local file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Decrypt a stored file
    Get {
        #[command(flatten)]
        actor: Actor,
        id: i64,
        /// Write to this path instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Delete a stored file
    Rm {
        #[command(flatten)]
        actor: Actor,
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Args, Debug)]
struct Actor {
    /// User id to act as
    #[arg(long, short = 'u')]
    user: i64,
    /// Act with admin rights
    #[arg(long)]
    admin: bool,
}

impl Actor {
    fn principal(&self) -> Principal {
        if self.admin {
            Principal::admin(self.user)
        } else {
            Principal::user(self.user)
        }
    }
}

type CliVault = Vault<SqliteRecordStore, OperatorBlobStore>;

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = LockboxConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    match cli.command {
        Commands::Keygen => cmd_keygen(),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Ls { actor, json } => {
            let vault = open_vault(&config).await?;
            cmd_ls(&vault, &actor.principal(), json).await
        }
        Commands::Put { actor, path, name } => {
            let vault = open_vault(&config).await?;
            cmd_put(&vault, &actor.principal(), &path, name.as_deref()).await
        }
        Commands::Get { actor, id, output } => {
            let vault = open_vault(&config).await?;
            cmd_get(&vault, &actor.principal(), FileId(id), output.as_deref()).await
        }
        Commands::Rm { actor, id } => {
            let vault = open_vault(&config).await?;
            cmd_rm(&vault, &actor.principal(), FileId(id)).await
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_vault(config: &LockboxConfig) -> Result<CliVault> {
    let loaded = lockbox_crypto::load_master_key(config.crypto.master_key_file.as_deref())
        .await
        .context(
            "master key not found\n\
             Set LOCKBOX_MASTER_KEY_FILE or crypto.master_key_file, or generate one with:\n\
             \tlockbox keygen > /etc/lockbox/master.key",
        )?;
    tracing::debug!(source = %loaded.source, "master key loaded");

    let op = lockbox_storage::build_operator(&config.storage).context("building storage operator")?;
    let records = SqliteRecordStore::open(&config.records.database_path, 1)
        .await
        .with_context(|| format!("opening {}", config.records.database_path.display()))?;

    Ok(Vault::new(loaded.key, records, OperatorBlobStore::new(op)))
}

// ── `lockbox keygen` ──────────────────────────────────────────────────────────

fn cmd_keygen() -> Result<()> {
    let key = lockbox_crypto::generate_master_key();
    println!("{}", lockbox_crypto::encode_master_key(&key).expose_secret());
    Ok(())
}

// ── `lockbox config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &LockboxConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── File commands ─────────────────────────────────────────────────────────────

async fn cmd_ls(vault: &CliVault, principal: &Principal, json: bool) -> Result<()> {
    let records = vault.list_files(principal).await?;

    if json {
        let entries: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "display_name": r.display_name,
                    "created_at": r.created_at.to_rfc3339(),
                    "encrypted": r.is_encrypted(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("no files");
        return Ok(());
    }
    println!("{:>8}  {:<20}  {:<9}  NAME", "ID", "UPLOADED", "ENCRYPTED");
    for r in &records {
        println!(
            "{:>8}  {:<20}  {:<9}  {}",
            r.id,
            r.created_at.format("%Y-%m-%d %H:%M:%S"),
            if r.is_encrypted() { "yes" } else { "legacy" },
            r.display_name.escape_debug(),
        );
    }
    Ok(())
}

async fn cmd_put(
    vault: &CliVault,
    principal: &Principal,
    path: &Path,
    name: Option<&str>,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let display_name = name.map(str::to_string).unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let record = vault.upload_file(principal, bytes, &display_name).await?;
    println!("stored {} as file {}", record.display_name, record.id);
    Ok(())
}

async fn cmd_get(
    vault: &CliVault,
    principal: &Principal,
    id: FileId,
    output: Option<&Path>,
) -> Result<()> {
    let file = vault.retrieve_file(principal, id, true).await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &file.bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "wrote {} bytes ({}) to {}",
                file.bytes.len(),
                file.mime_type,
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&file.bytes).context("writing to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_rm(vault: &CliVault, principal: &Principal, id: FileId) -> Result<()> {
    vault.delete_file(principal, id).await?;
    println!("deleted file {id}");
    Ok(())
}
