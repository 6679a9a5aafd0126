use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pubky_name::{
    tracing::init_tracing_logs, DataDir, Keypair, Keystore, Node, PublicIdentity, PublishArgs,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the config, the node identity and the keystore.
    #[arg(long, global = true, default_value = "~/.pubky-name")]
    data_dir: PathBuf,
    /// Don't connect to the DHT.
    #[arg(long, global = true)]
    offline: bool,
    /// [tracing_subscriber::EnvFilter], overrides the `[logging]` config section.
    #[arg(long, global = true)]
    tracing_env_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory, a sample config and the node identity.
    Init,
    /// Publish a content path under one of your keys.
    Publish(PublishCmd),
    /// Manage the keystore.
    Key {
        #[command(subcommand)]
        command: KeyCmd,
    },
}

#[derive(Args, Debug)]
struct PublishCmd {
    /// Path to publish, for example `/ipfs/<cid>`.
    path: String,
    /// Alias or identity of the key to publish under. Defaults to `self`.
    #[arg(short, long)]
    key: Option<String>,
    /// How long the record stays valid, for example `24h` or `90m`.
    #[arg(short = 't', long)]
    lifetime: Option<String>,
    /// How long caches may keep the record.
    #[arg(long)]
    ttl: Option<String>,
    /// Check that the path resolves before publishing.
    #[arg(long)]
    resolve: Option<bool>,
    /// Publish to the local record store when running with `--offline`.
    #[arg(long)]
    allow_offline: bool,
}

#[derive(Subcommand, Debug)]
enum KeyCmd {
    /// Generate and store a new key.
    Gen { name: String },
    /// List stored keys.
    List {
        /// Print the identity of each key too.
        #[arg(short, long)]
        long: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = DataDir::new(cli.data_dir);

    let config = match &cli.command {
        Command::Init => {
            data_dir.ensure_data_dir_exists_and_is_accessible()?;
            data_dir.read_or_create_config_file()?
        }
        _ => data_dir.read_config_file()?,
    };
    init_tracing_logs(&config, cli.tracing_env_filter.as_deref())?;

    match cli.command {
        Command::Init => {
            let identity = data_dir.read_or_create_identity()?;
            println!("Data directory: {}", data_dir.path().display());
            println!("Identity: {}", PublicIdentity::from_keypair(&identity));
        }
        Command::Publish(cmd) => {
            let node = Node::from_data_dir(&data_dir, &config, cli.offline)?;
            let mut args = PublishArgs::with_defaults(cmd.path, &config.general);
            if let Some(key) = cmd.key {
                args.key = key;
            }
            if let Some(lifetime) = cmd.lifetime {
                args.lifetime = lifetime;
            }
            if cmd.ttl.is_some() {
                args.ttl = cmd.ttl;
            }
            if let Some(resolve) = cmd.resolve {
                args.resolve = resolve;
            }
            args.allow_offline |= cmd.allow_offline;

            let cancel = CancellationToken::new();
            let on_ctrlc = cancel.clone();
            ctrlc::set_handler(move || {
                println!("Ctrl+C detected, cancelling...");
                on_ctrlc.cancel();
            })?;

            match node.publish_name(&args, &cancel).await {
                Ok(entry) => println!("Published to {}: {}", entry.name, entry.value),
                Err(e) => {
                    if e.record_was_published() {
                        eprintln!("The record was published, but the result can't be confirmed.");
                    }
                    if e.is_retryable() {
                        eprintln!("The error may be temporary, try again.");
                    }
                    return Err(e.into());
                }
            }
        }
        Command::Key { command } => {
            let node = Node::from_data_dir(&data_dir, &config, true)?;
            let keystore = node.keystore();
            match command {
                KeyCmd::Gen { name } => {
                    let keypair = Keypair::random();
                    keystore.put(&name, &keypair)?;
                    println!("{}", PublicIdentity::from_keypair(&keypair));
                }
                KeyCmd::List { long } => {
                    for alias in keystore.list()? {
                        if long {
                            let identity = PublicIdentity::from_keypair(&keystore.get(&alias)?);
                            println!("{identity} {alias}");
                        } else {
                            println!("{alias}");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
