//! simonctr CLI
//!
//! Session-key handshake server and client, plus offline counter-mode
//! encryption under a known session key.

mod config;

use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use simonctr_core::message::FileHeader;
use simonctr_crypto::SessionKey;
use simonctr_crypto::ctr::{CounterStream, CtrCiphertext, CtrNonce};
use simonctr_transport::{Client, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use config::Config;

/// simonctr - RSA-authenticated session keys over Simon counter mode
#[derive(Parser)]
#[command(name = "simonctr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept handshakes from initiators
    Serve {
        /// Listen address (overrides the config file)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Perform a handshake with a server
    Connect {
        /// Server address
        #[arg(required = true)]
        addr: SocketAddr,

        /// Identity to place in the signed agreement data
        #[arg(short, long)]
        identity: Option<String>,

        /// JSON object sent as a file header after the handshake
        #[arg(long)]
        header: Option<String>,
    },

    /// Encrypt an integer under a session key
    Encrypt {
        /// Session key (hex, at most 256 bits)
        #[arg(short, long)]
        key: String,

        /// Plaintext integer (hex)
        #[arg(required = true)]
        plaintext: String,
    },

    /// Decrypt an integer under a session key
    Decrypt {
        /// Session key (hex, at most 256 bits)
        #[arg(short, long)]
        key: String,

        /// Nonce printed by `encrypt` (hex)
        #[arg(short, long)]
        nonce: String,

        /// Plaintext length in bits
        #[arg(short, long)]
        bits: u64,

        /// Ciphertext integer (hex)
        #[arg(required = true)]
        ciphertext: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    // Validate configuration
    config.validate()?;

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            serve(bind, &config).await?;
        }
        Commands::Connect {
            addr,
            identity,
            header,
        } => {
            connect(addr, identity, header, &config).await?;
        }
        Commands::Encrypt { key, plaintext } => {
            encrypt(&key, &plaintext)?;
        }
        Commands::Decrypt {
            key,
            nonce,
            bits,
            ciphertext,
        } => {
            decrypt(&key, &nonce, bits, &ciphertext)?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Run the handshake server until Ctrl-C
async fn serve(bind: Option<SocketAddr>, config: &Config) -> anyhow::Result<()> {
    let mut server_config = config.server_config()?;
    if let Some(addr) = bind {
        server_config.listen_addr = addr;
    }

    let keys = Arc::new(config.load_keys()?);
    let server = Server::bind(server_config, keys).await?;
    println!("Listening on {}", server.local_addr()?);

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
        }
        let _ = stop.send(true);
    });

    server.run(shutdown).await?;
    Ok(())
}

/// Perform one handshake and optionally send a file header
async fn connect(
    addr: SocketAddr,
    identity: Option<String>,
    header: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let header: Option<FileHeader> = header
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!("File header must be a JSON object: {e}"))?;

    let keys = Arc::new(config.load_keys()?);
    let mut client = Client::connect(addr, keys, identity, config.tcp_settings()).await?;

    let key = client.handshake().await?;
    tracing::info!("Handshake with {} complete", addr);
    println!("Session key fingerprint: {}", fingerprint(&key));

    if let Some(header) = header {
        client.send_file_header(&header).await?;
        println!("File header sent");
    }

    client.close().await?;
    Ok(())
}

fn encrypt(key: &str, plaintext: &str) -> anyhow::Result<()> {
    let stream = CounterStream::new(&parse_session_key(key)?)?;
    let (nonce, ciphertext) = stream.encrypt(&parse_hex("plaintext", plaintext)?)?;

    println!("nonce:      {:032x}", nonce.as_u128());
    println!("bits:       {}", ciphertext.bit_len());
    println!("ciphertext: {}", ciphertext.to_biguint().to_str_radix(16));
    Ok(())
}

fn decrypt(key: &str, nonce: &str, bits: u64, ciphertext: &str) -> anyhow::Result<()> {
    let stream = CounterStream::new(&parse_session_key(key)?)?;
    let nonce = u128::from_str_radix(strip_hex_prefix(nonce), 16)
        .map_err(|e| anyhow::anyhow!("Invalid nonce: {e}"))?;
    let ciphertext = CtrCiphertext::from_biguint(&parse_hex("ciphertext", ciphertext)?, bits)?;

    let plaintext = stream.decrypt(CtrNonce::from_u128(nonce), &ciphertext)?;
    println!("{}", plaintext.to_str_radix(16));
    Ok(())
}

fn parse_session_key(s: &str) -> anyhow::Result<SessionKey> {
    Ok(SessionKey::from_biguint(&parse_hex("session key", s)?)?)
}

fn parse_hex(what: &str, s: &str) -> anyhow::Result<BigUint> {
    BigUint::parse_bytes(strip_hex_prefix(s).as_bytes(), 16)
        .ok_or_else(|| anyhow::anyhow!("Invalid {what}: expected hex digits, got {s:?}"))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Short printable digest of a session key
fn fingerprint(key: &SessionKey) -> String {
    let digest = simonctr_crypto::hash::sha3_512(key.to_decimal().as_bytes());
    hex::encode(&digest[..8])
}
