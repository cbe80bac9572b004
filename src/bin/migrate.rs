//! Protocol Migrator CLI
//!
//! Upgrades connector output to the most recent protocol version, or
//! downgrades messages and catalogs for an older connector.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use protocol_compat::protocol::{
    detect_from_lines, ConfiguredAirbyteCatalog, VersionedCatalog, VersionedMessage,
};
use protocol_compat::{CompatConfig, MigratorFactory, ProtocolVersion};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protocol-migrate")]
#[command(about = "Migrate protocol messages between major versions")]
struct Cli {
    /// Config file layered over protocol.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Configured catalog used to interpret record data
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade messages read from stdin to the most recent version
    Upgrade {
        /// Version the input was written in (detected from a SPEC line if omitted)
        #[arg(short, long)]
        from: Option<String>,
    },

    /// Downgrade most-recent messages read from stdin
    Downgrade {
        /// Version to write
        #[arg(short, long)]
        to: String,
    },

    /// Write a most-recent configured catalog for an older connector
    Catalog {
        /// Version to write
        #[arg(short, long)]
        to: String,

        /// Configured catalog file
        file: PathBuf,
    },

    /// Print the protocol version declared on stdin
    Detect,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CompatConfig::load_from(cli.config.as_deref())?;
    let factory = MigratorFactory::from_config(&config)?;
    let catalog = cli.catalog.as_deref().map(load_catalog).transpose()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Upgrade { from } => {
            let lines = read_stdin()?;
            let version = match from {
                Some(declared) => ProtocolVersion::parse(&declared)?,
                None => detect_or_default(&lines, &config)?,
            };
            info!(from = %version, to = %factory.most_recent_version(), "Upgrading");

            let reader = factory.message_reader(&version)?;
            for line in &lines {
                if let Some(message) = reader.read_line(line, catalog.as_ref())? {
                    writeln!(out, "{}", serde_json::to_string(&message)?)?;
                }
            }
        }

        Commands::Downgrade { to } => {
            let version = ProtocolVersion::parse(&to)?;
            let current = factory.most_recent_version().clone();
            info!(from = %current, to = %version, "Downgrading");

            let migrator = factory.message_migrator(&version)?;
            for line in read_stdin()? {
                if line.trim().is_empty() {
                    continue;
                }
                let message = VersionedMessage::parse(&line, &current)
                    .with_context(|| format!("Invalid message: {}", line))?;
                writeln!(out, "{}", migrator.serialize_message(message, catalog.as_ref())?)?;
            }
        }

        Commands::Catalog { to, file } => {
            let version = ProtocolVersion::parse(&to)?;
            let catalog = load_catalog(&file)?;
            let document = VersionedCatalog::new(catalog, factory.most_recent_version())?;
            let serializer = factory.catalog_serializer(&version)?;
            writeln!(out, "{}", serializer.serialize(document)?)?;
        }

        Commands::Detect => {
            let lines = read_stdin()?;
            writeln!(out, "{}", detect_or_default(&lines, &config)?)?;
        }
    }

    Ok(())
}

fn read_stdin() -> anyhow::Result<Vec<String>> {
    io::stdin()
        .lock()
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .context("Failed to read stdin")
}

fn detect_or_default(lines: &[String], config: &CompatConfig) -> anyhow::Result<ProtocolVersion> {
    let limit = config.protocol.detection_line_limit;
    match detect_from_lines(lines.iter().map(String::as_str), limit) {
        Some(version) => Ok(version),
        None => {
            let fallback = config.default_version()?;
            info!(version = %fallback, "No protocol version declared, using default");
            Ok(fallback)
        }
    }
}

fn load_catalog(path: &Path) -> anyhow::Result<ConfiguredAirbyteCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse catalog {}: {}", path.display(), e))
}
