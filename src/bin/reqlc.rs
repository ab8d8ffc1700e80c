//! ReQL driver core diagnostics.
//!
//! Inspects how datums and terms look on the wire without a server.
//!
//! # Examples
//!
//! ```bash
//! # Which native type would a datum decode to?
//! reqlc infer '{"a": [1, 2.5]}'
//!
//! # Decode dynamically and re-encode
//! reqlc canonicalize '{"$reql_type$": "TIME", "epoch_time": 0, "timezone": "Z"}'
//!
//! # Pretty print a wire-form term
//! reqlc wire '[39, [[15, ["users"]], [69, [[2, [1]], true]]]]'
//!
//! # Effective engine configuration
//! reqlc --config reql.toml config
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use reql_core::convert::infer_type;
use reql_core::{Datum, DatumEngine, EngineConfig, Term, Type};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ReQL driver core - datum and term diagnostics
#[derive(Parser, Debug)]
#[command(name = "reqlc")]
#[command(version = reql_core::VERSION)]
#[command(about = "Inspect ReQL datums and terms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "REQL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the native type a JSON datum decodes to dynamically
    Infer {
        /// Datum as JSON
        json: String,
    },

    /// Decode a JSON datum dynamically and re-encode it
    Canonicalize {
        /// Datum as JSON
        json: String,
    },

    /// Parse a wire-form term and pretty print it
    Wire {
        /// Term in the JSON wire form
        json: String,
    },

    /// Print the effective engine configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = EngineConfig::load(cli.config.as_deref()).context("loading engine config")?;
    debug!(?config, "engine configuration loaded");

    match cli.command {
        Commands::Infer { json } => {
            let datum = parse_datum(&json)?;
            let ty: Type = infer_type(&datum)?;
            println!("{}", ty);
        }
        Commands::Canonicalize { json } => {
            let datum = parse_datum(&json)?;
            let engine = DatumEngine::new(config);
            let value = engine.decode_value(&Type::Dynamic, &datum)?;
            let canonical = engine.encode_value(&Type::Dynamic, &value)?;
            println!("{}", serde_json::to_string(&canonical)?);
        }
        Commands::Wire { json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("term is not valid JSON")?;
            let term = Term::from_wire(&value)?;
            info!(term_type = %term.term_type, "parsed wire term");
            println!("{}", term.pretty_print(0));
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn parse_datum(json: &str) -> anyhow::Result<Datum> {
    serde_json::from_str(json).context("datum is not valid JSON")
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}
