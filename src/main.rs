//! cloudgrant CLI
//!
//! Synthesizes function configuration and access policies from a manifest.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cloudgrant::{
    FunctionProps, GrantDispatcher, build_app,
    config::{LogFormat, LoggingConfig, load_manifest},
    merge_props,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// cloudgrant - layered function defaults and permission grants
#[derive(Parser, Debug)]
#[command(name = "cloudgrant")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CLOUDGRANT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, env = "CLOUDGRANT_LOG_FORMAT", value_enum)]
    log_format: Option<FormatArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the manifest and print the synthesized units as JSON
    Synth {
        /// Path to the manifest file
        #[arg(short, long, env = "CLOUDGRANT_CONFIG")]
        config: Option<String>,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Merge two function props JSON files (override on top of base)
    Merge {
        base: PathBuf,
        #[arg(value_name = "OVERRIDE")]
        override_path: PathBuf,
    },

    /// Resolve a permission descriptor (JSON, or a bare string such as `s3:GetObject`)
    Resolve { descriptor: String },

    /// Print the JSON Schema of function props
    Schema,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pretty,
    Json,
}

impl From<FormatArg> for LogFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pretty => LogFormat::Pretty,
            FormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_logging(args: &Args, manifest: &LoggingConfig) {
    let level = args.log_level.as_deref().unwrap_or(&manifest.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let format = args.log_format.map(LogFormat::from).unwrap_or(manifest.format);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", json);
    Ok(())
}

fn read_props(path: &Path) -> anyhow::Result<FunctionProps> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid function props in {}", path.display()))
}

fn synth(args: &Args, config: Option<&str>, compact: bool) -> anyhow::Result<()> {
    let manifest = load_manifest(config)?;
    init_logging(args, &manifest.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        app = %manifest.app.name,
        stage = %manifest.app.stage,
        units = manifest.units.len(),
        "Synthesizing"
    );

    let mut app = build_app(&manifest).inspect_err(|e| error!(error = %e, "Synthesis failed"))?;
    let output = app.synthesize()?;
    print_json(&output, compact)
}

fn resolve(descriptor: &str) -> anyhow::Result<()> {
    let value = serde_json::from_str(descriptor)
        .unwrap_or_else(|_| serde_json::Value::String(descriptor.to_string()));

    let records = GrantDispatcher::resolve_value(&value)?;
    print_json(&records, false)
}

fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    match &args.command {
        Command::Synth { config, compact } => synth(&args, config.as_deref(), *compact),
        Command::Merge {
            base,
            override_path,
        } => {
            init_logging(&args, &LoggingConfig::default());
            let merged = merge_props(&read_props(base)?, &read_props(override_path)?);
            print_json(&merged, false)
        }
        Command::Resolve { descriptor } => {
            init_logging(&args, &LoggingConfig::default());
            resolve(descriptor)
        }
        Command::Schema => {
            let schema = schemars::schema_for!(FunctionProps);
            print_json(&schema, false)
        }
    }
}
