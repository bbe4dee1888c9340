//! `jitcap`: inspect compilation capture artifacts.
//!
//! ```bash
//! jitcap stat                              # counts for the default artifact
//! jitcap dump capture.jsonl --method 'Program:Main'
//! jitcap dump capture.jsonl --index 3
//! jitcap config --init                     # write an example config.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

use jitcap::config::CaptureConfig;
use jitcap::sink::{ArtifactReader, ArtifactSummary, CompilationRecord};
use jitcap::util;

#[derive(Parser)]
#[command(name = "jitcap")]
#[command(about = "Inspect JIT compilation capture artifacts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (defaults to $JITCAP_HOME or ~/.jitcap)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count the records of an artifact by outcome and target
    Stat {
        /// Artifact to read (defaults to the configured output)
        artifact: Option<PathBuf>,
    },

    /// Print records as pretty JSON
    Dump {
        /// Artifact to read (defaults to the configured output)
        artifact: Option<PathBuf>,
        /// Only records whose method name matches this pattern
        #[arg(long)]
        method: Option<String>,
        /// Only the record at this position (0-based)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Show the effective capture configuration
    Config {
        /// Write an example config.toml if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir);

    match cli.command {
        Commands::Stat { artifact } => cmd_stat(&resolve_artifact(artifact)?),
        Commands::Dump {
            artifact,
            method,
            index,
        } => cmd_dump(&resolve_artifact(artifact)?, method.as_deref(), index),
        Commands::Config { init } => cmd_config(init),
    }
}

fn resolve_artifact(artifact: Option<PathBuf>) -> Result<PathBuf> {
    match artifact {
        Some(path) => Ok(path),
        None => Ok(CaptureConfig::load()
            .context("failed to load capture configuration")?
            .output_path),
    }
}

fn open(path: &Path) -> Result<impl Iterator<Item = Result<CompilationRecord>>> {
    let reader = ArtifactReader::open(path)
        .with_context(|| format!("failed to open artifact {}", path.display()))?;
    let display = path.display().to_string();
    Ok(reader.map(move |record| record.with_context(|| format!("in artifact {display}"))))
}

fn cmd_stat(path: &Path) -> Result<()> {
    let mut summary = ArtifactSummary::default();
    for record in open(path)? {
        summary.add(&record?);
    }
    println!("{}", path.display());
    print!("{summary}");
    Ok(())
}

fn cmd_dump(path: &Path, method: Option<&str>, index: Option<usize>) -> Result<()> {
    let pattern = method
        .map(Regex::new)
        .transpose()
        .context("invalid --method pattern")?;

    let mut printed = 0;
    for (position, record) in open(path)?.enumerate() {
        if index.is_some_and(|i| i != position) {
            continue;
        }
        let record = record?;
        if let Some(pattern) = &pattern {
            let name = record.method_name().unwrap_or_default();
            if !pattern.is_match(&name) {
                continue;
            }
        }
        println!("{}", serde_json::to_string_pretty(&record)?);
        printed += 1;
        if index.is_some() {
            break;
        }
    }

    if let Some(i) = index {
        if printed == 0 {
            bail!("no record at index {i} in {}", path.display());
        }
    }
    Ok(())
}

fn cmd_config(init: bool) -> Result<()> {
    let path = util::config_path();
    if init {
        if CaptureConfig::write_example(&path)? {
            println!("wrote {}", path.display());
        } else {
            println!("{} already exists", path.display());
        }
    }

    let config = CaptureConfig::load().context("failed to load capture configuration")?;
    println!("config:              {}", path.display());
    println!("output:              {}", config.output_path.display());
    println!("priming:             {}", config.priming.as_str());
    println!("capture_code:        {}", config.capture_code);
    println!("record_process_name: {}", config.record_process_name);
    Ok(())
}
