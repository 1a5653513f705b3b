//! Compile `parser.txt` into the packet signature table.
//!
//! Usage:
//!   sigbuilder [INPUT_DIR] [OUTPUT_DIR]
//!
//! Reads `INPUT_DIR/parser.txt` and writes `OUTPUT_DIR/_pkts.v5.ignore.json`. Exit code 1 on any
//! fatal error (and on warnings with `--deny-warnings`).

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use log::info;
use sigbuilder::{build, Context};
use std::path::PathBuf;

const INPUT_FILE: &str = "parser.txt";
const OUTPUT_FILE: &str = "_pkts.v5.ignore.json";

#[derive(Parser)]
#[command(name = "sigbuilder")]
#[command(version)]
#[command(about = "Packet signature builder", long_about = None)]
struct Cli {
    /// Directory containing parser.txt
    #[arg(default_value = ".", env = "SIGBUILDER_INPUT")]
    input_dir: PathBuf,

    /// Directory receiving _pkts.v5.ignore.json
    #[arg(default_value = ".", env = "SIGBUILDER_OUTPUT")]
    output_dir: PathBuf,

    /// Read this file instead of INPUT_DIR/parser.txt
    #[arg(long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Write this file instead of OUTPUT_DIR/_pkts.v5.ignore.json
    #[arg(long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Compile only; do not write output
    #[arg(long)]
    check: bool,

    /// Fail when any warning was reported
    #[arg(long)]
    deny_warnings: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn input_path(&self) -> PathBuf {
        self.input_file
            .clone()
            .unwrap_or_else(|| self.input_dir.join(INPUT_FILE))
    }

    fn output_path(&self) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join(OUTPUT_FILE))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .init();

    info!(
        "Signature Builder {} - output format rev{}",
        env!("CARGO_PKG_VERSION"),
        sigbuilder::table::FORMAT_REVISION
    );

    let input = cli.input_path();
    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("File not found @ {}", input.display()))?;

    let mut ctx = Context::new();
    let table = build(&source, &mut ctx)?;

    let warnings = ctx.diagnostics.warning_count();
    if cli.deny_warnings && warnings > 0 {
        bail!("{} warning(s) reported and --deny-warnings is set", warnings);
    }

    let headers = table.packets.len();
    let signatures: usize = table.packets.values().map(|p| p.signature.len()).sum();
    if cli.check {
        info!(
            "Check passed: {} packet(s), {} signature(s), {} warning(s)",
            headers, signatures, warnings
        );
        return Ok(());
    }

    let output = cli.output_path();
    let json = table.to_json(cli.pretty)?;
    std::fs::write(&output, json).with_context(|| format!("write failed: {}", output.display()))?;
    info!(
        "Build Success! {} packet(s), {} signature(s), {} warning(s). Output File: {}",
        headers,
        signatures,
        warnings,
        output.display()
    );
    Ok(())
}
