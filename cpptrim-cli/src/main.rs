//! cpptrim CLI - second inliner stage for competitive programming.
//!
//! Reads one self-contained C++ translation unit, removes every
//! declaration that `main()` (and `/// caide keep` annotations) do not
//! need, and writes the shrunk source to a file or stdout. Reports go
//! to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use cpptrim_core::{
    init_structured_logging, load_config, print_json, print_plain, Optimizer,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Remove unused declarations from an inlined C++ file")]
pub struct Cli {
    /// Path to the translation unit produced by the first inliner stage
    input: PathBuf,

    /// Write the rewritten source here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compile-driver token (repeatable): -DFOO, -UBAR, -std=c++17, ...
    #[arg(long = "compile-flag", value_name = "FLAG", allow_hyphen_values = true)]
    compile_flags: Vec<String>,

    /// Macro whose inactive conditional blocks must be preserved (repeatable)
    #[arg(long = "keep-macro", value_name = "NAME")]
    keep_macros: Vec<String>,

    /// Print the trim report to stderr
    #[arg(long)]
    stats: bool,

    /// Print the trim report as JSON (implies --stats)
    #[arg(long)]
    json: bool,

    /// Directory to load cpptrim.toml from (default: the input's directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_structured_logging();
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .or_else(|| cli.input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(&config_dir).unwrap_or_else(|e| {
        eprintln!("[WARN] ignoring config: {e}");
        None
    });

    let mut compile_flags = config
        .as_ref()
        .and_then(|c| c.compile_flags.clone())
        .unwrap_or_default();
    compile_flags.extend(cli.compile_flags.iter().cloned());

    let mut keep_macros = config
        .as_ref()
        .and_then(|c| c.keep_macros.clone())
        .unwrap_or_default();
    keep_macros.extend(cli.keep_macros.iter().cloned());

    let json_report = cli.json
        || config
            .as_ref()
            .and_then(|c| c.output.as_ref())
            .and_then(|o| o.format.as_deref())
            == Some("json");

    let optimizer = Optimizer::new(compile_flags, keep_macros);
    let (rewritten, report) = optimizer
        .optimize_with_report(&cli.input)
        .with_context(|| format!("failed to optimize {}", cli.input.display()))?;

    match &cli.output {
        Some(path) => fs::write(path, &rewritten)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{rewritten}"),
    }

    if json_report {
        print_json(&report);
    } else if cli.stats {
        print_plain(&report);
    }

    Ok(())
}
