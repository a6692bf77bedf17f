use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use batchc::{CompileOptions, DEFAULT_MAX_INCLUDE_DEPTH, compile_file};
use clap::Parser;
use tracing::Level;

/// Compile a source file into a Windows batch script.
#[derive(Parser, Debug)]
#[command(name = "batchc", version, about, long_about = None)]
struct Cli {
  /// Source file to compile
  input: PathBuf,

  /// Write the script here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Emit additions as written instead of folding constants
  #[arg(long)]
  no_fold: bool,

  #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_INCLUDE_DEPTH)]
  max_include_depth: usize,

  /// Raise log verbosity (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(err) = run(cli) {
    eprintln!("{err:#}");
    process::exit(1);
  }
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => Level::WARN,
    1 => Level::DEBUG,
    _ => Level::TRACE,
  };
  tracing_subscriber::fmt()
    .with_target(false)
    .with_writer(std::io::stderr)
    .with_max_level(level)
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let options = CompileOptions {
    fold_constants: !cli.no_fold,
    max_include_depth: cli.max_include_depth,
    ..CompileOptions::default()
  };

  let script = compile_file(&cli.input, &options)
    .with_context(|| format!("failed to compile {}", cli.input.display()))?;

  match cli.output {
    Some(path) => fs::write(&path, script)
      .with_context(|| format!("failed to write {}", path.display()))?,
    None => print!("{script}"),
  }
  Ok(())
}
