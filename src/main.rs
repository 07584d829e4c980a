use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use helium::toolchain::{Artifacts, Toolchain};

/// Compile a Helium source file into a Linux x86-64 executable.
#[derive(Debug, Parser)]
#[command(name = "helium", version, about)]
struct Cli {
  /// Source file to compile.
  input: PathBuf,

  /// Path of the executable to produce; the assembly is written next to it.
  output: PathBuf,

  /// Stop after writing the `.asm` file.
  #[arg(long)]
  emit_asm: bool,

  /// Print the parsed syntax tree to stdout before generating code.
  #[arg(long)]
  dump_ast: bool,

  /// Keep the intermediate object file.
  #[arg(long)]
  keep_obj: bool,

  /// Assembler to invoke.
  #[arg(long, env = "HELIUM_NASM", default_value = "nasm")]
  nasm: OsString,

  /// Linker to invoke.
  #[arg(long, env = "HELIUM_LD", default_value = "ld")]
  ld: OsString,

  /// Log more; repeat for trace output. Ignored when HELIUM_LOG is set.
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_env("HELIUM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn run(cli: &Cli) -> Result<()> {
  let source = fs::read_to_string(&cli.input)
    .with_context(|| format!("reading {}", cli.input.display()))?;
  let compiling = || format!("compiling {}", cli.input.display());
  let program = helium::parse(&source).with_context(compiling)?;
  if cli.dump_ast {
    print!("{}", program.dump());
  }
  let asm = helium::codegen::generate(&program).with_context(compiling)?;

  let artifacts = Artifacts::for_output(&cli.output);
  fs::write(&artifacts.asm, asm).with_context(|| format!("writing {}", artifacts.asm.display()))?;
  info!(asm = %artifacts.asm.display(), "wrote assembly");

  if cli.emit_asm {
    return Ok(());
  }

  let toolchain = Toolchain::locate(&cli.nasm, &cli.ld)?;
  toolchain.build(&artifacts, cli.keep_obj)
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);
  debug!(?cli, "starting");

  if let Err(err) = run(&cli) {
    eprintln!("helium: {err:#}");
    process::exit(1);
  }
}
