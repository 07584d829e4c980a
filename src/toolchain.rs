//! Assembling and linking generated code with external tools.
//!
//! Everything here is process and file-system plumbing around the compiler
//! proper; none of it is needed to turn source text into assembly.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

/// File names derived from the requested executable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
  pub asm: PathBuf,
  pub object: PathBuf,
  pub executable: PathBuf,
}

impl Artifacts {
  pub fn for_output(output: &Path) -> Self {
    Self {
      asm: output.with_extension("asm"),
      object: output.with_extension("o"),
      executable: output.to_path_buf(),
    }
  }
}

/// External programs used to turn assembly into an executable.
#[derive(Debug, Clone)]
pub struct Toolchain {
  pub assembler: PathBuf,
  pub linker: PathBuf,
}

impl Toolchain {
  /// Resolve both tools on `PATH` (or as given, if they are paths).
  pub fn locate(assembler: &OsStr, linker: &OsStr) -> Result<Self> {
    let assembler = which::which(assembler)
      .with_context(|| format!("assembler {assembler:?} not found"))?;
    let linker = which::which(linker).with_context(|| format!("linker {linker:?} not found"))?;
    debug!(assembler = %assembler.display(), linker = %linker.display(), "located toolchain");
    Ok(Self { assembler, linker })
  }

  pub fn assemble(&self, asm: &Path, object: &Path) -> Result<()> {
    let mut command = Command::new(&self.assembler);
    command.arg("-felf64").arg(asm).arg("-o").arg(object);
    run(command, "assembler")
  }

  pub fn link(&self, object: &Path, executable: &Path) -> Result<()> {
    let mut command = Command::new(&self.linker);
    command.arg("-o").arg(executable).arg(object);
    run(command, "linker")
  }

  /// Assemble and link `artifacts.asm`, removing the object file afterwards
  /// unless asked to keep it.
  pub fn build(&self, artifacts: &Artifacts, keep_object: bool) -> Result<()> {
    self.assemble(&artifacts.asm, &artifacts.object)?;
    self.link(&artifacts.object, &artifacts.executable)?;
    if !keep_object {
      fs::remove_file(&artifacts.object)
        .with_context(|| format!("removing {}", artifacts.object.display()))?;
    }
    info!(executable = %artifacts.executable.display(), "linked executable");
    Ok(())
  }
}

fn run(mut command: Command, role: &str) -> Result<()> {
  debug!(?command, "running {role}");
  let status = command
    .status()
    .with_context(|| format!("failed to start {role} {:?}", command.get_program()))?;
  if !status.success() {
    bail!("{role} {:?} failed with {status}", command.get_program());
  }
  Ok(())
}
