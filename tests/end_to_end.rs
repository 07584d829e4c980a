//! Builds real executables with `nasm` and `ld` and checks what they do.
//! Those tests are ignored by default; run them with `cargo test -- --ignored`
//! on an x86-64 Linux host with both tools installed.

use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::process::{self, Command};

use helium::toolchain::{Artifacts, Toolchain};

struct Outcome {
  code: Option<i32>,
  stdout: Vec<u8>,
}

fn toolchain() -> Toolchain {
  assert!(
    cfg!(all(target_os = "linux", target_arch = "x86_64")),
    "end-to-end tests only run on x86-64 Linux"
  );
  Toolchain::locate(OsStr::new("nasm"), OsStr::new("ld"))
    .unwrap_or_else(|err| panic!("nasm and ld are required: {err:#}"))
}

fn scratch_dir(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("helium-e2e-{}-{name}", process::id()));
  fs::create_dir_all(&dir).expect("create scratch directory");
  dir
}

fn build_and_run(name: &str, source: &str) -> Outcome {
  let toolchain = toolchain();
  let asm = helium::compile(source).unwrap_or_else(|err| panic!("{name}: {err}"));
  let dir = scratch_dir(name);
  let artifacts = Artifacts::for_output(&dir.join(name));
  fs::write(&artifacts.asm, asm).expect("write assembly");
  toolchain
    .build(&artifacts, false)
    .unwrap_or_else(|err| panic!("{name}: {err:#}"));
  assert!(!artifacts.object.exists(), "object file should be removed");

  let output = Command::new(&artifacts.executable)
    .output()
    .expect("run compiled program");
  let _ = fs::remove_dir_all(&dir);
  Outcome {
    code: output.status.code(),
    stdout: output.stdout,
  }
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn exit_code_respects_precedence() {
  let out = build_and_run("precedence", "exit(1+2*3);");
  assert_eq!(out.code, Some(7));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn exit_with_variable() {
  let out = build_and_run("variable", "let x = 5; exit(x);");
  assert_eq!(out.code, Some(5));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn mutable_reassignment() {
  let out = build_and_run("reassign", "let mut x = 1; x = x + 1; exit(x);");
  assert_eq!(out.code, Some(2));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn print_concatenated_strings() {
  let out = build_and_run("concat", "print(\"hi\" + \"!\");");
  assert_eq!(out.stdout, b"hi!");
  assert_eq!(out.code, Some(0));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn while_counts_down() {
  let source = "let mut n = 3; while n { n = n - 1; } exit(n);";
  let out = build_and_run("countdown", source);
  assert_eq!(out.code, Some(0));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn else_branch_taken_on_zero() {
  let out = build_and_run("else", "if 0 { exit(1); } else { exit(2); }");
  assert_eq!(out.code, Some(2));
}

#[test]
fn undeclared_identifier_fails_before_assembly() {
  assert!(helium::compile("exit(missing);").is_err());
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn numbers_print_in_decimal() {
  let source = "print(0 - 42); print(\" \"); print(\"n=\" + 10 * 10);";
  let out = build_and_run("decimal", source);
  assert_eq!(out.stdout, b"-42 n=100");
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn string_truthiness_and_else_if_chain() {
  let source = r#"
    let empty = "";
    if empty { exit(1); } else if "x" { print("yes\n"); } else { exit(3); }
    let mut s = "a";
    let mut i = 3;
    /* grow s inside a loop */
    while i { s = s + i; i = i - 1; }
    print(s);
  "#;
  let out = build_and_run("strings", source);
  assert_eq!(out.stdout, b"yes\na321");
  assert_eq!(out.code, Some(0));
}

#[test]
#[ignore = "needs nasm and ld on x86-64 Linux"]
fn shadowed_values_are_restored_after_scope() {
  let source = "let x = 4; { let x = \"inner\"; print(x); } { let y = 1; exit(x + y); }";
  let out = build_and_run("shadow", source);
  assert_eq!(out.stdout, b"inner");
  assert_eq!(out.code, Some(5));
}
