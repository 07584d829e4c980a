//! Crate root: wires together the Helium compilation pipeline.
//!
//! Each stage fully materialises its output before the next one runs:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and builds an arena-backed AST.
//! - `codegen` checks names and types while lowering the AST into NASM
//!   x86-64 assembly, appending the `runtime` support routines.
//! - `error` centralises the diagnostics shared by the other modules.
//!
//! `toolchain` is the driver-side glue for assembling and linking the output.

pub mod arena;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod runtime;
pub mod symbols;
pub mod tokenizer;
pub mod toolchain;
pub mod ty;

pub use ast::Program;
pub use error::{CompileError, CompileResult, ErrorKind, Position};

/// Lex and parse source text into a program.
pub fn parse(source: &str) -> CompileResult<Program> {
  let tokens = tokenizer::tokenize(source)?;
  parser::parse(tokens)
}

/// Compile source text into NASM assembly.
pub fn compile(source: &str) -> CompileResult<String> {
  let program = parse(source)?;
  codegen::generate(&program)
}
