//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage reports the first problem it finds and stops. Diagnostics are
//! anchored at a 1-based line/column pair taken from the offending token or
//! AST node.

use std::fmt;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Line/column of a character in the source text, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
  pub line: usize,
  pub column: usize,
}

impl Position {
  pub fn new(line: usize, column: usize) -> Self {
    Self { line, column }
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

/// Coarse category of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Lex,
  Parse,
  Semantic,
  Arena,
}

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{position}: lexical error: {message}"))]
  Lex { position: Position, message: String },

  #[snafu(display("{position}: parse error: {message}"))]
  Parse { position: Position, message: String },

  #[snafu(display("{position}: semantic error: {message}"))]
  Semantic { position: Position, message: String },

  #[snafu(display("{position}: node arena exhausted after {blocks} blocks"))]
  ArenaExhausted { position: Position, blocks: usize },
}

impl CompileError {
  pub fn lex(position: Position, message: impl Into<String>) -> Self {
    Self::Lex {
      position,
      message: message.into(),
    }
  }

  pub fn parse(position: Position, message: impl Into<String>) -> Self {
    Self::Parse {
      position,
      message: message.into(),
    }
  }

  pub fn semantic(position: Position, message: impl Into<String>) -> Self {
    Self::Semantic {
      position,
      message: message.into(),
    }
  }

  pub fn position(&self) -> Position {
    match self {
      Self::Lex { position, .. }
      | Self::Parse { position, .. }
      | Self::Semantic { position, .. }
      | Self::ArenaExhausted { position, .. } => *position,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Lex { .. } => ErrorKind::Lex,
      Self::Parse { .. } => ErrorKind::Parse,
      Self::Semantic { .. } => ErrorKind::Semantic,
      Self::ArenaExhausted { .. } => ErrorKind::Arena,
    }
  }
}
