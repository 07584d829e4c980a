//! Syntax tree shared by the parser and the code generator.
//!
//! Composite nodes refer to their children through arena handles, so the tree
//! is a set of flat stores owned by [`Ast`] and walked by index.

use crate::arena::{Arena, Id};
use crate::error::{CompileError, CompileResult, Position};

pub type ExprId = Id<Expr>;
pub type StmtId = Id<Stmt>;
pub type IfId = Id<If>;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "+" => Some(Self::Add),
      "-" => Some(Self::Sub),
      "*" => Some(Self::Mul),
      "/" => Some(Self::Div),
      _ => None,
    }
  }

  /// Binding strength for precedence climbing; higher binds tighter.
  pub fn precedence(self) -> usize {
    match self {
      Self::Add | Self::Sub => 0,
      Self::Mul | Self::Div => 1,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
  IntLiteral(String),
  /// Raw literal text; escapes are translated only when the data section is written.
  StrLiteral(String),
  Identifier(String),
  Parenthesized(ExprId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
  pub left: ExprId,
  pub op: BinaryOp,
  pub right: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
  Term(Term),
  Operation(Operation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
  pub kind: ExprKind,
  pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
  pub stmts: Vec<StmtId>,
  pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Else {
  If(IfId),
  Scope(Scope),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
  pub condition: ExprId,
  pub body: Scope,
  pub else_branch: Option<Else>,
  pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
  Exit(ExprId),
  Let {
    name: String,
    mutable: bool,
    value: ExprId,
  },
  Assign {
    name: String,
    value: ExprId,
  },
  Print(ExprId),
  Scope(Scope),
  If(IfId),
  While {
    condition: ExprId,
    body: Scope,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
  pub kind: StmtKind,
  pub position: Position,
}

/// Owner of every node produced for one compilation.
#[derive(Debug, Default)]
pub struct Ast {
  exprs: Arena<Expr>,
  stmts: Arena<Stmt>,
  ifs: Arena<If>,
}

impl Ast {
  pub fn new() -> Self {
    Self::default()
  }

  /// Node store whose arenas each stop growing after `blocks` blocks.
  pub fn with_block_limit(blocks: usize) -> Self {
    Self {
      exprs: Arena::with_block_limit(blocks),
      stmts: Arena::with_block_limit(blocks),
      ifs: Arena::with_block_limit(blocks),
    }
  }

  pub fn alloc_expr(&mut self, kind: ExprKind, position: Position) -> CompileResult<ExprId> {
    self
      .exprs
      .alloc(Expr { kind, position })
      .map_err(|full| CompileError::ArenaExhausted {
        position,
        blocks: full.blocks,
      })
  }

  pub fn alloc_stmt(&mut self, kind: StmtKind, position: Position) -> CompileResult<StmtId> {
    self
      .stmts
      .alloc(Stmt { kind, position })
      .map_err(|full| CompileError::ArenaExhausted {
        position,
        blocks: full.blocks,
      })
  }

  pub fn alloc_if(&mut self, node: If) -> CompileResult<IfId> {
    let position = node.position;
    self
      .ifs
      .alloc(node)
      .map_err(|full| CompileError::ArenaExhausted {
        position,
        blocks: full.blocks,
      })
  }

  pub fn expr(&self, id: ExprId) -> &Expr {
    &self.exprs[id]
  }

  pub fn stmt(&self, id: StmtId) -> &Stmt {
    &self.stmts[id]
  }

  pub fn if_node(&self, id: IfId) -> &If {
    &self.ifs[id]
  }

  /// Total number of nodes allocated so far.
  pub fn node_count(&self) -> usize {
    self.exprs.len() + self.stmts.len() + self.ifs.len()
  }
}

/// A parsed translation unit: top-level statements plus the nodes they refer to.
#[derive(Debug)]
pub struct Program {
  pub ast: Ast,
  pub stmts: Vec<StmtId>,
}

impl Program {
  /// Iterate top-level statements in source order.
  pub fn statements(&self) -> impl Iterator<Item = &Stmt> + '_ {
    self.stmts.iter().map(|&id| self.ast.stmt(id))
  }

  /// Indented outline of the tree, one node per line with its source position.
  pub fn dump(&self) -> String {
    let mut dump = Dump {
      ast: &self.ast,
      out: String::from("Program\n"),
    };
    for &id in &self.stmts {
      dump.stmt(id, 1);
    }
    dump.out
  }
}

struct Dump<'a> {
  ast: &'a Ast,
  out: String,
}

impl Dump<'_> {
  fn line(&mut self, depth: usize, text: &str, position: Position) {
    self
      .out
      .push_str(&format!("{:width$}{text} @{position}\n", "", width = depth * 2));
  }

  fn stmt(&mut self, id: StmtId, depth: usize) {
    let ast = self.ast;
    let stmt = ast.stmt(id);
    match &stmt.kind {
      StmtKind::Exit(value) => {
        self.line(depth, "Exit", stmt.position);
        self.expr(*value, depth + 1);
      }
      StmtKind::Let {
        name,
        mutable,
        value,
      } => {
        let binding = if *mutable { "mut " } else { "" };
        self.line(depth, &format!("Let {binding}{name}"), stmt.position);
        self.expr(*value, depth + 1);
      }
      StmtKind::Assign { name, value } => {
        self.line(depth, &format!("Assign {name}"), stmt.position);
        self.expr(*value, depth + 1);
      }
      StmtKind::Print(value) => {
        self.line(depth, "Print", stmt.position);
        self.expr(*value, depth + 1);
      }
      StmtKind::Scope(scope) => self.scope(scope, depth),
      StmtKind::If(id) => self.if_chain(*id, depth),
      StmtKind::While { condition, body } => {
        self.line(depth, "While", stmt.position);
        self.expr(*condition, depth + 1);
        self.scope(body, depth + 1);
      }
    }
  }

  fn scope(&mut self, scope: &Scope, depth: usize) {
    self.line(depth, "Scope", scope.position);
    for &id in &scope.stmts {
      self.stmt(id, depth + 1);
    }
  }

  fn if_chain(&mut self, id: IfId, depth: usize) {
    let ast = self.ast;
    let node = ast.if_node(id);
    self.line(depth, "If", node.position);
    self.expr(node.condition, depth + 1);
    self.scope(&node.body, depth + 1);
    match &node.else_branch {
      Some(Else::If(next)) => {
        self.line(depth + 1, "Else", ast.if_node(*next).position);
        self.if_chain(*next, depth + 2);
      }
      Some(Else::Scope(scope)) => {
        self.line(depth + 1, "Else", scope.position);
        self.scope(scope, depth + 2);
      }
      None => {}
    }
  }

  fn expr(&mut self, id: ExprId, depth: usize) {
    let ast = self.ast;
    let expr = ast.expr(id);
    match &expr.kind {
      ExprKind::Term(Term::IntLiteral(text)) => {
        self.line(depth, &format!("Int {text}"), expr.position);
      }
      ExprKind::Term(Term::StrLiteral(text)) => {
        self.line(depth, &format!("Str {text:?}"), expr.position);
      }
      ExprKind::Term(Term::Identifier(name)) => {
        self.line(depth, &format!("Ident {name}"), expr.position);
      }
      ExprKind::Term(Term::Parenthesized(inner)) => {
        self.line(depth, "Paren", expr.position);
        self.expr(*inner, depth + 1);
      }
      ExprKind::Operation(op) => {
        self.line(depth, &format!("Binary {}", op.op.symbol()), expr.position);
        self.expr(op.left, depth + 1);
        self.expr(op.right, depth + 1);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn program(source: &str) -> CompileResult<Program> {
    parse(tokenize(source)?)
  }

  #[test]
  fn program_is_debug_formattable() {
    let parsed = program("let x = 1;").unwrap();
    let debug = format!("{parsed:?}");
    assert!(debug.starts_with("Program"));
    assert!(debug.contains("exprs"));

    let err = program("let = 1;").unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
  }

  #[test]
  fn dump_outlines_statements_and_expressions() {
    let program = program("let mut x = 1 + 2 * 3;\nprint(\"a\" + (x));").unwrap();
    let expected = "\
Program
  Let mut x @1:1
    Binary + @1:13
      Int 1 @1:13
      Binary * @1:17
        Int 2 @1:17
        Int 3 @1:21
  Print @2:1
    Binary + @2:7
      Str \"a\" @2:7
      Paren @2:13
        Ident x @2:14
";
    assert_eq!(program.dump(), expected);
  }

  #[test]
  fn dump_nests_else_chains_and_loops() {
    let source = "if a { exit(1); } else if 0 { } else { x = 2; }\nwhile n { }";
    let dump = program(source).unwrap().dump();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(
      lines,
      [
        "Program",
        "  If @1:1",
        "    Ident a @1:4",
        "    Scope @1:6",
        "      Exit @1:8",
        "        Int 1 @1:13",
        "    Else @1:24",
        "      If @1:24",
        "        Int 0 @1:27",
        "        Scope @1:29",
        "        Else @1:38",
        "          Scope @1:38",
        "            Assign x @1:40",
        "              Int 2 @1:44",
        "  While @2:1",
        "    Ident n @2:7",
        "    Scope @2:9",
      ]
    );
  }
}
