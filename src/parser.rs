//! Recursive-descent parser producing a [`Program`].
//!
//! Statements are recognised by their leading token (plus one token of
//! lookahead to tell an assignment from other identifier uses). Expressions
//! go through a single precedence-climbing routine driven by
//! [`BinaryOp::precedence`], which yields left-associated trees directly.
//!
//! Only syntax is checked here. Whether a name exists, is mutable, or has
//! the right type is the code generator's business.

use tracing::debug;

use crate::ast::{
  Ast, BinaryOp, Else, ExprId, ExprKind, If, IfId, Operation, Program, Scope, StmtId, StmtKind,
  Term,
};
use crate::error::{CompileError, CompileResult, Position};
use crate::tokenizer::{Token, TokenKind, describe_token};

/// Parse a token sequence into a program whose nodes live in a fresh [`Ast`].
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  parse_into(tokens, Ast::new())
}

/// Parse into a caller-provided node store, e.g. one with a block limit.
pub fn parse_into(tokens: Vec<Token>, ast: Ast) -> CompileResult<Program> {
  let mut parser = Parser {
    stream: TokenStream::new(tokens),
    ast,
  };

  let mut stmts = Vec::new();
  while !parser.stream.is_eof() {
    match parser.parse_stmt()? {
      Some(stmt) => stmts.push(stmt),
      None => return Err(parser.stream.unexpected("a statement")),
    }
  }

  debug!(
    statements = stmts.len(),
    nodes = parser.ast.node_count(),
    "parsed program"
  );
  Ok(Program {
    ast: parser.ast,
    stmts,
  })
}

struct Parser {
  stream: TokenStream,
  ast: Ast,
}

impl Parser {
  /// Returns `Ok(None)` when the next token cannot start a statement; the
  /// caller decides whether that is an error.
  fn parse_stmt(&mut self) -> CompileResult<Option<StmtId>> {
    let Some((leading, position)) = self.stream.peek(0).map(|t| (t.kind, t.position)) else {
      return Ok(None);
    };

    let kind = match leading {
      TokenKind::Exit => {
        self.stream.advance();
        self.stream.skip(TokenKind::OpenParen)?;
        let value = self.expect_expr("an expression after \"exit(\"")?;
        self.stream.skip(TokenKind::CloseParen)?;
        self.stream.skip(TokenKind::Semicolon)?;
        StmtKind::Exit(value)
      }
      TokenKind::Let => {
        self.stream.advance();
        let mutable = self.stream.equal(TokenKind::Mut);
        let name = self.stream.get_ident()?;
        self.stream.skip(TokenKind::Equals)?;
        let value = self.expect_expr("an expression after \"=\"")?;
        self.stream.skip(TokenKind::Semicolon)?;
        StmtKind::Let {
          name,
          mutable,
          value,
        }
      }
      TokenKind::Ident if self.stream.peek_kind(1) == Some(TokenKind::Equals) => {
        let name = self.stream.get_ident()?;
        self.stream.advance();
        let value = self.expect_expr("an expression after \"=\"")?;
        self.stream.skip(TokenKind::Semicolon)?;
        StmtKind::Assign { name, value }
      }
      TokenKind::OpenCurly => StmtKind::Scope(self.parse_scope()?),
      TokenKind::If => StmtKind::If(self.parse_if()?),
      TokenKind::While => {
        self.stream.advance();
        let condition = self.expect_expr("a condition after \"while\"")?;
        let body = self.parse_scope()?;
        StmtKind::While { condition, body }
      }
      TokenKind::Print => {
        self.stream.advance();
        self.stream.skip(TokenKind::OpenParen)?;
        let value = self.expect_expr("an expression after \"print(\"")?;
        self.stream.skip(TokenKind::CloseParen)?;
        self.stream.skip(TokenKind::Semicolon)?;
        StmtKind::Print(value)
      }
      _ => return Ok(None),
    };

    self.ast.alloc_stmt(kind, position).map(Some)
  }

  fn parse_scope(&mut self) -> CompileResult<Scope> {
    let position = self.stream.position();
    self.stream.skip(TokenKind::OpenCurly)?;
    let mut stmts = Vec::new();
    while let Some(stmt) = self.parse_stmt()? {
      stmts.push(stmt);
    }
    self.stream.skip(TokenKind::CloseCurly)?;
    Ok(Scope { stmts, position })
  }

  /// `if Expr Scope [else (If | Scope)]`, with the `if` keyword still pending.
  fn parse_if(&mut self) -> CompileResult<IfId> {
    let position = self.stream.position();
    self.stream.skip(TokenKind::If)?;
    let condition = self.expect_expr("a condition after \"if\"")?;
    let body = self.parse_scope()?;

    let else_branch = if self.stream.equal(TokenKind::Else) {
      if self.stream.peek_kind(0) == Some(TokenKind::If) {
        Some(Else::If(self.parse_if()?))
      } else {
        Some(Else::Scope(self.parse_scope()?))
      }
    } else {
      None
    };

    self.ast.alloc_if(If {
      condition,
      body,
      else_branch,
      position,
    })
  }

  fn expect_expr(&mut self, what: &str) -> CompileResult<ExprId> {
    match self.parse_expr(0)? {
      Some(expr) => Ok(expr),
      None => Err(self.stream.unexpected(what)),
    }
  }

  /// Precedence climbing: parse a term, then fold in every operator binding
  /// at least as tightly as `min_prec`, parsing each right-hand side one
  /// level tighter so equal-precedence chains associate to the left.
  fn parse_expr(&mut self, min_prec: usize) -> CompileResult<Option<ExprId>> {
    let Some(mut lhs) = self.parse_term()? else {
      return Ok(None);
    };

    while let Some(op) = self.stream.peek_operator()
      && op.precedence() >= min_prec
    {
      self.stream.advance();
      let Some(rhs) = self.parse_expr(op.precedence() + 1)? else {
        return Err(
          self
            .stream
            .unexpected(&format!("a right-hand operand for \"{}\"", op.symbol())),
        );
      };
      let position = self.ast.expr(lhs).position;
      lhs = self.ast.alloc_expr(
        ExprKind::Operation(Operation {
          left: lhs,
          op,
          right: rhs,
        }),
        position,
      )?;
    }

    Ok(Some(lhs))
  }

  fn parse_term(&mut self) -> CompileResult<Option<ExprId>> {
    let Some((leading, position)) = self.stream.peek(0).map(|t| (t.kind, t.position)) else {
      return Ok(None);
    };

    let term = match leading {
      TokenKind::IntLit => {
        let text = self.stream.peek(0).map(Token::text).unwrap_or_default().to_string();
        self.stream.advance();
        Term::IntLiteral(text)
      }
      TokenKind::Ident => Term::Identifier(self.stream.get_ident()?),
      TokenKind::Quote => {
        self.stream.advance();
        let text = match self.stream.peek(0) {
          Some(token) if token.kind == TokenKind::StrLit => token.text().to_string(),
          _ => return Err(self.stream.unexpected("a string literal")),
        };
        self.stream.advance();
        self.stream.skip(TokenKind::Quote)?;
        Term::StrLiteral(text)
      }
      TokenKind::OpenParen => {
        self.stream.advance();
        let inner = self.expect_expr("an expression after \"(\"")?;
        self.stream.skip(TokenKind::CloseParen)?;
        Term::Parenthesized(inner)
      }
      _ => return Ok(None),
    };

    self.ast.alloc_expr(ExprKind::Term(term), position).map(Some)
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self, ahead: usize) -> Option<&Token> {
    self.tokens.get(self.pos + ahead)
  }

  fn peek_kind(&self, ahead: usize) -> Option<TokenKind> {
    self.peek(ahead).map(|token| token.kind)
  }

  fn peek_operator(&self) -> Option<BinaryOp> {
    self
      .peek(0)
      .filter(|token| token.kind == TokenKind::Operator)
      .and_then(|token| BinaryOp::from_symbol(token.text()))
  }

  fn advance(&mut self) {
    self.pos += 1;
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.peek_kind(0) == Some(kind) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, kind: TokenKind) -> CompileResult<()> {
    if self.equal(kind) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("\"{}\"", kind.describe())))
    }
  }

  fn get_ident(&mut self) -> CompileResult<String> {
    if let Some(token) = self.peek(0)
      && token.kind == TokenKind::Ident
    {
      let name = token.text().to_string();
      self.pos += 1;
      return Ok(name);
    }
    Err(self.unexpected("an identifier"))
  }

  /// Position of the current token, or of the last one once input is exhausted.
  fn position(&self) -> Position {
    self
      .peek(0)
      .or_else(|| self.tokens.last())
      .map(|token| token.position)
      .unwrap_or_else(|| Position::new(1, 1))
  }

  fn unexpected(&self, expected: &str) -> CompileError {
    let got = describe_token(self.peek(0));
    CompileError::parse(
      self.position(),
      format!("expected {expected}, but got {got}"),
    )
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> CompileResult<Program> {
    parse(tokenize(source)?)
  }

  /// Render an expression fully parenthesised so tree shape is easy to assert.
  fn render(ast: &Ast, id: ExprId) -> String {
    match &ast.expr(id).kind {
      ExprKind::Term(Term::IntLiteral(text) | Term::Identifier(text)) => text.clone(),
      ExprKind::Term(Term::StrLiteral(text)) => format!("{text:?}"),
      ExprKind::Term(Term::Parenthesized(inner)) => render(ast, *inner),
      ExprKind::Operation(op) => format!(
        "({} {} {})",
        render(ast, op.left),
        op.op.symbol(),
        render(ast, op.right)
      ),
    }
  }

  fn exit_expr(source: &str) -> String {
    let program = parse_source(source).unwrap();
    match &program.ast.stmt(program.stmts[0]).kind {
      StmtKind::Exit(expr) => render(&program.ast, *expr),
      other => panic!("expected exit, got {other:?}"),
    }
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(exit_expr("exit(1 + 2 * 3);"), "(1 + (2 * 3))");
    assert_eq!(exit_expr("exit(1 * 2 + 3);"), "((1 * 2) + 3)");
  }

  #[test]
  fn equal_precedence_associates_left() {
    assert_eq!(exit_expr("exit(8 - 4 - 2);"), "((8 - 4) - 2)");
    assert_eq!(exit_expr("exit(8 / 4 * 2);"), "((8 / 4) * 2)");
  }

  #[test]
  fn parentheses_override_precedence() {
    assert_eq!(exit_expr("exit((1 + 2) * 3);"), "((1 + 2) * 3)");
  }

  #[test]
  fn statement_forms() {
    let program = parse_source(
      "let x = 1; let mut y = \"s\"; y = \"t\"; print(y); { exit(x); } while x { x = 0; }",
    )
    .unwrap();
    let kinds: Vec<_> = program.statements().map(|stmt| &stmt.kind).collect();
    assert!(matches!(kinds[0], StmtKind::Let { name, mutable: false, .. } if name == "x"));
    assert!(matches!(kinds[1], StmtKind::Let { name, mutable: true, .. } if name == "y"));
    assert!(matches!(kinds[2], StmtKind::Assign { name, .. } if name == "y"));
    assert!(matches!(kinds[3], StmtKind::Print(_)));
    assert!(matches!(kinds[4], StmtKind::Scope(scope) if scope.stmts.len() == 1));
    assert!(matches!(kinds[5], StmtKind::While { .. }));
  }

  #[test]
  fn else_if_builds_a_chain() {
    let program = parse_source("if a { } else if b { } else { exit(1); }").unwrap();
    let StmtKind::If(first) = program.ast.stmt(program.stmts[0]).kind else {
      panic!("expected if");
    };
    let Some(Else::If(second)) = program.ast.if_node(first).else_branch else {
      panic!("expected else-if");
    };
    let Some(Else::Scope(last)) = &program.ast.if_node(second).else_branch else {
      panic!("expected terminal else");
    };
    assert_eq!(last.stmts.len(), 1);
  }

  #[test]
  fn string_literal_term() {
    let program = parse_source("print(\"a\" + 1);").unwrap();
    let StmtKind::Print(expr) = program.ast.stmt(program.stmts[0]).kind else {
      panic!("expected print");
    };
    assert_eq!(render(&program.ast, expr), "(\"a\" + 1)");
  }

  #[test]
  fn nodes_carry_positions() {
    let program = parse_source("\n  let x = 4;").unwrap();
    assert_eq!(program.ast.stmt(program.stmts[0]).position, Position::new(2, 3));
  }

  #[test]
  fn missing_semicolon_is_fatal() {
    let err = parse_source("exit(1)").unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
    assert!(err.to_string().contains("\";\""));
  }

  #[test]
  fn missing_close_paren_is_fatal() {
    let err = parse_source("exit((1 + 2);").unwrap_err();
    assert_eq!(err.position(), Position::new(1, 13));
  }

  #[test]
  fn missing_right_operand_is_fatal() {
    let err = parse_source("let x = 1 + ;").unwrap_err();
    assert!(err.to_string().contains("right-hand operand"));
  }

  #[test]
  fn unclosed_scope_is_fatal() {
    let err = parse_source("{ let x = 1;").unwrap_err();
    assert!(err.to_string().contains("\"}\""));
  }

  #[test]
  fn bare_identifier_is_not_a_statement() {
    assert!(parse_source("x;").is_err());
  }

  #[test]
  fn if_without_condition_is_fatal() {
    assert!(parse_source("if { }").is_err());
    assert!(parse_source("while { }").is_err());
  }

  #[test]
  fn let_needs_an_identifier() {
    assert!(parse_source("let = 3;").is_err());
    assert!(parse_source("let mut 3 = 3;").is_err());
  }

  #[test]
  fn stray_else_is_fatal() {
    assert!(parse_source("else { }").is_err());
  }

  #[test]
  fn empty_program_is_accepted() {
    assert!(parse_source("// nothing here\n").unwrap().stmts.is_empty());
  }

  #[test]
  fn undeclared_names_pass_the_parser() {
    assert!(parse_source("exit(nope);").is_ok());
  }

  #[test]
  fn block_limit_reports_exhaustion() {
    let source = "exit(1);".repeat(crate::arena::BLOCK_CAPACITY + 1);
    let err = parse_into(tokenize(&source).unwrap(), Ast::with_block_limit(1)).unwrap_err();
    assert!(matches!(err, CompileError::ArenaExhausted { blocks: 1, .. }));
  }
}
