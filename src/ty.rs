//! Value types and on-demand expression type inference.

use crate::ast::{Ast, ExprId, ExprKind, Term};
use crate::error::{CompileError, CompileResult};
use crate::symbols::Symbols;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
  Num,
  /// A `(length, pointer)` pair.
  Str,
}

impl Type {
  /// Number of 8-byte stack slots a value of this type occupies.
  pub fn slots(self) -> usize {
    match self {
      Type::Num => 1,
      Type::Str => 2,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Type::Num => "number",
      Type::Str => "string",
    }
  }
}

/// Infer the type of `expr` against the variables currently in scope.
///
/// An operation is a string as soon as either side is; whether the operator is
/// legal on strings is checked when the operation is generated, not here.
pub fn infer_type(ast: &Ast, expr: ExprId, symbols: &Symbols) -> CompileResult<Type> {
  let node = ast.expr(expr);
  match &node.kind {
    ExprKind::Term(Term::IntLiteral(_)) => Ok(Type::Num),
    ExprKind::Term(Term::StrLiteral(_)) => Ok(Type::Str),
    ExprKind::Term(Term::Identifier(name)) => match symbols.lookup(name) {
      Some(var) => Ok(var.ty),
      None => Err(CompileError::semantic(
        node.position,
        format!("undeclared variable `{name}`"),
      )),
    },
    ExprKind::Term(Term::Parenthesized(inner)) => infer_type(ast, *inner, symbols),
    ExprKind::Operation(op) => {
      let left = infer_type(ast, op.left, symbols)?;
      let right = infer_type(ast, op.right, symbols)?;
      if left == Type::Str || right == Type::Str {
        Ok(Type::Str)
      } else {
        Ok(Type::Num)
      }
    }
  }
}
