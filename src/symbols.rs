//! Scope-stack symbol table used by the code generator.
//!
//! Variables live in one flat list in declaration order. Each open scope
//! remembers how long that list was when it was entered, so closing it drops
//! exactly the variables it introduced.

use crate::ty::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
  pub name: String,
  pub mutable: bool,
  /// Stack depth (in slots) when the variable was declared; its first slot.
  pub slot: usize,
  pub ty: Type,
}

#[derive(Debug, Default)]
pub struct Symbols {
  vars: Vec<Var>,
  scopes: Vec<usize>,
}

impl Symbols {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin_scope(&mut self) {
    self.scopes.push(self.vars.len());
  }

  /// Close the innermost scope and return how many stack slots its variables
  /// occupied. Closing with no open scope is a no-op returning zero.
  pub fn end_scope(&mut self) -> usize {
    let Some(start) = self.scopes.pop() else {
      return 0;
    };
    let slots = self.vars[start..].iter().map(|var| var.ty.slots()).sum();
    self.vars.truncate(start);
    slots
  }

  fn current_scope(&self) -> &[Var] {
    let start = self.scopes.last().copied().unwrap_or(0);
    &self.vars[start..]
  }

  pub fn declared_in_current_scope(&self, name: &str) -> bool {
    self.current_scope().iter().any(|var| var.name == name)
  }

  pub fn declare(&mut self, name: impl Into<String>, mutable: bool, slot: usize, ty: Type) {
    self.vars.push(Var {
      name: name.into(),
      mutable,
      slot,
      ty,
    });
  }

  /// Innermost visible variable with this name.
  pub fn lookup(&self, name: &str) -> Option<&Var> {
    self.vars.iter().rev().find(|var| var.name == name)
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  pub fn scope_depth(&self) -> usize {
    self.scopes.len()
  }
}
