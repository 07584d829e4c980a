//! Code generation: lower the parsed program into NASM x86-64 assembly.
//!
//! The emitter is a stack machine. Every expression leaves its value on the
//! machine stack: one slot for a number, two for a string pushed as length
//! then pointer. `stack_counter` mirrors the number of live slots so a
//! variable's address can be re-derived from `rsp` at every use.
//!
//! Name resolution, mutability and type checks happen here as statements are
//! lowered; the first violation aborts generation.

use tracing::{debug, trace};

use crate::ast::{
  Ast, BinaryOp, Else, ExprId, ExprKind, IfId, Operation, Program, Scope, StmtId, StmtKind, Term,
};
use crate::error::{CompileError, CompileResult, Position};
use crate::runtime;
use crate::symbols::Symbols;
use crate::ty::{Type, infer_type};

const WORD_SIZE: usize = 8;

const SYS_WRITE: u32 = 1;
const SYS_EXIT: u32 = 60;
const STDOUT: u32 = 1;

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut generator = Generator::new(&program.ast);
  generator.asm.push_str("section .text\n");
  generator.asm.push_str("global _start\n");
  generator.asm.push_str("_start:\n");

  for &stmt in &program.stmts {
    generator.emit_stmt(stmt)?;
  }

  let Generator {
    mut asm, literals, ..
  } = generator;

  asm.push_str("    ; default exit\n");
  asm.push_str(&format!("    mov rax, {SYS_EXIT}\n"));
  asm.push_str("    mov rdi, 0\n");
  asm.push_str("    syscall\n");
  asm.push_str(&runtime::data_section(&literals));
  asm.push_str(&runtime::routines());

  debug!(
    bytes = asm.len(),
    literals = literals.len(),
    "generated assembly"
  );
  Ok(asm)
}

/// Mutable state threaded through the recursive emitters.
struct Generator<'a> {
  ast: &'a Ast,
  asm: String,
  stack_counter: usize,
  symbols: Symbols,
  label_count: usize,
  /// Data-section label and decoded bytes of each string literal.
  literals: Vec<(String, Vec<u8>)>,
}

impl<'a> Generator<'a> {
  fn new(ast: &'a Ast) -> Self {
    Self {
      ast,
      asm: String::new(),
      stack_counter: 0,
      symbols: Symbols::new(),
      label_count: 0,
      literals: Vec::new(),
    }
  }

  fn line(&mut self, instruction: impl AsRef<str>) {
    self.asm.push_str("    ");
    self.asm.push_str(instruction.as_ref());
    self.asm.push('\n');
  }

  fn place_label(&mut self, label: &str) {
    self.asm.push_str(&format!("{label}:\n"));
  }

  fn push(&mut self, operand: &str) {
    self.line(format!("push {operand}"));
    self.stack_counter += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.line(format!("pop {reg}"));
    self.stack_counter -= 1;
  }

  /// Memory operand for stack slot `slot`, relative to the current `rsp`.
  fn slot_operand(&self, slot: usize) -> String {
    let offset = (self.stack_counter - slot - 1) * WORD_SIZE;
    format!("QWORD [rsp + {offset}]")
  }

  fn create_label(&mut self) -> String {
    let label = format!("label{}", self.label_count);
    self.label_count += 1;
    trace!(%label, "allocated label");
    label
  }

  fn begin_scope(&mut self) {
    self.symbols.begin_scope();
    trace!(depth = self.symbols.scope_depth(), "enter scope");
  }

  fn end_scope(&mut self) {
    let slots = self.symbols.end_scope();
    if slots > 0 {
      self.line(format!("add rsp, {}", slots * WORD_SIZE));
      self.stack_counter -= slots;
    }
    trace!(slots, depth = self.symbols.scope_depth(), "leave scope");
  }

  fn infer(&self, expr: ExprId) -> CompileResult<Type> {
    infer_type(self.ast, expr, &self.symbols)
  }

  fn emit_scope(&mut self, scope: &Scope) -> CompileResult<()> {
    self.line("; scope");
    self.begin_scope();
    for &stmt in &scope.stmts {
      self.emit_stmt(stmt)?;
    }
    self.end_scope();
    Ok(())
  }

  fn emit_stmt(&mut self, id: StmtId) -> CompileResult<()> {
    let ast = self.ast;
    let stmt = ast.stmt(id);
    match &stmt.kind {
      StmtKind::Exit(expr) => {
        if self.infer(*expr)? == Type::Str {
          return Err(CompileError::semantic(
            stmt.position,
            "exit code must be a number, not a string",
          ));
        }
        self.line("; exit");
        self.emit_expr(*expr)?;
        self.line(format!("mov rax, {SYS_EXIT}"));
        self.pop("rdi");
        self.line("syscall");
      }
      StmtKind::Let {
        name,
        mutable,
        value,
      } => {
        if self.symbols.declared_in_current_scope(name) {
          return Err(CompileError::semantic(
            stmt.position,
            format!("variable `{name}` is already declared in this scope"),
          ));
        }
        let ty = self.infer(*value)?;
        let slot = self.stack_counter;
        self.line(format!("; let {name}"));
        self.emit_expr(*value)?;
        self.symbols.declare(name.as_str(), *mutable, slot, ty);
      }
      StmtKind::Assign { name, value } => self.emit_assign(name, *value, stmt.position)?,
      StmtKind::Print(expr) => {
        let ty = self.infer(*expr)?;
        self.line("; print");
        self.emit_expr(*expr)?;
        match ty {
          Type::Str => {
            self.pop("rsi");
            self.pop("rdx");
          }
          Type::Num => {
            self.pop("rdi");
            self.line(format!("call {}", runtime::ITOA));
            self.line("mov rsi, rax");
          }
        }
        self.line(format!("mov rax, {SYS_WRITE}"));
        self.line(format!("mov rdi, {STDOUT}"));
        self.line("syscall");
      }
      StmtKind::Scope(scope) => self.emit_scope(scope)?,
      StmtKind::If(if_id) => self.emit_if(*if_id)?,
      StmtKind::While { condition, body } => {
        let condition_label = self.create_label();
        let skip_label = self.create_label();
        self.place_label(&condition_label);
        self.emit_condition(*condition, &skip_label)?;
        self.emit_scope(body)?;
        self.line(format!("jmp {condition_label}"));
        self.place_label(&skip_label);
      }
    }
    Ok(())
  }

  fn emit_assign(&mut self, name: &str, value: ExprId, position: Position) -> CompileResult<()> {
    let Some(var) = self.symbols.lookup(name).cloned() else {
      return Err(CompileError::semantic(
        position,
        format!("assignment to undeclared variable `{name}`"),
      ));
    };
    if !var.mutable {
      return Err(CompileError::semantic(
        position,
        format!("cannot assign twice to immutable variable `{name}`"),
      ));
    }
    let ty = self.infer(value)?;
    if ty != var.ty {
      return Err(CompileError::semantic(
        position,
        format!(
          "cannot assign a {} to `{name}`, which holds a {}",
          ty.name(),
          var.ty.name()
        ),
      ));
    }

    self.line(format!("; assign {name}"));
    self.emit_expr(value)?;
    match var.ty {
      Type::Num => {
        self.pop("rax");
        let target = self.slot_operand(var.slot);
        self.line(format!("mov {target}, rax"));
      }
      Type::Str => {
        self.pop("rax");
        self.pop("rbx");
        let pointer = self.slot_operand(var.slot + 1);
        let length = self.slot_operand(var.slot);
        self.line(format!("mov {pointer}, rax"));
        self.line(format!("mov {length}, rbx"));
      }
    }
    Ok(())
  }

  /// Evaluate `condition` and jump to `false_label` when it is falsy. A string
  /// is falsy exactly when its length is zero.
  fn emit_condition(&mut self, condition: ExprId, false_label: &str) -> CompileResult<()> {
    let ty = self.infer(condition)?;
    self.emit_expr(condition)?;
    match ty {
      Type::Num => self.pop("rax"),
      Type::Str => {
        self.pop("rbx");
        self.pop("rax");
      }
    }
    self.line("test rax, rax");
    self.line(format!("jz {false_label}"));
    Ok(())
  }

  fn emit_if(&mut self, id: IfId) -> CompileResult<()> {
    let ast = self.ast;
    let node = ast.if_node(id);
    let skip_label = self.create_label();
    let else_label = node.else_branch.as_ref().map(|_| self.create_label());

    self.line("; if");
    let false_label = else_label.as_deref().unwrap_or(&skip_label).to_string();
    self.emit_condition(node.condition, &false_label)?;
    self.emit_scope(&node.body)?;
    self.line(format!("jmp {skip_label}"));

    if let (Some(else_label), Some(branch)) = (else_label, &node.else_branch) {
      self.place_label(&else_label);
      match branch {
        Else::If(nested) => self.emit_if(*nested)?,
        Else::Scope(scope) => self.emit_scope(scope)?,
      }
      self.line(format!("jmp {skip_label}"));
    }

    self.place_label(&skip_label);
    Ok(())
  }

  /// Emit stack-based code for a single expression node.
  fn emit_expr(&mut self, id: ExprId) -> CompileResult<()> {
    let ast = self.ast;
    let expr = ast.expr(id);
    match &expr.kind {
      ExprKind::Term(term) => self.emit_term(term, expr.position),
      ExprKind::Operation(op) => self.emit_operation(op, expr.position),
    }
  }

  fn emit_term(&mut self, term: &Term, position: Position) -> CompileResult<()> {
    match term {
      Term::IntLiteral(text) => {
        self.line(format!("mov rax, {text}"));
        self.push("rax");
      }
      Term::StrLiteral(raw) => {
        let bytes = runtime::decode_literal(raw);
        let label = format!("str_{}", self.literals.len());
        self.line(format!("mov rax, {}", bytes.len()));
        self.push("rax");
        self.line(format!("lea rax, [rel {label}]"));
        self.push("rax");
        self.literals.push((label, bytes));
      }
      Term::Identifier(name) => {
        let Some(var) = self.symbols.lookup(name).cloned() else {
          return Err(CompileError::semantic(
            position,
            format!("undeclared variable `{name}`"),
          ));
        };
        for slot in var.slot..var.slot + var.ty.slots() {
          let operand = self.slot_operand(slot);
          self.push(&operand);
        }
      }
      Term::Parenthesized(inner) => self.emit_expr(*inner)?,
    }
    Ok(())
  }

  fn emit_operation(&mut self, operation: &Operation, position: Position) -> CompileResult<()> {
    let left = self.infer(operation.left)?;
    let right = self.infer(operation.right)?;

    if left == Type::Str || right == Type::Str {
      if operation.op != BinaryOp::Add {
        return Err(CompileError::semantic(
          position,
          format!("operator `{}` cannot be applied to a string", operation.op.symbol()),
        ));
      }
      return self.emit_concat(operation, left, right);
    }

    self.emit_expr(operation.left)?;
    self.emit_expr(operation.right)?;
    self.pop("rbx");
    self.pop("rax");
    match operation.op {
      BinaryOp::Add => self.line("add rax, rbx"),
      BinaryOp::Sub => self.line("sub rax, rbx"),
      BinaryOp::Mul => self.line("imul rax, rbx"),
      BinaryOp::Div => {
        self.line("cqo");
        self.line("idiv rbx");
      }
    }
    self.push("rax");
    Ok(())
  }

  /// Concatenate two operands, converting whichever side is a number to its
  /// decimal text first. The right operand is parked in `r8`/`r9` while the
  /// left one is popped.
  fn emit_concat(&mut self, operation: &Operation, left: Type, right: Type) -> CompileResult<()> {
    self.line("; concat");
    self.emit_expr(operation.left)?;
    self.emit_expr(operation.right)?;

    match right {
      Type::Str => {
        self.pop("r8");
        self.pop("r9");
      }
      Type::Num => {
        self.pop("rdi");
        self.line(format!("call {}", runtime::ITOA));
        self.line("mov r8, rax");
        self.line("mov r9, rdx");
      }
    }
    match left {
      Type::Str => {
        self.pop("rdi");
        self.pop("rsi");
      }
      Type::Num => {
        self.pop("rdi");
        self.line(format!("call {}", runtime::ITOA));
        self.line("mov rdi, rax");
        self.line("mov rsi, rdx");
      }
    }
    self.line("mov rdx, r8");
    self.line("mov rcx, r9");
    self.line(format!("call {}", runtime::CONCAT));
    self.push("rdx");
    self.push("rax");
    Ok(())
  }
}
