//! Code generation: lower the AST into AT&T 32-bit x86 assembly.
//!
//! Expressions use an accumulator stack machine. Every expression leaves its
//! value in `%eax`; a binary operator parks its left operand on the runtime
//! stack while the right one is evaluated, then pops it into `%ebx`. Locals
//! live below `%ebp` at the offsets handed out by the symbol table.
//!
//! Lowering never validates the program. An identifier missing from the
//! symbol table is either recorded as a diagnostic and addressed through
//! offset 0, or aborts the unit, depending on [`UnresolvedPolicy`].

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use snafu::ResultExt;
use tracing::{debug, warn};

use crate::ast::{BinaryOp, Node, NodeList};
use crate::config::{Options, UnresolvedPolicy};
use crate::error::{
  CompileResult, OpenOutputSnafu, UnresolvedIdentifierSnafu, WriteOutputSnafu,
};
use crate::label::LabelAllocator;
use crate::symbol::SymbolTable;

/// A name that could not be resolved while lowering a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub function: String,
  pub name: String,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "error: variable '{}' not declared (in function '{}')",
      self.name, self.function
    )
  }
}

/// Generated assembly text plus whatever diagnostics were raised on the way.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
  pub text: String,
  pub diagnostics: Vec<Diagnostic>,
}

/// Emit assembly for a whole program.
pub fn generate(program: &Node, options: &Options) -> CompileResult<Assembly> {
  let mut codegen = Codegen::new(options.unresolved);
  codegen.emit_stmt(program)?;
  Ok(codegen.finish())
}

/// Emit assembly for `program` into the file at `path`.
///
/// The file is opened before anything is generated; if that fails nothing is
/// emitted. Returns the diagnostics so the caller can report them.
pub fn write_assembly(
  program: &Node,
  path: &Path,
  options: &Options,
) -> CompileResult<Vec<Diagnostic>> {
  let mut file = File::create(path).context(OpenOutputSnafu { path })?;
  let assembly = generate(program, options)?;
  file
    .write_all(assembly.text.as_bytes())
    .and_then(|()| file.flush())
    .context(WriteOutputSnafu { path })?;
  Ok(assembly.diagnostics)
}

/// Compilation context threaded through every lowering call.
///
/// Labels are shared by the whole compilation; the symbol table is
/// repopulated per function and cleared once its body is done.
struct Codegen {
  policy: UnresolvedPolicy,
  labels: LabelAllocator,
  symbols: SymbolTable,
  function: String,
  asm: String,
  diagnostics: Vec<Diagnostic>,
}

impl Codegen {
  fn new(policy: UnresolvedPolicy) -> Self {
    Self {
      policy,
      labels: LabelAllocator::new(),
      symbols: SymbolTable::new(),
      function: String::new(),
      asm: String::new(),
      diagnostics: Vec::new(),
    }
  }

  fn finish(self) -> Assembly {
    Assembly {
      text: self.asm,
      diagnostics: self.diagnostics,
    }
  }

  fn emit(&mut self, instruction: &str) {
    self.asm.push_str("  ");
    self.asm.push_str(instruction);
    self.asm.push('\n');
  }

  fn emit_label(&mut self, label: impl fmt::Display) {
    self.asm.push_str(&format!("{label}:\n"));
  }

  /// The entry symbol is the function's own name, so a function not called
  /// `main` is exported under that name rather than as `main`.
  fn emit_function(
    &mut self,
    name: &str,
    declarations: &NodeList,
    statements: &NodeList,
  ) -> CompileResult<()> {
    self.function = name.to_string();

    self.asm.push_str(&format!(".globl {name}\n"));
    self.emit_label(name);
    self.emit("pushl %ebp");
    self.emit("movl %esp, %ebp");

    let frame_size = self.symbols.assign_offsets(declarations);
    if frame_size > 0 {
      self.emit(&format!("subl ${frame_size}, %esp"));
    }
    debug!(
      function = name,
      declarations = self.symbols.len(),
      frame_size,
      "emitted prologue"
    );

    self.emit_stmts(statements)?;

    // Only reached when control falls off the end of the body.
    self.emit("movl $0, %eax");
    self.emit_epilogue();

    debug!(function = name, labels = self.labels.issued(), "emitted function");
    self.symbols.clear();
    Ok(())
  }

  fn emit_epilogue(&mut self) {
    self.emit("movl %ebp, %esp");
    self.emit("popl %ebp");
    self.emit("ret");
  }

  fn emit_stmts(&mut self, list: &NodeList) -> CompileResult<()> {
    list.iter().try_for_each(|stmt| self.emit_stmt(stmt))
  }

  fn emit_stmt(&mut self, node: &Node) -> CompileResult<()> {
    match node {
      Node::Program { function } => self.emit_stmt(function)?,
      Node::Function {
        name,
        declarations,
        statements,
      } => self.emit_function(name, declarations, statements)?,
      // Slots are assigned in the prologue.
      Node::Declaration { .. } => {}
      Node::Return { expr } => {
        self.emit_expr(expr)?;
        self.emit_epilogue();
      }
      Node::ExprStmt { expr } => self.emit_expr(expr)?,
      Node::If {
        cond,
        then_body,
        else_body: None,
      } => {
        let end = self.labels.fresh();
        self.emit_expr(cond)?;
        self.emit("cmpl $0, %eax");
        self.emit(&format!("je {end}"));
        self.emit_stmts(then_body)?;
        self.emit_label(end);
      }
      Node::If {
        cond,
        then_body,
        else_body: Some(else_body),
      } => {
        let otherwise = self.labels.fresh();
        let end = self.labels.fresh();
        self.emit_expr(cond)?;
        self.emit("cmpl $0, %eax");
        self.emit(&format!("je {otherwise}"));
        self.emit_stmts(then_body)?;
        self.emit(&format!("jmp {end}"));
        self.emit_label(otherwise);
        self.emit_stmts(else_body)?;
        self.emit_label(end);
      }
      Node::While { cond, body } => {
        let start = self.labels.fresh();
        let end = self.labels.fresh();
        self.emit_label(start);
        self.emit_expr(cond)?;
        self.emit("cmpl $0, %eax");
        self.emit(&format!("je {end}"));
        self.emit_stmts(body)?;
        self.emit(&format!("jmp {start}"));
        self.emit_label(end);
      }
      Node::Number { .. } | Node::Identifier { .. } | Node::Binary { .. } | Node::Assign { .. } => {
        self.emit_expr(node)?
      }
    }
    Ok(())
  }

  /// Evaluate `node` into `%eax`.
  fn emit_expr(&mut self, node: &Node) -> CompileResult<()> {
    match node {
      Node::Number { value } => self.emit(&format!("movl ${value}, %eax")),
      Node::Identifier { name } => {
        let offset = self.resolve(name)?;
        self.emit(&format!("movl {offset}(%ebp), %eax"));
      }
      Node::Binary { .. } => self.emit_binary_chain(node)?,
      Node::Assign { name, expr } => {
        self.emit_expr(expr)?;
        let offset = self.resolve(name)?;
        self.emit(&format!("movl %eax, {offset}(%ebp)"));
      }
      other => warn!(
        kind = other.kind(),
        function = %self.function,
        "statement node in expression position, nothing emitted"
      ),
    }
    Ok(())
  }

  /// Lower a run of binary operators nested down their left operands.
  ///
  /// Left-associative chains grow along the left spine, so the spine is
  /// walked with an explicit stack; only right operands recurse.
  fn emit_binary_chain(&mut self, node: &Node) -> CompileResult<()> {
    let mut spine = Vec::new();
    let mut leftmost = node;
    while let Node::Binary { op, lhs, rhs } = leftmost {
      spine.push((*op, rhs.as_ref()));
      leftmost = lhs;
    }

    self.emit_expr(leftmost)?;
    for (op, rhs) in spine.into_iter().rev() {
      self.emit("pushl %eax");
      self.emit_expr(rhs)?;
      self.emit("popl %ebx");
      self.emit_operator(op);
    }
    Ok(())
  }

  /// Combine left (`%ebx`) and right (`%eax`) into `%eax`.
  fn emit_operator(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.emit("addl %ebx, %eax"),
      BinaryOp::Mul => self.emit("imull %ebx, %eax"),
      BinaryOp::Sub => {
        self.emit("subl %eax, %ebx");
        self.emit("movl %ebx, %eax");
      }
      BinaryOp::Div => {
        self.emit("xchgl %eax, %ebx");
        self.emit("cdq");
        self.emit("idivl %ebx");
      }
      BinaryOp::Eq => self.emit_compare("sete"),
      BinaryOp::Ne => self.emit_compare("setne"),
      BinaryOp::Lt => self.emit_compare("setl"),
      BinaryOp::Gt => self.emit_compare("setg"),
    }
  }

  /// Compare left (`%ebx`) against right (`%eax`) and widen the flag to 0/1.
  fn emit_compare(&mut self, set: &str) {
    self.emit("cmpl %eax, %ebx");
    self.emit(&format!("{set} %al"));
    self.emit("movzbl %al, %eax");
  }

  fn resolve(&mut self, name: &str) -> CompileResult<i32> {
    if let Some(offset) = self.symbols.lookup(name) {
      return Ok(offset);
    }

    match self.policy {
      UnresolvedPolicy::Abort => UnresolvedIdentifierSnafu {
        name,
        function: self.function.as_str(),
      }
      .fail(),
      UnresolvedPolicy::Continue => {
        // The diagnostic itself is reported by the caller.
        debug!(identifier = name, function = %self.function, "undeclared variable, using offset 0");
        self.diagnostics.push(Diagnostic {
          function: self.function.clone(),
          name: name.to_string(),
        });
        Ok(0)
      }
    }
  }
}
