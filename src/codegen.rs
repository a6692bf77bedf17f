//! Code generation: lower the optimized AST into a Windows batch program.
//!
//! Batch has no expression stack and no call stack, so the emitter runs a
//! stack machine at compile time instead: every expression emits the lines
//! that compute it and then pushes one [`Operand`] naming where its value
//! lives. Consumers pop operands and splice their text into the lines they
//! emit. Intermediate values live in generated `__N` variables and are read
//! back through delayed expansion (`!__N!`).
//!
//! Functions become labels entered with `call :name result args...`. The body
//! runs between `setlocal` and `endlocal`, and the result is written into the
//! caller's variable named by `%1` on the same line as `endlocal`.
//!
//! Lines are collected into three segments (`init`, `decl`, `code`) that are
//! concatenated in that order no matter when each line was emitted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use crate::CompileOptions;
use crate::ast::{BinaryOp, Node, NodeKind, StepOp};
use crate::builtins::BuiltinRegistry;
use crate::error::{
  CompileError, CompileResult, InIncludeSnafu, IncludeReadSnafu, Location,
};
use crate::scope::{Operand, OperandType, ScopeChain, VarName, VarType, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
  Init,
  Decl,
  Code,
}

/// Append-only line buffers, one per segment.
#[derive(Debug, Default, Clone)]
pub struct Segments {
  init: Vec<String>,
  decl: Vec<String>,
  code: Vec<String>,
}

impl Segments {
  fn lines_mut(&mut self, segment: Segment) -> &mut Vec<String> {
    match segment {
      Segment::Init => &mut self.init,
      Segment::Decl => &mut self.decl,
      Segment::Code => &mut self.code,
    }
  }

  /// `init`, `decl` and `code`, each newline-joined, in that order.
  pub fn assemble(&self) -> String {
    format!(
      "{}\n{}\n{}\n",
      self.init.join("\n"),
      self.decl.join("\n"),
      self.code.join("\n")
    )
  }
}

/// Temp and label counters. Included units continue from the includer's values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NameCounters {
  pub temps: usize,
  pub labels: usize,
}

/// What an include hands back to the unit that included it.
struct IncludedUnit {
  segments: Segments,
  exports: Vec<(String, Variable)>,
  counters: NameCounters,
  emitted_builtins: HashMap<&'static str, Variable>,
}

pub struct Generator<'a> {
  source: &'a str,
  options: &'a CompileOptions,
  builtins: &'a BuiltinRegistry,
  base_dir: PathBuf,
  include_depth: usize,
  segments: Segments,
  scope: ScopeChain,
  stack: Vec<Operand>,
  counters: NameCounters,
  emitted_builtins: HashMap<&'static str, Variable>,
}

impl<'a> Generator<'a> {
  pub fn new(
    source: &'a str,
    options: &'a CompileOptions,
    builtins: &'a BuiltinRegistry,
  ) -> Self {
    Self {
      source,
      options,
      builtins,
      base_dir: options.base_dir.clone(),
      include_depth: 0,
      segments: Segments::default(),
      scope: ScopeChain::new(),
      stack: Vec::new(),
      counters: NameCounters::default(),
      emitted_builtins: HashMap::new(),
    }
  }

  /// Directory that relative include paths are resolved against.
  pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
    self.base_dir = base_dir.into();
    self
  }

  pub fn generate(&mut self, program: &Node) -> CompileResult<()> {
    self.gen_stmt(program)
  }

  /// Final program text.
  pub fn code(&self) -> String {
    self.segments.assemble()
  }

  pub fn counters(&self) -> NameCounters {
    self.counters
  }

  pub fn emit(&mut self, line: impl Into<String>) {
    self.emit_to(Segment::Code, line);
  }

  pub fn emit_to(&mut self, segment: Segment, line: impl Into<String>) {
    self.segments.lines_mut(segment).push(line.into());
  }

  /// Fresh compiler variable. Temps are never bound in a scope.
  pub fn temp_var(&mut self, ty: VarType) -> Variable {
    self.counters.temps += 1;
    Variable::named(format!("__{}", self.counters.temps), ty)
  }

  pub fn label(&mut self) -> String {
    self.counters.labels += 1;
    format!("lbl{}", self.counters.labels)
  }

  fn location(&self, loc: usize) -> Location {
    Location::at(self.source, loc)
  }

  fn push(&mut self, operand: Operand) {
    self.stack.push(operand);
  }

  /// Generate `node` as a statement; whatever value it leaves behind is dropped.
  fn gen_stmt(&mut self, node: &Node) -> CompileResult<()> {
    let depth = self.stack.len();
    self.gen_node(node)?;
    self.stack.truncate(depth);
    Ok(())
  }

  fn gen_block(&mut self, body: &[Node]) -> CompileResult<()> {
    body.iter().try_for_each(|stmt| self.gen_stmt(stmt))
  }

  /// Generate `node` and pop the operand it pushed.
  fn eval(&mut self, node: &Node) -> CompileResult<Operand> {
    let depth = self.stack.len();
    self.gen_node(node)?;
    let operand = if self.stack.len() > depth {
      self.stack.pop()
    } else {
      None
    };
    self.stack.truncate(depth);
    operand.ok_or_else(|| CompileError::MissingValue {
      location: self.location(node.loc),
      construct: node.construct(),
    })
  }

  fn eval_deref(&mut self, node: &Node) -> CompileResult<Operand> {
    let operand = self.eval(node)?;
    Ok(self.deref(operand))
  }

  /// Materialise a reference into a fresh text variable; other operands pass through.
  fn deref(&mut self, operand: Operand) -> Operand {
    if operand.ty != OperandType::Reference {
      return operand;
    }
    let temp = self.temp_var(VarType::Text);
    self.emit(format!(
      "call set \"{}=%%{}%%\"",
      var_name(&temp),
      operand.text
    ));
    Operand::var(temp)
  }

  fn gen_node(&mut self, node: &Node) -> CompileResult<()> {
    match &node.kind {
      NodeKind::Program { body } => {
        self.emit_to(Segment::Init, "@echo off");
        self.emit_to(Segment::Init, "setlocal enabledelayedexpansion");
        self.gen_block(body)
      }
      NodeKind::Integer(value) => {
        self.push(Operand::integer(*value));
        Ok(())
      }
      NodeKind::Str(value) => {
        self.push(Operand::text(escape_text(value)));
        Ok(())
      }
      NodeKind::Identifier(name) => {
        let var = self.resolve(name, node)?;
        self.push(Operand::var(var));
        Ok(())
      }
      NodeKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs),
      NodeKind::LogicAnd { lhs, rhs } => self.gen_logic_and(lhs, rhs),
      NodeKind::LogicOr { lhs, rhs } => self.gen_logic_or(lhs, rhs),
      NodeKind::Assign { target, value } => self.gen_assign(target, value),
      NodeKind::If {
        cond,
        then_body,
        else_body,
      } => self.gen_if(cond, then_body, else_body),
      NodeKind::Ternary {
        cond,
        then_expr,
        else_expr,
      } => self.gen_ternary(cond, then_expr, else_expr),
      NodeKind::While { cond, body } => self.gen_while(cond, body),
      NodeKind::Function { name, params, body } => {
        self.gen_function(node, name.as_deref(), params, body)
      }
      NodeKind::Call { callee, args } => self.gen_call(node, callee, args),
      NodeKind::Return { value } => self.gen_return(value),
      NodeKind::Step { op, target, .. } => self.gen_step(*op, target),
      NodeKind::Array { elements } => self.gen_array(elements),
      NodeKind::Index { base, index } => {
        let base = self.eval(base)?;
        let index = self.eval_deref(index)?;
        let base = self.deref(base);
        self.push(Operand::reference(format!("{}.{}", base.text, index.text)));
        Ok(())
      }
    }
  }

  /// Scope chain first, then the builtin table.
  fn resolve(&mut self, name: &str, node: &Node) -> CompileResult<Variable> {
    if let Some(var) = self.scope.lookup(name) {
      return Ok(var.clone());
    }

    if let Some(var) = self.emitted_builtins.get(name).cloned() {
      return Ok(self.scope.declare(name, var));
    }

    let registry = self.builtins;
    if let Some(builtin) = registry.get(name) {
      debug!(builtin = builtin.name, "emitting builtin setup");
      let var = Variable {
        ty: builtin.ty,
        ..(builtin.setup)(self)
      };
      self.emitted_builtins.insert(builtin.name, var.clone());
      return Ok(self.scope.declare(name, var));
    }

    Err(CompileError::UnresolvedIdentifier {
      location: self.location(node.loc),
      name: name.to_string(),
    })
  }

  /// Reject user names shaped like `__N`, `__after_F` or `lblN`.
  fn check_user_name(&self, name: &str, node: &Node) -> CompileResult<()> {
    if is_generated_name(name) {
      return Err(CompileError::ReservedName {
        location: self.location(node.loc),
        name: name.to_string(),
      });
    }
    Ok(())
  }

  fn gen_binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    if op.is_comparison() {
      return self.gen_comparison(op, lhs, rhs);
    }

    let a = self.eval(lhs)?;
    let b = self.eval(rhs)?;
    let b = self.deref(b);
    let a = self.deref(a);

    if op == BinaryOp::Add {
      let temp = self.temp_var(VarType::join(&[a.value_type(), b.value_type()]));
      let line = if a.is_integer() && b.is_integer() {
        format!("set /a \"{}={}+{}\"", var_name(&temp), a.text, b.text)
      } else {
        format!("set \"{}={}{}\"", var_name(&temp), a.text, b.text)
      };
      self.emit(line);
      self.push(Operand::var(temp));
      return Ok(());
    }

    let ty = if op.is_bitwise() {
      VarType::Integer
    } else {
      VarType::join(&[a.value_type(), b.value_type()])
    };
    let temp = self.temp_var(ty);
    self.emit(format!(
      "set /a \"{}={}{}{}\"",
      var_name(&temp),
      a.text,
      arithmetic_symbol(op),
      b.text
    ));
    self.push(Operand::var(temp));
    Ok(())
  }

  /// `<` evaluates its right operand first; the other comparisons go left to right.
  fn gen_comparison(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    let (a, b, temp) = if op == BinaryOp::Lt {
      let b = self.eval(rhs)?;
      let a = self.eval(lhs)?;
      let temp = self.temp_var(VarType::Integer);
      let a = self.deref(a);
      let b = self.deref(b);
      (a, b, temp)
    } else {
      let a = self.eval(lhs)?;
      let b = self.eval(rhs)?;
      let temp = self.temp_var(VarType::Integer);
      let b = self.deref(b);
      let a = self.deref(a);
      (a, b, temp)
    };

    let t = var_name(&temp);
    self.emit(format!(
      "if {} {} {} (set /a {t}=1) else (set /a {t}=0)",
      a.text,
      comparison_keyword(op),
      b.text
    ));
    self.push(Operand::var(temp));
    Ok(())
  }

  /// Guard only: the right side runs when the left is non-zero. No value is produced.
  fn gen_logic_and(&mut self, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    let cond = self.eval_deref(lhs)?;
    self.emit(format!("if {} neq 0 (", cond.text));
    self.gen_stmt(rhs)?;
    self.emit(")");
    Ok(())
  }

  fn gen_logic_or(&mut self, lhs: &Node, rhs: &Node) -> CompileResult<()> {
    let temp = self.temp_var(VarType::Integer);
    let t = var_name(&temp);

    let cond = self.eval_deref(lhs)?;
    self.emit(format!("set /a {t}=0"));
    self.emit(format!("if {} neq 0 (", cond.text));
    self.emit(format!("set /a {t}=1"));
    self.emit(") else (");
    let other = self.eval_deref(rhs)?;
    self.emit(format!("if {} neq 0 (", other.text));
    self.emit(format!("set /a {t}=1"));
    self.emit(")");
    self.emit(")");

    self.push(Operand::var(temp));
    Ok(())
  }

  fn gen_assign(&mut self, target: &Node, value: &Node) -> CompileResult<()> {
    let value = self.eval_deref(value)?;

    let name = match &target.kind {
      NodeKind::Identifier(ident) => match self.scope.lookup(ident) {
        None => {
          self.check_user_name(ident, target)?;
          let var = Variable::named(ident.clone(), value.value_type());
          self.scope.declare(ident.clone(), var);
          ident.clone()
        }
        Some(var) => match var.target() {
          Some(name) => name.to_string(),
          None => {
            return Err(CompileError::NotAssignable {
              location: self.location(target.loc),
              what: format!("parameter `{ident}`"),
            });
          }
        },
      },
      NodeKind::Index { .. } => self.eval(target)?.text,
      _ => {
        return Err(CompileError::NotAssignable {
          location: self.location(target.loc),
          what: target.construct().to_string(),
        });
      }
    };

    let switch = if value.is_integer() { " /a" } else { "" };
    self.emit(format!("set{switch} \"{name}={}\"", value.text));
    self.push(value);
    Ok(())
  }

  fn gen_if(&mut self, cond: &Node, then_body: &[Node], else_body: &[Node]) -> CompileResult<()> {
    let cond = self.eval_deref(cond)?;
    self.emit(format!("if {} neq 0 (", cond.text));
    self.gen_block(then_body)?;
    if !else_body.is_empty() {
      self.emit(") else (");
      self.gen_block(else_body)?;
    }
    self.emit(")");
    Ok(())
  }

  fn gen_ternary(&mut self, cond: &Node, then_expr: &Node, else_expr: &Node) -> CompileResult<()> {
    let cond = self.eval_deref(cond)?;
    let temp = self.temp_var(VarType::Text);
    let t = var_name(&temp);

    self.emit(format!("if {} neq 0 (", cond.text));
    let a = self.eval_deref(then_expr)?;
    self.emit(format!("set \"{t}={}\"", a.text));
    self.emit(") else (");
    let b = self.eval_deref(else_expr)?;
    self.emit(format!("set \"{t}={}\"", b.text));
    self.emit(")");

    let ty = if a.is_integer() && b.is_integer() {
      VarType::Integer
    } else {
      VarType::Text
    };
    self.push(Operand::var(Variable { ty, ..temp }));
    Ok(())
  }

  fn gen_while(&mut self, cond: &Node, body: &[Node]) -> CompileResult<()> {
    let label = self.label();
    self.emit(format!(":{label}"));
    let cond = self.eval_deref(cond)?;
    self.emit(format!("if {} neq 0 (", cond.text));
    self.gen_block(body)?;
    self.emit(format!("goto :{label}"));
    self.emit(")");
    Ok(())
  }

  fn gen_function(
    &mut self,
    node: &Node,
    name: Option<&str>,
    params: &[String],
    body: &[Node],
  ) -> CompileResult<()> {
    // Anonymous functions are reachable only through the value they produce.
    let name = match name {
      Some(name) => {
        self.check_user_name(name, node)?;
        self.scope.declare(name, Variable::named(name, VarType::Text));
        name.to_string()
      }
      None => var_name(&self.temp_var(VarType::Text)),
    };
    self.scope.enter();

    self.emit_to(Segment::Decl, format!("set {name}={name}"));
    self.emit(format!("goto :__after_{name}"));
    self.emit(format!(":{name}"));
    self.emit("setlocal");

    // %1 names the caller's result variable; arguments start at %2.
    for (slot, param) in (2..).zip(params) {
      self.scope.declare(param.clone(), Variable::slot(slot, VarType::Text));
    }

    let body_result = self.gen_block(body);
    self.scope.leave();
    body_result?;

    if !body.last().is_some_and(Node::is_return) {
      self.emit("endlocal & (set %1=0)");
      self.emit("exit /b");
    }
    self.emit(format!(":__after_{name}"));

    self.push(Operand::text(name));
    Ok(())
  }

  fn gen_call(&mut self, node: &Node, callee: &Node, args: &[Node]) -> CompileResult<()> {
    if matches!(&callee.kind, NodeKind::Identifier(name) if name == "include") {
      return self.include(node, args);
    }

    let callee = self.eval_deref(callee)?;
    let values = args
      .iter()
      .map(|arg| self.eval(arg))
      .collect::<CompileResult<Vec<_>>>()?;

    // Dereference last-to-first, as if popping the arguments off the stack.
    let mut rendered = Vec::with_capacity(values.len());
    for value in values.into_iter().rev() {
      let value = self.deref(value);
      rendered.push(match value.ty {
        OperandType::Integer => value.text,
        _ => format!("\"{}\"", value.text),
      });
    }
    rendered.reverse();

    let temp = self.temp_var(VarType::Text);
    let mut line = format!("call :{} {}", callee.text, var_name(&temp));
    for arg in &rendered {
      line.push(' ');
      line.push_str(arg);
    }
    self.emit(line);
    self.push(Operand::var(temp));
    Ok(())
  }

  fn gen_return(&mut self, value: &Node) -> CompileResult<()> {
    let value = self.eval_deref(value)?;
    let rendered = match &value.var {
      Some(var) => var.render_immediate(),
      None => value.text.clone(),
    };
    let switch = if value.is_integer() { " /a" } else { "" };

    self.emit("endlocal & (");
    self.emit(format!("set{switch} %1={rendered}"));
    self.emit(")");
    self.emit("exit /b");
    Ok(())
  }

  /// Both prefix and postfix forms yield the value from before the update.
  fn gen_step(&mut self, op: StepOp, target: &Node) -> CompileResult<()> {
    let operand = self.eval(target)?;
    let name = match (&operand.ty, &operand.var) {
      (OperandType::Reference, _) => operand.text.clone(),
      (_, Some(var)) if var.target().is_some() => var_name(var),
      (_, Some(_)) => {
        return Err(CompileError::NotAssignable {
          location: self.location(target.loc),
          what: match &target.kind {
            NodeKind::Identifier(ident) => format!("parameter `{ident}`"),
            _ => target.construct().to_string(),
          },
        });
      }
      (_, None) => {
        return Err(CompileError::NotAssignable {
          location: self.location(target.loc),
          what: target.construct().to_string(),
        });
      }
    };

    let current = self.deref(operand);
    let temp = self.temp_var(VarType::Integer);
    let delta = match op {
      StepOp::Inc => "+1",
      StepOp::Dec => "-1",
    };
    self.emit(format!("set /a \"{}={}\"", var_name(&temp), current.text));
    self.emit(format!("set /a \"{name}={}{delta}\"", current.text));
    self.push(Operand::var(temp));
    Ok(())
  }

  fn gen_array(&mut self, elements: &[Node]) -> CompileResult<()> {
    let handle = self.temp_var(VarType::Text);
    let h = var_name(&handle);
    self.emit(format!("set \"{h}={h}\""));

    for (index, element) in elements.iter().enumerate() {
      let value = self.eval_deref(element)?;
      self.emit(format!("set \"{h}.{index}={}\"", value.text));
    }
    self.emit(format!("set \"{h}.length={}\"", elements.len()));

    self.push(Operand::var(handle));
    Ok(())
  }

  /// Compile another file as its own unit and splice it in at this point.
  fn include(&mut self, node: &Node, args: &[Node]) -> CompileResult<()> {
    let [arg] = args else {
      return Err(CompileError::IncludeArgument {
        location: self.location(node.loc),
        message: format!("include expects exactly one argument, got {}", args.len()),
      });
    };
    let NodeKind::Str(relative) = &arg.kind else {
      return Err(CompileError::IncludeArgument {
        location: self.location(arg.loc),
        message: "include expects a string literal path".to_string(),
      });
    };

    let limit = self.options.max_include_depth;
    if self.include_depth >= limit {
      return Err(CompileError::IncludeDepth {
        location: self.location(node.loc),
        limit,
      });
    }

    let path = self.base_dir.join(relative);
    debug!(path = %path.display(), depth = self.include_depth + 1, "including unit");
    let source = fs::read_to_string(&path).context(IncludeReadSnafu { path: path.clone() })?;

    let unit = self
      .compile_included(&source, &path)
      .context(InIncludeSnafu { path: path.clone() })?;

    self.counters = unit.counters;
    self.emitted_builtins = unit.emitted_builtins;
    let Segments { decl, code, .. } = unit.segments;
    self.segments.decl.extend(decl);
    self.segments.code.extend(code);
    for (name, var) in unit.exports {
      self.scope.declare(name, var);
    }

    self.push(Operand::text("include"));
    Ok(())
  }

  fn compile_included(&self, source: &str, path: &Path) -> CompileResult<IncludedUnit> {
    let program = crate::front_end(source, self.options)?;
    let base_dir = path
      .parent()
      .map_or_else(|| self.base_dir.clone(), Path::to_path_buf);

    let mut nested = Generator::new(source, self.options, self.builtins).with_base_dir(base_dir);
    nested.include_depth = self.include_depth + 1;
    nested.counters = self.counters;
    nested.emitted_builtins = self.emitted_builtins.clone();
    nested.generate(&program)?;

    let exports = nested
      .scope
      .root()
      .variables()
      .map(|(name, var)| (name.clone(), var.clone()))
      .collect();
    Ok(IncludedUnit {
      segments: nested.segments,
      exports,
      counters: nested.counters,
      emitted_builtins: nested.emitted_builtins,
    })
  }
}

fn is_generated_name(name: &str) -> bool {
  name.starts_with("__")
    || name
      .strip_prefix("lbl")
      .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Bare variable name for the left-hand side of `set`.
fn var_name(var: &Variable) -> String {
  match &var.name {
    VarName::Named(name) => name.clone(),
    VarName::Slot(index) => index.to_string(),
  }
}

fn arithmetic_symbol(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "+",
    BinaryOp::Sub => "-",
    BinaryOp::Mul => "*",
    BinaryOp::Div => "/",
    BinaryOp::Mod => "%%",
    BinaryOp::BitAnd => "&",
    BinaryOp::BitOr => "|",
    BinaryOp::BitXor => "^",
    BinaryOp::Shl => "<<",
    BinaryOp::Shr => ">>",
    BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
      comparison_keyword(op)
    }
  }
}

fn comparison_keyword(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Eq => "equ",
    BinaryOp::Ne => "neq",
    BinaryOp::Lt => "lss",
    BinaryOp::Le => "leq",
    BinaryOp::Gt => "gtr",
    BinaryOp::Ge => "geq",
    _ => arithmetic_symbol(op),
  }
}

/// Caret-escape everything outside `[A-Za-z0-9 ]`; `!` needs a second caret
/// because delayed expansion consumes one.
pub fn escape_text(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '!' => escaped.push_str("^^!"),
      c if c.is_ascii_alphanumeric() || c == ' ' => escaped.push(c),
      c => {
        escaped.push('^');
        escaped.push(c);
      }
    }
  }
  escaped
}
