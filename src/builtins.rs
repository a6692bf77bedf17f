//! Compile-time table of late-bound globals.
//!
//! An identifier that is not found in any scope is looked up here. The first
//! hit in a generator runs the builtin's setup, which may append one-time
//! initialisation to the `decl` segment and returns the variable the name is
//! bound to. Later hits in the same generator reuse that variable.

use std::collections::HashMap;
use std::fmt;

use crate::codegen::{Generator, Segment};
use crate::scope::{VarType, Variable};

pub type SetupFn = fn(&mut Generator<'_>) -> Variable;

#[derive(Clone, Copy)]
pub struct Builtin {
  pub name: &'static str,
  pub ty: VarType,
  pub setup: SetupFn,
}

impl fmt::Debug for Builtin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Builtin")
      .field("name", &self.name)
      .field("ty", &self.ty)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
  table: HashMap<&'static str, Builtin>,
}

impl BuiltinRegistry {
  pub fn empty() -> Self {
    Self::default()
  }

  /// Registry with every builtin the language ships with.
  pub fn standard() -> Self {
    let mut registry = Self::empty();
    registry.register(Builtin {
      name: "process",
      ty: VarType::Text,
      setup: setup_process,
    });
    registry
  }

  pub fn register(&mut self, builtin: Builtin) {
    self.table.insert(builtin.name, builtin);
  }

  pub fn get(&self, name: &str) -> Option<&Builtin> {
    self.table.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.table.contains_key(name)
  }
}

/// `process` is an object handle with an `exit` routine and an `exitCode` field.
fn setup_process(generator: &mut Generator<'_>) -> Variable {
  let var = generator.temp_var(VarType::Text);
  let Some(p) = var.target().map(str::to_owned) else {
    return var;
  };

  let lines = [
    format!("set {p}={p}"),
    String::new(),
    format!("set {p}[exit]={p}[exit]"),
    format!("goto {p}[exit]_"),
    format!(":{p}[exit]"),
    "goto :eof".to_string(),
    format!(":{p}[exit]_"),
    String::new(),
    format!("set {p}[exitCode]=0"),
  ];
  for line in lines {
    generator.emit_to(Segment::Decl, line);
  }
  var
}
