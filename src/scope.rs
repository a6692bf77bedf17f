//! Variables, operands and the lexical scope chain used during generation.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
  Integer,
  Text,
}

impl VarType {
  /// Integer unless any participant is text.
  pub fn join(types: &[VarType]) -> VarType {
    if types.contains(&VarType::Text) {
      VarType::Text
    } else {
      VarType::Integer
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarName {
  Named(String),
  /// Positional batch argument `%N`; function parameters live here.
  Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
  pub name: VarName,
  pub ty: VarType,
}

impl Variable {
  pub fn named(name: impl Into<String>, ty: VarType) -> Self {
    Self {
      name: VarName::Named(name.into()),
      ty,
    }
  }

  pub fn slot(index: usize, ty: VarType) -> Self {
    Self {
      name: VarName::Slot(index),
      ty,
    }
  }

  /// Deferred read: `!name!`, or `%~N` for a positional slot.
  pub fn render(&self) -> String {
    match &self.name {
      VarName::Named(name) => format!("!{name}!"),
      VarName::Slot(index) => format!("%~{index}"),
    }
  }

  /// Immediate read, expanded when the enclosing line is parsed.
  pub fn render_immediate(&self) -> String {
    match &self.name {
      VarName::Named(name) => format!("%{name}%"),
      VarName::Slot(index) => format!("%~{index}"),
    }
  }

  /// Name usable on the left of `set`. Slots cannot be written.
  pub fn target(&self) -> Option<&str> {
    match &self.name {
      VarName::Named(name) => Some(name),
      VarName::Slot(_) => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
  Integer,
  Text,
  /// An unevaluated location such as `!arr!.0`; must be dereferenced before use.
  Reference,
}

impl From<VarType> for OperandType {
  fn from(ty: VarType) -> Self {
    match ty {
      VarType::Integer => OperandType::Integer,
      VarType::Text => OperandType::Text,
    }
  }
}

/// One entry on the generator's value stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
  pub text: String,
  pub ty: OperandType,
  pub var: Option<Variable>,
}

impl Operand {
  pub fn integer(value: i64) -> Self {
    Self {
      text: value.to_string(),
      ty: OperandType::Integer,
      var: None,
    }
  }

  pub fn text(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      ty: OperandType::Text,
      var: None,
    }
  }

  pub fn reference(location: impl Into<String>) -> Self {
    Self {
      text: location.into(),
      ty: OperandType::Reference,
      var: None,
    }
  }

  pub fn var(var: Variable) -> Self {
    Self {
      text: var.render(),
      ty: var.ty.into(),
      var: Some(var),
    }
  }

  pub fn is_integer(&self) -> bool {
    self.ty == OperandType::Integer
  }

  /// Value type once dereferenced; references always read back as text.
  pub fn value_type(&self) -> VarType {
    match self.ty {
      OperandType::Integer => VarType::Integer,
      OperandType::Text | OperandType::Reference => VarType::Text,
    }
  }
}

#[derive(Debug, Default, Clone)]
pub struct Scope {
  vars: HashMap<String, Variable>,
}

impl Scope {
  pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
    self.vars.iter()
  }
}

/// The unit's root scope plus the stack of function scopes entered so far.
#[derive(Debug, Default, Clone)]
pub struct ScopeChain {
  root: Scope,
  nested: Vec<Scope>,
}

impl ScopeChain {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn enter(&mut self) {
    self.nested.push(Scope::default());
  }

  /// Pop the innermost scope. The root scope is never popped.
  pub fn leave(&mut self) {
    self.nested.pop();
  }

  /// Bind `name` in the innermost scope, replacing any binding it already had there.
  pub fn declare(&mut self, name: impl Into<String>, var: Variable) -> Variable {
    let scope = self.nested.last_mut().unwrap_or(&mut self.root);
    scope.vars.insert(name.into(), var.clone());
    var
  }

  /// Walk from the innermost scope outwards and return the first match.
  pub fn lookup(&self, name: &str) -> Option<&Variable> {
    self
      .nested
      .iter()
      .rev()
      .chain(std::iter::once(&self.root))
      .find_map(|scope| scope.vars.get(name))
  }

  pub fn root(&self) -> &Scope {
    &self.root
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inner_scope_shadows_and_is_dropped_on_leave() {
    let mut chain = ScopeChain::new();
    chain.declare("x", Variable::named("x", VarType::Integer));
    chain.enter();
    chain.declare("x", Variable::slot(2, VarType::Text));
    chain.declare("y", Variable::named("y", VarType::Text));
    assert_eq!(chain.lookup("x").map(Variable::render), Some("%~2".into()));

    chain.leave();
    assert_eq!(chain.lookup("x").map(Variable::render), Some("!x!".into()));
    assert!(chain.lookup("y").is_none());
  }

  #[test]
  fn root_scope_survives_extra_leaves() {
    let mut chain = ScopeChain::new();
    chain.leave();
    chain.declare("a", Variable::named("a", VarType::Text));
    chain.enter();
    chain.leave();
    assert!(chain.lookup("a").is_some());
    assert_eq!(chain.root().variables().count(), 1);
  }

  #[test]
  fn temp_type_join() {
    assert_eq!(
      VarType::join(&[VarType::Integer, VarType::Integer]),
      VarType::Integer
    );
    assert_eq!(
      VarType::join(&[VarType::Integer, VarType::Text]),
      VarType::Text
    );
  }

  #[test]
  fn operand_from_slot_variable() {
    let operand = Operand::var(Variable::slot(3, VarType::Integer));
    assert_eq!(operand.text, "%~3");
    assert!(operand.is_integer());
    assert_eq!(operand.var.as_ref().and_then(Variable::target), None);
    assert_eq!(
      Variable::named("n", VarType::Text).render_immediate(),
      "%n%"
    );
  }
}
