//! Syntax tree produced by the parser and rewritten by the optimizer.
//!
//! Every node carries the byte offset of the token that introduced it so the
//! generator can anchor diagnostics. Nodes are rebuilt, never patched: passes
//! take a node by value and hand back its replacement.

/// Binary operators with a plain two-operand lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
    )
  }

  pub fn is_bitwise(self) -> bool {
    matches!(
      self,
      BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
  Inc,
  Dec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Program {
    body: Vec<Node>,
  },
  Integer(i64),
  Str(String),
  Identifier(String),
  Binary {
    op: BinaryOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  LogicAnd {
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  LogicOr {
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  Assign {
    target: Box<Node>,
    value: Box<Node>,
  },
  If {
    cond: Box<Node>,
    then_body: Vec<Node>,
    else_body: Vec<Node>,
  },
  Ternary {
    cond: Box<Node>,
    then_expr: Box<Node>,
    else_expr: Box<Node>,
  },
  While {
    cond: Box<Node>,
    body: Vec<Node>,
  },
  Function {
    name: Option<String>,
    params: Vec<String>,
    body: Vec<Node>,
  },
  Call {
    callee: Box<Node>,
    args: Vec<Node>,
  },
  Return {
    value: Box<Node>,
  },
  Step {
    op: StepOp,
    prefix: bool,
    target: Box<Node>,
  },
  Array {
    elements: Vec<Node>,
  },
  Index {
    base: Box<Node>,
    index: Box<Node>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind: NodeKind,
  pub loc: usize,
}

impl Node {
  pub fn new(kind: NodeKind, loc: usize) -> Self {
    Self { kind, loc }
  }

  pub fn integer(value: i64, loc: usize) -> Self {
    Self::new(NodeKind::Integer(value), loc)
  }

  pub fn string(value: impl Into<String>, loc: usize) -> Self {
    Self::new(NodeKind::Str(value.into()), loc)
  }

  pub fn ident(name: impl Into<String>, loc: usize) -> Self {
    Self::new(NodeKind::Identifier(name.into()), loc)
  }

  pub fn binary(op: BinaryOp, lhs: Node, rhs: Node, loc: usize) -> Self {
    Self::new(
      NodeKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    )
  }

  pub fn is_return(&self) -> bool {
    matches!(self.kind, NodeKind::Return { .. })
  }

  /// Short name of the construct, used in diagnostics.
  pub fn construct(&self) -> &'static str {
    match &self.kind {
      NodeKind::Program { .. } => "program",
      NodeKind::Integer(_) => "integer",
      NodeKind::Str(_) => "string",
      NodeKind::Identifier(_) => "identifier",
      NodeKind::Binary { .. } => "binary expression",
      NodeKind::LogicAnd { .. } => "`&&`",
      NodeKind::LogicOr { .. } => "`||`",
      NodeKind::Assign { .. } => "assignment",
      NodeKind::If { .. } => "`if`",
      NodeKind::Ternary { .. } => "ternary",
      NodeKind::While { .. } => "`while`",
      NodeKind::Function { .. } => "function",
      NodeKind::Call { .. } => "call",
      NodeKind::Return { .. } => "`return`",
      NodeKind::Step { .. } => "increment",
      NodeKind::Array { .. } => "array literal",
      NodeKind::Index { .. } => "index",
    }
  }

  /// Rebuild this node with every direct child passed through `f`, in source order.
  pub fn map_children(self, mut f: impl FnMut(Node) -> Node) -> Node {
    let Node { kind, loc } = self;
    let kind = match kind {
      NodeKind::Program { body } => NodeKind::Program {
        body: body.into_iter().map(&mut f).collect(),
      },
      leaf @ (NodeKind::Integer(_) | NodeKind::Str(_) | NodeKind::Identifier(_)) => leaf,
      NodeKind::Binary { op, lhs, rhs } => NodeKind::Binary {
        op,
        lhs: Box::new(f(*lhs)),
        rhs: Box::new(f(*rhs)),
      },
      NodeKind::LogicAnd { lhs, rhs } => NodeKind::LogicAnd {
        lhs: Box::new(f(*lhs)),
        rhs: Box::new(f(*rhs)),
      },
      NodeKind::LogicOr { lhs, rhs } => NodeKind::LogicOr {
        lhs: Box::new(f(*lhs)),
        rhs: Box::new(f(*rhs)),
      },
      NodeKind::Assign { target, value } => NodeKind::Assign {
        target: Box::new(f(*target)),
        value: Box::new(f(*value)),
      },
      NodeKind::If {
        cond,
        then_body,
        else_body,
      } => NodeKind::If {
        cond: Box::new(f(*cond)),
        then_body: then_body.into_iter().map(&mut f).collect(),
        else_body: else_body.into_iter().map(&mut f).collect(),
      },
      NodeKind::Ternary {
        cond,
        then_expr,
        else_expr,
      } => NodeKind::Ternary {
        cond: Box::new(f(*cond)),
        then_expr: Box::new(f(*then_expr)),
        else_expr: Box::new(f(*else_expr)),
      },
      NodeKind::While { cond, body } => NodeKind::While {
        cond: Box::new(f(*cond)),
        body: body.into_iter().map(&mut f).collect(),
      },
      NodeKind::Function { name, params, body } => NodeKind::Function {
        name,
        params,
        body: body.into_iter().map(&mut f).collect(),
      },
      NodeKind::Call { callee, args } => NodeKind::Call {
        callee: Box::new(f(*callee)),
        args: args.into_iter().map(&mut f).collect(),
      },
      NodeKind::Return { value } => NodeKind::Return {
        value: Box::new(f(*value)),
      },
      NodeKind::Step {
        op,
        prefix,
        target,
      } => NodeKind::Step {
        op,
        prefix,
        target: Box::new(f(*target)),
      },
      NodeKind::Array { elements } => NodeKind::Array {
        elements: elements.into_iter().map(&mut f).collect(),
      },
      NodeKind::Index { base, index } => NodeKind::Index {
        base: Box::new(f(*base)),
        index: Box::new(f(*index)),
      },
    };
    Node { kind, loc }
  }
}
