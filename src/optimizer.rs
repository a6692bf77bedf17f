//! Constant folding over the parsed AST.
//!
//! A single post-order pass: children are rewritten first, then the node
//! itself is offered to the rewrite for its construct. Only addition folds
//! today.

use tracing::trace;

use crate::ast::{BinaryOp, Node, NodeKind};

#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
  pub fold_constants: bool,
}

impl Default for Optimizer {
  fn default() -> Self {
    Self {
      fold_constants: true,
    }
  }
}

impl Optimizer {
  pub fn new(fold_constants: bool) -> Self {
    Self { fold_constants }
  }

  pub fn optimize(&self, node: Node) -> Node {
    let node = node.map_children(|child| self.optimize(child));
    self.rewrite(node)
  }

  fn rewrite(&self, node: Node) -> Node {
    match node.kind {
      NodeKind::Binary {
        op: BinaryOp::Add, ..
      } if self.fold_constants => fold_add(node),
      _ => node,
    }
  }
}

fn fold_add(node: Node) -> Node {
  let folded = match &node.kind {
    NodeKind::Binary { lhs, rhs, .. } => match (&lhs.kind, &rhs.kind) {
      (NodeKind::Integer(a), NodeKind::Integer(b)) => a.checked_add(*b).map(NodeKind::Integer),
      (NodeKind::Integer(a), NodeKind::Str(b)) => Some(NodeKind::Str(format!("{a}{b}"))),
      (NodeKind::Str(a), NodeKind::Integer(b)) => Some(NodeKind::Str(format!("{a}{b}"))),
      (NodeKind::Str(a), NodeKind::Str(b)) => Some(NodeKind::Str(format!("{a}{b}"))),
      _ => None,
    },
    _ => None,
  };

  match folded {
    Some(kind) => {
      trace!(?kind, "folded constant addition");
      Node::new(kind, node.loc)
    }
    None => node,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn add(lhs: Node, rhs: Node) -> Node {
    Node::binary(BinaryOp::Add, lhs, rhs, 0)
  }

  #[test]
  fn folds_integer_sum() {
    let folded = Optimizer::default().optimize(add(Node::integer(2, 0), Node::integer(3, 0)));
    assert_eq!(folded.kind, NodeKind::Integer(5));
  }

  #[test]
  fn folds_mixed_concatenation_either_order() {
    let optimizer = Optimizer::default();
    let left = optimizer.optimize(add(Node::string("x", 0), Node::integer(7, 0)));
    let right = optimizer.optimize(add(Node::integer(7, 0), Node::string("x", 0)));
    assert_eq!(left.kind, NodeKind::Str("x7".into()));
    assert_eq!(right.kind, NodeKind::Str("7x".into()));
  }

  #[test]
  fn folds_bottom_up_through_nesting() {
    // 1 + (2 + "a") -> 1 + "2a" -> "12a"
    let tree = add(
      Node::integer(1, 0),
      add(Node::integer(2, 0), Node::string("a", 0)),
    );
    assert_eq!(
      Optimizer::default().optimize(tree).kind,
      NodeKind::Str("12a".into())
    );
  }

  #[test]
  fn leaves_identifiers_and_other_operators_alone() {
    let optimizer = Optimizer::default();
    let with_ident = add(Node::ident("x", 0), Node::integer(1, 0));
    assert_eq!(optimizer.optimize(with_ident.clone()), with_ident);

    let product = Node::binary(BinaryOp::Mul, Node::integer(2, 0), Node::integer(3, 0), 0);
    assert_eq!(optimizer.optimize(product.clone()), product);
  }

  #[test]
  fn overflow_is_not_folded() {
    let tree = add(Node::integer(i64::MAX, 0), Node::integer(1, 0));
    assert_eq!(Optimizer::default().optimize(tree.clone()), tree);
  }

  #[test]
  fn disabled_folding_is_identity() {
    let tree = add(Node::integer(2, 0), Node::integer(3, 0));
    assert_eq!(Optimizer::new(false).optimize(tree.clone()), tree);
  }

  #[test]
  fn folds_inside_function_bodies() {
    let func = Node::new(
      NodeKind::Function {
        name: Some("f".into()),
        params: Vec::new(),
        body: vec![add(Node::integer(1, 0), Node::integer(1, 0))],
      },
      0,
    );
    let NodeKind::Function { body, .. } = Optimizer::default().optimize(func).kind else {
      panic!("expected function");
    };
    assert_eq!(body[0].kind, NodeKind::Integer(2));
  }
}
