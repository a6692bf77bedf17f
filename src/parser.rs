//! Recursive-descent parser producing the program AST.
//!
//! Expressions are parsed by a ladder of precedence levels. Each binary level
//! parses its left operand from the next-tighter level and then recurses into
//! itself for the right operand, so every binary operator associates to the
//! right: `a - b - c` parses as `a - (b - c)`.
//!
//! Statements are expressions with an optional trailing `;`. `if`, `while`,
//! `func` and `return` are expression forms, which keeps the statement layer
//! down to a single loop.

use crate::ast::{BinaryOp, Node, NodeKind, StepOp};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, string_value, token_text};

/// Parse a whole compilation unit from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Node> {
  let mut stream = TokenStream::new(tokens, source);
  let mut body = Vec::new();

  while !stream.is_eof() {
    if stream.equal(";") {
      continue;
    }
    body.push(parse_stmt(&mut stream)?);
  }

  Ok(Node::new(NodeKind::Program { body }, 0))
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Node> {
  let expr = parse_expr(stream)?;
  stream.equal(";");
  Ok(expr)
}

/// Either a braced statement list or a single statement.
fn parse_body(stream: &mut TokenStream) -> CompileResult<Vec<Node>> {
  if stream.equal("{") {
    parse_block(stream)
  } else {
    Ok(vec![parse_stmt(stream)?])
  }
}

/// Statements up to the closing brace; the opening one is already consumed.
fn parse_block(stream: &mut TokenStream) -> CompileResult<Vec<Node>> {
  let mut body = Vec::new();
  loop {
    if stream.equal("}") {
      return Ok(body);
    }
    if stream.equal(";") {
      continue;
    }
    if stream.is_eof() {
      stream.skip("}")?;
    }
    body.push(parse_stmt(stream)?);
  }
}

pub fn parse_expr(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Node> {
  let node = parse_ternary(stream)?;

  let loc = stream.loc();
  if stream.equal("=") {
    if !matches!(
      node.kind,
      NodeKind::Identifier(_) | NodeKind::Index { .. }
    ) {
      return Err(CompileError::at(
        stream.source,
        node.loc,
        node.construct(),
        format!("cannot assign to {}", node.construct()),
      ));
    }
    let value = parse_assign(stream)?;
    return Ok(Node::new(
      NodeKind::Assign {
        target: Box::new(node),
        value: Box::new(value),
      },
      loc,
    ));
  }

  Ok(node)
}

fn parse_ternary(stream: &mut TokenStream) -> CompileResult<Node> {
  let cond = parse_logic_or(stream)?;

  let loc = stream.loc();
  if stream.equal("?") {
    let then_expr = parse_assign(stream)?;
    stream.skip(":")?;
    let else_expr = parse_ternary(stream)?;
    return Ok(Node::new(
      NodeKind::Ternary {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
      },
      loc,
    ));
  }

  Ok(cond)
}

fn parse_logic_or(stream: &mut TokenStream) -> CompileResult<Node> {
  let lhs = parse_logic_and(stream)?;

  let loc = stream.loc();
  if stream.equal("||") {
    let rhs = parse_logic_or(stream)?;
    return Ok(Node::new(
      NodeKind::LogicOr {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    ));
  }

  Ok(lhs)
}

fn parse_logic_and(stream: &mut TokenStream) -> CompileResult<Node> {
  let lhs = parse_bit_or(stream)?;

  let loc = stream.loc();
  if stream.equal("&&") {
    let rhs = parse_logic_and(stream)?;
    return Ok(Node::new(
      NodeKind::LogicAnd {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      loc,
    ));
  }

  Ok(lhs)
}

type Level = for<'s, 'a> fn(&'s mut TokenStream<'a>) -> CompileResult<Node>;

/// One right-recursive binary level: `operand (op this)?`.
fn parse_binary(
  stream: &mut TokenStream,
  ops: &[(&str, BinaryOp)],
  operand: Level,
  this: Level,
) -> CompileResult<Node> {
  let lhs = operand(stream)?;

  let loc = stream.loc();
  let Some(op) = ops
    .iter()
    .find(|(symbol, _)| stream.equal(symbol))
    .map(|(_, op)| *op)
  else {
    return Ok(lhs);
  };

  let rhs = this(stream)?;
  Ok(Node::binary(op, lhs, rhs, loc))
}

fn parse_bit_or(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(stream, &[("|", BinaryOp::BitOr)], parse_bit_xor, parse_bit_or)
}

fn parse_bit_xor(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(stream, &[("^", BinaryOp::BitXor)], parse_bit_and, parse_bit_xor)
}

fn parse_bit_and(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(stream, &[("&", BinaryOp::BitAnd)], parse_equality, parse_bit_and)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(
    stream,
    &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
    parse_relational,
    parse_equality,
  )
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(
    stream,
    &[
      ("<=", BinaryOp::Le),
      (">=", BinaryOp::Ge),
      ("<", BinaryOp::Lt),
      (">", BinaryOp::Gt),
    ],
    parse_shift,
    parse_relational,
  )
}

fn parse_shift(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(
    stream,
    &[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
    parse_add,
    parse_shift,
  )
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(
    stream,
    &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    parse_mul,
    parse_add,
  )
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary(
    stream,
    &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Mod)],
    parse_unary,
    parse_mul,
  )
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();

  for (symbol, op) in [("++", StepOp::Inc), ("--", StepOp::Dec)] {
    if stream.equal(symbol) {
      let target = parse_unary(stream)?;
      return Ok(Node::new(
        NodeKind::Step {
          op,
          prefix: true,
          target: Box::new(target),
        },
        loc,
      ));
    }
  }

  if stream.equal("+") {
    return parse_unary(stream);
  }

  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    if let NodeKind::Integer(value) = operand.kind {
      return Ok(Node::integer(-value, loc));
    }
    return Ok(Node::binary(BinaryOp::Sub, Node::integer(0, loc), operand, loc));
  }

  parse_postfix(stream)
}

fn parse_postfix(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_primary(stream)?;

  loop {
    let loc = stream.loc();

    if stream.equal("(") {
      let args = parse_list(stream, ")")?;
      node = Node::new(
        NodeKind::Call {
          callee: Box::new(node),
          args,
        },
        loc,
      );
      continue;
    }

    if stream.equal("[") {
      let index = parse_expr(stream)?;
      stream.skip("]")?;
      node = Node::new(
        NodeKind::Index {
          base: Box::new(node),
          index: Box::new(index),
        },
        loc,
      );
      continue;
    }

    let step = [("++", StepOp::Inc), ("--", StepOp::Dec)]
      .into_iter()
      .find(|(symbol, _)| stream.equal(symbol));
    if let Some((_, op)) = step {
      node = Node::new(
        NodeKind::Step {
          op,
          prefix: false,
          target: Box::new(node),
        },
        loc,
      );
      continue;
    }

    return Ok(node);
  }
}

/// Comma-separated expressions up to (and including) `close`.
fn parse_list(stream: &mut TokenStream, close: &str) -> CompileResult<Vec<Node>> {
  let mut items = Vec::new();
  if stream.equal(close) {
    return Ok(items);
  }

  loop {
    items.push(parse_expr(stream)?);
    if stream.equal(close) {
      return Ok(items);
    }
    stream.skip(",")?;
  }
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();

  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if stream.equal("[") {
    let elements = parse_list(stream, "]")?;
    return Ok(Node::new(NodeKind::Array { elements }, loc));
  }

  if stream.equal("true") {
    return Ok(Node::integer(1, loc));
  }

  if stream.equal("false") {
    return Ok(Node::integer(0, loc));
  }

  if stream.equal("func") {
    return parse_func(stream, loc);
  }

  if stream.equal("if") {
    return parse_if(stream, loc);
  }

  if stream.equal("while") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let body = parse_body(stream)?;
    return Ok(Node::new(
      NodeKind::While {
        cond: Box::new(cond),
        body,
      },
      loc,
    ));
  }

  if stream.equal("return") {
    let value = parse_expr(stream)?;
    return Ok(Node::new(
      NodeKind::Return {
        value: Box::new(value),
      },
      loc,
    ));
  }

  let token = stream.expect(&[TokenKind::Ident, TokenKind::Num, TokenKind::Str])?;
  match token.kind {
    TokenKind::Ident => Ok(Node::ident(token_text(&token, stream.source), loc)),
    TokenKind::Str => Ok(Node::string(string_value(&token, stream.source), loc)),
    _ => {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          stream.source,
          token.loc,
          token_text(&token, stream.source),
          "internal error: numeric token missing value",
        )
      })?;
      Ok(Node::integer(value, loc))
    }
  }
}

fn parse_func(stream: &mut TokenStream, loc: usize) -> CompileResult<Node> {
  let name = if stream.peek().map(|token| token.kind) == Some(TokenKind::Ident) {
    Some(stream.get_ident()?)
  } else {
    None
  };

  stream.skip("(")?;
  let mut params = Vec::new();
  if !stream.equal(")") {
    loop {
      params.push(stream.get_ident()?);
      if stream.equal(")") {
        break;
      }
      stream.skip(",")?;
    }
  }

  stream.skip("{")?;
  let body = parse_block(stream)?;

  Ok(Node::new(NodeKind::Function { name, params, body }, loc))
}

fn parse_if(stream: &mut TokenStream, loc: usize) -> CompileResult<Node> {
  stream.skip("(")?;
  let cond = parse_expr(stream)?;
  stream.skip(")")?;

  let then_body = parse_body(stream)?;
  let else_body = if stream.equal("else") {
    parse_body(stream)?
  } else {
    Vec::new()
  };

  Ok(Node::new(
    NodeKind::If {
      cond: Box::new(cond),
      then_body,
      else_body,
    },
    loc,
  ))
}

/// Lightweight cursor over the token vector.
pub struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  pub fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  pub fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Byte offset of the current token, or the end of input.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Consume the current token if it is the given punctuator or keyword.
  pub fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  pub fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(CompileError::at(
        self.source,
        self.loc(),
        got.clone(),
        format!("expected \"{s}\", but got \"{got}\""),
      ))
    }
  }

  /// Consume the current token, failing unless it has one of `kinds`.
  pub fn expect(&mut self, kinds: &[TokenKind]) -> CompileResult<Token> {
    if let Some(token) = self.peek()
      && kinds.contains(&token.kind)
    {
      let token = token.clone();
      self.pos += 1;
      return Ok(token);
    }

    let got = describe_token(self.peek(), self.source);
    let wanted = kinds
      .iter()
      .map(|kind| kind.describe())
      .collect::<Vec<_>>()
      .join(" or ");
    Err(CompileError::at(
      self.source,
      self.loc(),
      got.clone(),
      format!("expected {wanted}, but got \"{got}\""),
    ))
  }

  /// Parse the current token as an identifier.
  pub fn get_ident(&mut self) -> CompileResult<String> {
    let token = self.expect(&[TokenKind::Ident])?;
    Ok(token_text(&token, self.source).to_string())
  }

  pub fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
