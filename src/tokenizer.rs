//! Lexer for the scripting language: source text in, flat token vector out.
//!
//! The tokenizer knows nothing about semantics beyond recognising operators,
//! keywords, identifiers and literals. Multi-character punctuators are matched
//! before single-character ones to avoid ambiguity.

use crate::error::{CompileError, CompileResult, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Keyword,
  Punctuator,
  Num,
  Str,
  Eof,
}

impl TokenKind {
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::Ident => "an identifier",
      TokenKind::Keyword => "a keyword",
      TokenKind::Punctuator => "a punctuator",
      TokenKind::Num => "a number",
      TokenKind::Str => "a string",
      TokenKind::Eof => "end of input",
    }
  }
}

/// A classified slice of the source. `value` is set for numbers only.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

pub const KEYWORDS: [&str; 7] = ["func", "if", "else", "while", "return", "true", "false"];

const PUNCTUATORS: [&str; 31] = [
  "<<", ">>", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+", "-", "*", "/", "%", "&", "|",
  "^", "<", ">", "=", "?", ":", "(", ")", "{", "}", "[", "]", ",", ";",
];

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(bytes.len(), |idx| i + idx);
      continue;
    }

    if input[i..].starts_with("/*") {
      let Some(end) = input[i + 2..].find("*/") else {
        return Err(lex_error(input, i, "unterminated block comment"));
      };
      i += end + 4;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|err| lex_error(input, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None));
      continue;
    }

    if c == b'"' {
      let start = i;
      i += 1;
      loop {
        match bytes.get(i) {
          None | Some(b'\n') => return Err(lex_error(input, start, "unterminated string")),
          Some(b'\\') => i += 2,
          Some(b'"') => {
            i += 1;
            break;
          }
          Some(_) => i += 1,
        }
      }
      tokens.push(Token::new(TokenKind::Str, start, i - start, None));
      continue;
    }

    if let Some(op) = PUNCTUATORS
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(lex_error(input, i, format!("invalid token: '{invalid_char}'")));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  Ok(tokens)
}

fn lex_error(input: &str, loc: usize, message: impl Into<String>) -> CompileError {
  CompileError::Lex {
    location: Location::at(input, loc),
    message: message.into(),
  }
}

pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Decode a string token: strip the quotes and resolve `\"`, `\\`, `\n` and `\t`.
pub fn string_value(token: &Token, source: &str) -> String {
  let text = token_text(token, source);
  let inner = text
    .strip_prefix('"')
    .and_then(|rest| rest.strip_suffix('"'))
    .unwrap_or(text);

  let mut value = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      value.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => value.push('\n'),
      Some('t') => value.push('\t'),
      Some(other) => value.push(other),
      None => value.push('\\'),
    }
  }
  value
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<(TokenKind, String)> {
    tokenize(source)
      .unwrap()
      .iter()
      .map(|t| (t.kind, token_text(t, source).to_string()))
      .collect()
  }

  #[test]
  fn longest_punctuator_wins() {
    let toks = kinds("a<<=b");
    assert_eq!(toks[1], (TokenKind::Punctuator, "<<".to_string()));
    assert_eq!(toks[2], (TokenKind::Punctuator, "=".to_string()));
  }

  #[test]
  fn keywords_and_identifiers() {
    let toks = kinds("func while_x if");
    assert_eq!(toks[0].0, TokenKind::Keyword);
    assert_eq!(toks[1], (TokenKind::Ident, "while_x".to_string()));
    assert_eq!(toks[2].0, TokenKind::Keyword);
    assert_eq!(toks[3].0, TokenKind::Eof);
  }

  #[test]
  fn comments_are_skipped() {
    let toks = kinds("1 // two\n/* three */ 4");
    assert_eq!(toks.len(), 3);
    assert_eq!(toks[1], (TokenKind::Num, "4".to_string()));
  }

  #[test]
  fn string_escapes_are_decoded() {
    let source = r#""say \"hi\"\\""#;
    let tokens = tokenize(source).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Str);
    assert_eq!(string_value(&tokens[0], source), r#"say "hi"\"#);
  }

  #[test]
  fn unterminated_string_is_an_error() {
    let err = tokenize("x = \"abc").unwrap_err();
    assert!(err.to_string().contains("unterminated string"));
  }

  #[test]
  fn invalid_character_is_reported() {
    let err = tokenize("a = #").unwrap_err();
    assert!(err.to_string().contains("invalid token: '#'"));
  }
}
