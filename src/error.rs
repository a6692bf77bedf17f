//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics stay lightweight: source-anchored errors render the offending
//! line followed by a caret marker under the failing byte, prefixed with its
//! line and column.

use std::fmt;
use std::path::PathBuf;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Position of a diagnostic inside one compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub line: usize,
  pub column: usize,
  pub source_line: String,
  pub marker: String,
}

impl Location {
  /// Anchor a location at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize) -> Self {
    let mut safe_loc = loc.min(source.len());
    while !source.is_char_boundary(safe_loc) {
      safe_loc -= 1;
    }
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |idx| safe_loc + idx);
    let line = source[..line_start].matches('\n').count() + 1;
    let column = source[line_start..safe_loc].chars().count() + 1;
    let source_line = source[line_start..line_end].trim_end_matches('\r').to_string();
    let marker = format!("{}^", " ".repeat(column - 1));
    Self {
      line,
      column,
      source_line,
      marker,
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}:{}\n{}\n{}",
      self.line, self.column, self.source_line, self.marker
    )
  }
}

/// Coarse classification of [`CompileError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Parse,
  Generation,
  Io,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{location} {message}"))]
  Lex { location: Location, message: String },

  #[snafu(display("{location} {message}"))]
  Parse {
    location: Location,
    found: String,
    message: String,
  },

  #[snafu(display("{location} unresolved identifier `{name}`"))]
  UnresolvedIdentifier { location: Location, name: String },

  #[snafu(display("{location} `{name}` is reserved for compiler-generated names"))]
  ReservedName { location: Location, name: String },

  #[snafu(display("{location} cannot assign to {what}"))]
  NotAssignable { location: Location, what: String },

  #[snafu(display("{location} {construct} does not produce a value"))]
  MissingValue {
    location: Location,
    construct: &'static str,
  },

  #[snafu(display("{location} {message}"))]
  IncludeArgument { location: Location, message: String },

  #[snafu(display("{location} include nesting exceeds {limit} levels"))]
  IncludeDepth { location: Location, limit: usize },

  #[snafu(display("failed to read included file {}: {source}", path.display()))]
  IncludeRead {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("in included file {}:\n{source}", path.display()))]
  InInclude {
    path: PathBuf,
    #[snafu(source(from(CompileError, Box::new)))]
    source: Box<CompileError>,
  },

  #[snafu(display("failed to read {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },
}

impl CompileError {
  /// Construct a parse error anchored at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize, found: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Parse {
      location: Location::at(source, loc),
      found: found.into(),
      message: message.into(),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Lex { .. } | Self::Parse { .. } => ErrorKind::Parse,
      Self::UnresolvedIdentifier { .. }
      | Self::ReservedName { .. }
      | Self::NotAssignable { .. }
      | Self::MissingValue { .. }
      | Self::IncludeArgument { .. }
      | Self::IncludeDepth { .. }
      | Self::IncludeRead { .. } => ErrorKind::Generation,
      Self::InInclude { source, .. } => source.kind(),
      Self::ReadSource { .. } => ErrorKind::Io,
    }
  }

  /// Strip `InInclude` wrappers and return the error that started it all.
  pub fn root_cause(&self) -> &CompileError {
    match self {
      Self::InInclude { source, .. } => source.root_cause(),
      other => other,
    }
  }
}
