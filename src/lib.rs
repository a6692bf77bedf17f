//! Crate root: wires together the compilation pipeline.
//!
//! Each stage is a small module with one entry point:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns a `Program` node.
//! - `optimizer` folds constant additions before anything is emitted.
//! - `codegen` lowers the tree into a batch script through a compile-time
//!   operand stack, resolving names through `scope` and `builtins`.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod error;
pub mod optimizer;
pub mod parser;
pub mod scope;
pub mod tokenizer;

use std::fs;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use crate::ast::Node;
use crate::builtins::BuiltinRegistry;
use crate::codegen::Generator;
use crate::error::ReadSourceSnafu;
use crate::optimizer::Optimizer;

pub use error::{CompileError, CompileResult, ErrorKind, Location};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Knobs for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
  pub fold_constants: bool,
  /// Relative `include` paths in the root unit resolve against this directory.
  pub base_dir: PathBuf,
  pub max_include_depth: usize,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      fold_constants: true,
      base_dir: PathBuf::from("."),
      max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
    }
  }
}

/// Tokenize, parse and optimize one unit of source.
pub(crate) fn front_end(source: &str, options: &CompileOptions) -> CompileResult<Node> {
  let tokens = tokenizer::tokenize(source)?;
  debug!(tokens = tokens.len(), "tokenized");
  let program = parser::parse(tokens, source)?;
  debug!("parsed");
  Ok(Optimizer::new(options.fold_constants).optimize(program))
}

/// Compile a source string into a batch script.
pub fn compile_source(source: &str, options: &CompileOptions) -> CompileResult<String> {
  let program = front_end(source, options)?;
  let builtins = BuiltinRegistry::standard();
  let mut generator = Generator::new(source, options, &builtins);
  generator.generate(&program)?;
  debug!(counters = ?generator.counters(), "generated");
  Ok(generator.code())
}

/// Compile a file. Includes resolve against the file's own directory.
pub fn compile_file(path: impl AsRef<Path>, options: &CompileOptions) -> CompileResult<String> {
  let path = path.as_ref();
  let source = fs::read_to_string(path).context(ReadSourceSnafu { path })?;
  let options = CompileOptions {
    base_dir: path
      .parent()
      .map_or_else(|| options.base_dir.clone(), Path::to_path_buf),
    ..options.clone()
  };
  debug!(path = %path.display(), "compiling file");
  compile_source(&source, &options)
}
