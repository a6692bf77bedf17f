#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use batchc::{CompileError, CompileOptions, compile_source};

/// Compile with default options, panicking on failure.
pub fn compile(src: &str) -> String {
  compile_source(src, &CompileOptions::default()).expect("compile failure")
}

pub fn compile_unfolded(src: &str) -> String {
  let options = CompileOptions {
    fold_constants: false,
    ..CompileOptions::default()
  };
  compile_source(src, &options).expect("compile failure")
}

pub fn compile_err(src: &str) -> CompileError {
  match compile_source(src, &CompileOptions::default()) {
    Ok(script) => panic!("expected a compile error, got:\n{script}"),
    Err(err) => err,
  }
}

/// Lines after the fixed two-line prologue and the declaration block.
pub fn code_lines(script: &str) -> Vec<&str> {
  script.lines().skip(2).filter(|line| !line.is_empty()).collect()
}

pub fn count(script: &str, line: &str) -> usize {
  script.lines().filter(|l| *l == line).count()
}

/// Write `contents` to `dir/name` and return the full path.
pub fn write_unit(dir: &Path, name: &str, contents: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, contents).expect("write fixture");
  path
}
