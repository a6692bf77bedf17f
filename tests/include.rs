mod harness;

use batchc::{CompileError, CompileOptions, ErrorKind, compile_file};
use harness::{count, write_unit};

#[test]
fn included_code_is_spliced_at_the_call_site() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_unit(dir.path(), "lib.bc", "y = 2;");
  let main = write_unit(dir.path(), "main.bc", "x = 1; include(\"lib.bc\"); z = 3;");

  let script = compile_file(&main, &CompileOptions::default()).expect("compile");
  let code: Vec<&str> = script.lines().skip(3).collect();
  assert_eq!(code, ["set /a \"x=1\"", "set /a \"y=2\"", "set /a \"z=3\""]);
}

#[test]
fn temps_and_labels_stay_unique_across_includes() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_unit(dir.path(), "lib.bc", "y = [1]; while (0) { }");
  let main = write_unit(
    dir.path(),
    "main.bc",
    "x = [1]; while (0) { } include(\"lib.bc\"); z = [2]; while (0) { }",
  );

  let script = compile_file(&main, &CompileOptions::default()).expect("compile");
  for handle in ["__1", "__2", "__3"] {
    assert_eq!(count(&script, &format!("set \"{handle}={handle}\"")), 1);
  }
  for label in [":lbl1", ":lbl2", ":lbl3"] {
    assert_eq!(count(&script, label), 1);
  }
  assert_eq!(count(&script, "set \"y=!__2!\""), 1);
}

#[test]
fn included_top_level_variables_are_imported() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_unit(dir.path(), "lib.bc", "func helper() { return 1; } shared = 4;");
  let main = write_unit(
    dir.path(),
    "main.bc",
    "include(\"lib.bc\"); v = helper(); return shared;",
  );

  let script = compile_file(&main, &CompileOptions::default()).expect("compile");
  assert_eq!(count(&script, "set helper=helper"), 1);
  assert_eq!(count(&script, "call :!helper! __1"), 1);
  assert_eq!(count(&script, "set /a %1=%shared%"), 1);
}

#[test]
fn builtin_setup_is_shared_with_included_units() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_unit(dir.path(), "lib.bc", "q = process;");
  let main = write_unit(
    dir.path(),
    "main.bc",
    "p = process; include(\"lib.bc\"); r = process;",
  );

  let script = compile_file(&main, &CompileOptions::default()).expect("compile");
  let setups = script.lines().filter(|l| l.ends_with("[exitCode]=0")).count();
  assert_eq!(setups, 1);
  assert_eq!(count(&script, "set __1[exitCode]=0"), 1);
  for line in ["set \"p=!__1!\"", "set \"q=!__1!\"", "set \"r=!__1!\""] {
    assert_eq!(count(&script, line), 1, "{line}");
  }
}

#[test]
fn anonymous_functions_are_not_exported() {
  let dir = tempfile::tempdir().expect("tempdir");
  write_unit(dir.path(), "lib.bc", "f = func () { return 1; };");
  let main = write_unit(dir.path(), "main.bc", "include(\"lib.bc\"); return __1;");

  let err = compile_file(&main, &CompileOptions::default()).expect_err("should fail");
  assert!(matches!(
    err,
    CompileError::UnresolvedIdentifier { ref name, .. } if name == "__1"
  ));
}

#[test]
fn nested_includes_resolve_against_their_own_directory() {
  let dir = tempfile::tempdir().expect("tempdir");
  let sub = dir.path().join("sub");
  std::fs::create_dir(&sub).expect("mkdir");
  write_unit(&sub, "inner.bc", "inner = 1;");
  write_unit(&sub, "outer.bc", "include(\"inner.bc\"); outer = inner;");
  let main = write_unit(dir.path(), "main.bc", "include(\"sub/outer.bc\"); return outer;");

  let script = compile_file(&main, &CompileOptions::default()).expect("compile");
  assert_eq!(count(&script, "set /a \"inner=1\""), 1);
  assert_eq!(count(&script, "set /a \"outer=!inner!\""), 1);
}

#[test]
fn errors_inside_an_include_are_wrapped() {
  let dir = tempfile::tempdir().expect("tempdir");
  let lib = write_unit(dir.path(), "lib.bc", "return nope;");
  let main = write_unit(dir.path(), "main.bc", "include(\"lib.bc\");");

  let err = compile_file(&main, &CompileOptions::default()).expect_err("should fail");
  match &err {
    CompileError::InInclude { path, .. } => assert_eq!(path, &lib),
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(err.kind(), ErrorKind::Generation);
  assert!(matches!(
    err.root_cause(),
    CompileError::UnresolvedIdentifier { name, .. } if name == "nope"
  ));
}

#[test]
fn self_include_stops_at_the_depth_limit() {
  let dir = tempfile::tempdir().expect("tempdir");
  let main = write_unit(dir.path(), "main.bc", "include(\"main.bc\");");
  let options = CompileOptions {
    max_include_depth: 3,
    ..CompileOptions::default()
  };

  let err = compile_file(&main, &options).expect_err("should fail");
  assert!(matches!(
    err.root_cause(),
    CompileError::IncludeDepth { limit: 3, .. }
  ));

  let mut wrappers = 0;
  let mut current = &err;
  while let CompileError::InInclude { source, .. } = current {
    wrappers += 1;
    current = &**source;
  }
  assert_eq!(wrappers, 3);
}

#[test]
fn missing_include_reports_the_path() {
  let dir = tempfile::tempdir().expect("tempdir");
  let main = write_unit(dir.path(), "main.bc", "include(\"absent.bc\");");

  let err = compile_file(&main, &CompileOptions::default()).expect_err("should fail");
  match err {
    CompileError::IncludeRead { path, .. } => assert_eq!(path, dir.path().join("absent.bc")),
    other => panic!("unexpected error: {other:?}"),
  }
}

#[test]
fn missing_root_file_is_an_io_error() {
  let dir = tempfile::tempdir().expect("tempdir");
  let err = compile_file(dir.path().join("nothing.bc"), &CompileOptions::default())
    .expect_err("should fail");
  assert!(matches!(err, CompileError::ReadSource { .. }));
  assert_eq!(err.kind(), ErrorKind::Io);
}
