mod harness;

use harness::{compile, count};

#[test]
fn function_without_return_gets_default_epilogue() {
  let script = compile("func g(x) { y = x; }");
  assert_eq!(
    script,
    "@echo off\nsetlocal enabledelayedexpansion\nset g=g\n\
     goto :__after_g\n:g\nsetlocal\nset \"y=%~2\"\nendlocal & (set %1=0)\nexit /b\n:__after_g\n"
  );
}

#[test]
fn trailing_return_skips_default_epilogue() {
  let script = compile("func one() { return 1; }");
  assert_eq!(count(&script, "endlocal & (set %1=0)"), 0);
  assert_eq!(count(&script, "set /a %1=1"), 1);
}

#[test]
fn call_quotes_text_arguments() {
  let script = compile("func g(a, b, c) { return a; } g(1, \"a b\", g);");
  assert_eq!(count(&script, "call :!g! __1 1 \"a b\" \"!g!\""), 1);
}

#[test]
fn call_without_arguments_has_no_trailing_space() {
  let script = compile("func f() { return 1; } x = f();");
  assert_eq!(count(&script, "call :!f! __1"), 1);
  assert_eq!(count(&script, "set \"x=!__1!\""), 1);
}

#[test]
fn anonymous_function_gets_a_generated_name() {
  let script = compile("h = func (p) { return p; };");
  assert_eq!(count(&script, "set __1=__1"), 1);
  assert_eq!(count(&script, ":__1"), 1);
  assert_eq!(count(&script, "set %1=%~2"), 1);
  assert_eq!(count(&script, "set \"h=__1\""), 1);
}

#[test]
fn logical_and_guards_the_right_hand_side() {
  let script = compile("func f() { return 1; } x = 0; x && f();");
  let tail: Vec<&str> = script.lines().rev().take(3).collect();
  assert_eq!(tail, [")", "call :!f! __1", "if !x! neq 0 ("]);
}

#[test]
fn parameters_are_scoped_to_their_function() {
  let script = compile("func f(a) { return a; } a = 5; return a;");
  assert_eq!(count(&script, "set %1=%~2"), 1);
  assert_eq!(count(&script, "set /a %1=%a%"), 1);
}

#[test]
fn return_reads_through_the_backing_variable() {
  let script = compile("func f() { v = \"x\"; return v; }");
  assert_eq!(count(&script, "set %1=%v%"), 1);
}

#[test]
fn while_loop_jumps_back_to_its_label() {
  let script = compile("i = 0; while (i < 3) { i++; }");
  let lines: Vec<&str> = script.lines().skip(3).collect();
  assert_eq!(
    lines,
    [
      "set /a \"i=0\"",
      ":lbl1",
      "if !i! lss 3 (set /a __1=1) else (set /a __1=0)",
      "if !__1! neq 0 (",
      "set /a \"__2=!i!\"",
      "set /a \"i=!i!+1\"",
      "goto :lbl1",
      ")"
    ]
  );
}

#[test]
fn if_without_else_has_no_else_branch() {
  let script = compile("x = 1; if (x) x = 2;");
  assert_eq!(count(&script, ") else ("), 0);

  let with_else = compile("x = 1; if (x) { x = 2; } else { x = 3; }");
  assert_eq!(count(&with_else, ") else ("), 1);
  assert_eq!(count(&with_else, "set /a \"x=3\""), 1);
}

#[test]
fn process_builtin_is_set_up_once() {
  let script = compile("func f() { return process; } a = process; b = process;");
  assert_eq!(count(&script, "set __1[exitCode]=0"), 1);
  assert_eq!(count(&script, "set __1=__1"), 1);
  assert_eq!(count(&script, "set \"a=!__1!\""), 1);
  assert_eq!(count(&script, "set \"b=!__1!\""), 1);
}
