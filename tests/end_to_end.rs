//! End-to-end scenarios from the preprocessor's contract (the six
//! concrete scenarios plus the universal invariants): writes a real
//! file to a temp directory, runs `fortiel::preprocess_file` against
//! it, and asserts on the file it wrote.

use std::fs;

use fortiel::{preprocess_file, Options};

fn run(source: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.f");
    let output_path = dir.path().join("output.f");
    fs::write(&input_path, source).unwrap();

    let mut options = Options::default();
    options.install_dir = None;
    preprocess_file(&input_path, Some(&output_path), &options).unwrap();

    fs::read_to_string(&output_path).unwrap()
}

fn run_with_options(source: &str, configure: impl FnOnce(&mut Options)) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.f");
    let output_path = dir.path().join("output.f");
    fs::write(&input_path, source).unwrap();

    let mut options = Options::default();
    options.install_dir = None;
    configure(&mut options);
    preprocess_file(&input_path, Some(&output_path), &options).unwrap();

    fs::read_to_string(&output_path).unwrap()
}

fn code_lines(output: &str) -> Vec<&str> {
    output.lines().filter(|line| !line.trim_start().starts_with('#')).collect()
}

#[test]
fn scenario_1_value_let_and_expression_substitution() {
    let output = run("#@ let N = 3\nprint *, ${N*N}$\n");
    assert_eq!(code_lines(&output), vec!["print *, 9"]);
}

#[test]
fn scenario_2_do_loop_emits_inclusive_range() {
    let output = run("#@ do I = (1, 3)\n  x($I) = 0\n#@ end do\n");
    assert_eq!(code_lines(&output), vec!["  x(1) = 0", "  x(2) = 0", "  x(3) = 0"]);
}

#[test]
fn scenario_3_if_elif_else_picks_matching_branch() {
    let output = run("#@ let K = 2\n#@ if K==1\nA\n#@ else if K==2\nB\n#@ else\nC\n#@ end if\n");
    assert_eq!(code_lines(&output), vec!["B"]);
}

#[test]
fn scenario_4_use_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let defs_path = dir.path().join("defs.fi");
    fs::write(&defs_path, "should_never_appear = 1\n").unwrap();

    let input_path = dir.path().join("input.f");
    fs::write(
        &input_path,
        "#@ use \"defs.fi\"\n#@ use \"defs.fi\"\nprint *, 1\n",
    )
    .unwrap();
    let output_path = dir.path().join("output.f");

    let mut options = Options::default();
    options.install_dir = None;
    preprocess_file(&input_path, Some(&output_path), &options).unwrap();
    let output = fs::read_to_string(&output_path).unwrap();

    assert!(!output.contains("should_never_appear"));
    assert!(code_lines(&output).contains(&"print *, 1"));
}

#[test]
fn scenario_5_macro_with_pattern_and_capture_preserves_indent() {
    let output = run(
        "#@ macro SQUARE ^(?P<x>.+)$\n($x)*($x)\n#@ end macro\n  @SQUARE a+1\n",
    );
    assert_eq!(code_lines(&output), vec!["  (a+1)*(a+1)"]);
}

#[test]
fn scenario_6_once_section_cannot_match_twice() {
    let source = "\
#@ macro M (?P<arg>.*)
M: $arg
#@ section HEAD (?P<arg>.*)
head: $arg
#@ section once BODY (?P<arg>.*)
body: $arg
#@ section TAIL (?P<arg>.*)
tail: $arg
#@ finally
finally
#@ end macro
@M x
@HEAD y
@BODY z
@BODY w
@endM
";
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.f");
    fs::write(&input_path, source).unwrap();
    let mut options = Options::default();
    options.install_dir = None;
    // The first `@BODY` matches and advances the section cursor past
    // the `once` section; the second has nothing left to match.
    let error = preprocess_file(&input_path, None, &options).unwrap_err();
    assert!(error.to_string().contains("unexpected call section"));
}

#[test]
fn scenario_6_finally_runs_after_a_matched_once_section() {
    let source = "\
#@ macro M (?P<arg>.*)
M: $arg
#@ section once BODY (?P<arg>.*)
body: $arg
#@ finally
finally
#@ end macro
@M x
@BODY y
@endM
";
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.f");
    fs::write(&input_path, source).unwrap();
    let output_path = dir.path().join("output.f");
    let mut options = Options::default();
    options.install_dir = None;
    preprocess_file(&input_path, Some(&output_path), &options).unwrap();
    let output = fs::read_to_string(&output_path).unwrap();
    assert_eq!(code_lines(&output), vec!["M: x", "body: y", "finally"]);
}

#[test]
fn universal_preservation_of_directiveless_files() {
    let output = run("integer :: x\nx = 1\nprint *, x\n");
    assert_eq!(code_lines(&output), vec!["integer :: x", "x = 1", "print *, x"]);
}

#[test]
fn universal_line_markers_precede_blocks_in_fpp_format() {
    let output = run("x = 1\n");
    let first_line = output.lines().next().unwrap();
    assert!(first_line.starts_with("# 1 \""));
}

#[test]
fn universal_none_marker_format_omits_markers() {
    let output = run_with_options("x = 1\n", |options| options.marker_format = fortiel::MarkerFormat::None);
    assert!(!output.contains('#'));
}

#[test]
fn universal_continuation_neutrality() {
    let joined = run("#@ let N = 1 + &\n  &2\nprint *, ${N}$\n");
    let oneline = run("#@ let N = 1 + 2\nprint *, ${N}$\n");
    assert_eq!(code_lines(&joined), code_lines(&oneline));
}

#[test]
fn cli_define_preseeds_scope() {
    let output = run_with_options("print *, ${GREETING}$\n", |options| {
        options.defines.push(("GREETING".to_string(), Some("\"hi\"".to_string())));
    });
    assert_eq!(code_lines(&output), vec!["print *, hi"]);
}

#[test]
fn unknown_macro_call_reports_fatal_error_format() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.f");
    fs::write(&input_path, "@Bogus arg\n").unwrap();

    let mut options = Options::default();
    options.install_dir = None;
    let error = preprocess_file(&input_path, None, &options).unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("Fatal Error:"));
    assert!(rendered.contains(&input_path.display().to_string()));
}
