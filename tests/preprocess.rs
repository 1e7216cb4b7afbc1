use std::fs::{create_dir, File};
use std::io::Write;

use tempfile::tempdir;

use cxxpp::driver::Dui;
use cxxpp::engine::Engine;

fn dui(defines: &[&str], include_paths: &[&str], std: Option<&str>) -> Dui {
    Dui {
        defines: defines.iter().map(|s| s.to_string()).collect(),
        undefines: Vec::new(),
        include_paths: include_paths.iter().map(|s| s.to_string()).collect(),
        std: std.map(|s| s.to_string()),
        ..Dui::default()
    }
}

#[test]
fn conditional_compilation_with_define() {
    let source = "#ifdef FOO\nA\n#else\nB\n#endif\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&["FOO"], &[], None)).unwrap();
    assert_eq!("A", result.text.trim());
}

#[test]
fn conditional_compilation_without_define() {
    let source = "#ifdef FOO\nA\n#else\nB\n#endif\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("B", result.text.trim());
}

#[test]
fn function_like_macro_expansion() {
    let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3+1);\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    let collapsed: String = result.text.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!("inty=((3+1)*(3+1));", collapsed);
}

#[test]
fn token_pasting() {
    let source = "#define CAT(a,b) a##b\nCAT(foo, 42)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("foo42", result.text.trim());
}

#[test]
fn stringizing() {
    let source = "#define S(x) #x\nS(a + b)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("\"a + b\"", result.text.trim());
}

#[test]
fn has_include_cpp17() {
    let dir = tempdir().unwrap();
    File::create(dir.path().join("present.h")).unwrap().write_all(b"").unwrap();

    let source = "#if __has_include(<present.h>)\nX\n#else\nY\n#endif\n";
    let cfg = dui(&[], &[dir.path().to_str().unwrap()], Some("c++17"));
    let result = Engine::preprocess_source("t.cpp", source, &cfg).unwrap();
    assert_eq!("X", result.text.trim());

    let source = "#if __has_include(<absent.h>)\nX\n#else\nY\n#endif\n";
    let result = Engine::preprocess_source("t.cpp", source, &cfg).unwrap();
    assert_eq!("Y", result.text.trim());
}

#[test]
fn pragma_once_skips_second_inclusion() {
    let dir = tempdir().unwrap();
    create_dir(dir.path().join("sub")).ok();
    let header = dir.path().join("once.h");
    File::create(&header).unwrap().write_all(b"#pragma once\n#define A 1\nA\n").unwrap();

    let main = dir.path().join("main.c");
    File::create(&main)
        .unwrap()
        .write_all(b"#include \"once.h\"\n#include \"once.h\"\n")
        .unwrap();

    let cfg = dui(&[], &[], None);
    let result = Engine::preprocess(&main, &cfg).unwrap();
    let lines: Vec<&str> = result.text.lines().filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with("#line")).collect();
    assert_eq!(vec!["1"], lines);
}

#[test]
fn variadic_macro_empty_va_args_drops_comma() {
    let source = "#define M(a, ...) a,##__VA_ARGS__\nM(x)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("x", result.text.trim());
}

#[test]
fn division_by_zero_in_if_is_an_error() {
    let source = "#if 1/0\nA\n#endif\n";
    let err = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap_err();
    assert!(err.message.contains("zero"));
}

#[test]
fn include_nesting_depth_limit() {
    // `self.h` re-includes itself with no `#pragma once`, so the driver
    // recurses until the depth limit trips; the overflow is recorded and
    // that single include is skipped rather than aborting the whole run.
    let dir = tempdir().unwrap();
    File::create(dir.path().join("self.h")).unwrap().write_all(b"#include \"self.h\"\n").unwrap();
    let main = dir.path().join("main.c");
    File::create(&main).unwrap().write_all(b"#include \"self.h\"\n").unwrap();

    let mut cfg = dui(&[], &[], None);
    cfg.max_include_depth = 10;
    let result = Engine::preprocess(&main, &cfg).unwrap();
    assert!(result.diagnostics.iter().any(|d| matches!(d.kind, cxxpp::DiagnosticKind::IncludeNestedTooDeeply)));
}

#[test]
fn macro_usage_and_if_cond_logs_are_populated() {
    let source = "#define FOO 1\n#if FOO\nFOO\n#endif\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert!(!result.if_conds.is_empty());
    assert!(result.macro_usages.iter().any(|u| u.macro_name == "FOO"));
}

#[test]
fn forced_include_is_processed_before_main_source() {
    let dir = tempdir().unwrap();
    let forced = dir.path().join("forced.h");
    File::create(&forced).unwrap().write_all(b"#define GREETING 1\n").unwrap();

    let mut cfg = dui(&[], &[], None);
    cfg.includes = vec![forced.to_str().unwrap().to_string()];
    let source = "#ifdef GREETING\nhi\n#else\nbye\n#endif\n";
    let result = Engine::preprocess_source("t.c", source, &cfg).unwrap();
    let lines: Vec<&str> = result.text.lines().filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with("#line")).collect();
    assert_eq!(vec!["hi"], lines);
}

#[test]
fn bom_prefixed_source_is_accepted() {
    let mut source = String::from_utf8(vec![0xef, 0xbb, 0xbf]).unwrap();
    source.push_str("blub");
    let result = Engine::preprocess_source("t.c", &source, &dui(&[], &[], None)).unwrap();
    assert_eq!("blub", result.text.trim());
}

#[test]
fn token_pasting_macro_call_starting_a_line_is_not_dropped() {
    // `CAT(foo, 42)` is the first token on its line, so the replacement gets
    // spliced at the very front of the line's chunk.
    let source = "#define CAT_(a,b) a##b\n#define CAT(a,b) CAT_(a,b)\nCAT(bar, 7)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("bar7", result.text.trim());
}

#[test]
fn prefixed_string_and_char_literals_fuse_into_one_token() {
    let source = "#define S(x) #x\nS(u8\"hi\")\nS(L'a')\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    let lines: Vec<&str> = result.text.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(vec!["\"u8\\\"hi\\\"\"", "\"L'a'\""], lines);
}

#[test]
fn raw_string_with_wide_prefix_is_one_token() {
    let source = "#define S(x) #x\nS(uR\"(a(b)c)\")\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("\"uR\\\"(a(b)c)\\\"\"", result.text.trim());
}

#[test]
fn unterminated_string_literal_is_a_syntax_error() {
    let source = "char *s = \"unterminated\n";
    let err = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap_err();
    assert!(matches!(err.kind, cxxpp::DiagnosticKind::SyntaxError));
}

#[test]
fn function_like_command_line_define() {
    let source = "SQ(3)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&["SQ(x)=((x)*(x))"], &[], None)).unwrap();
    let collapsed: String = result.text.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!("((3)*(3))", collapsed);
}

#[test]
fn malformed_command_line_define_is_recorded_as_dui_error() {
    let source = "int x;\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&["(bad"], &[], None)).unwrap();
    assert!(result.diagnostics.iter().any(|d| matches!(d.kind, cxxpp::DiagnosticKind::DuiError)));
}

#[test]
fn utf8_text_inside_a_string_literal_is_not_an_unhandled_char() {
    let source = "const char *s = \"café\";\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert!(result.text.contains("café"));
}

#[test]
fn alternative_operator_keywords_are_not_zeroed_in_if() {
    let source = "#if 1 or 0\nA\n#else\nB\n#endif\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("A", result.text.trim());
}

#[test]
fn macro_argument_self_reference_is_not_painted_blue() {
    let source = "#define f(x) x x\nf(f(1))\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    let collapsed: String = result.text.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!("1111", collapsed);
}

#[test]
fn stringify_advances_same_file_lines_with_newlines_not_line_directives() {
    let source = "A\nB\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    assert_eq!("A\nB", result.text.trim());
}

#[test]
fn backslash_followed_by_trailing_spaces_before_newline_still_splices() {
    let source = "#define M(a, b) a b\nM(1, \\   \n2)\n";
    let result = Engine::preprocess_source("t.c", source, &dui(&[], &[], None)).unwrap();
    let collapsed: String = result.text.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!("12", collapsed);
}
