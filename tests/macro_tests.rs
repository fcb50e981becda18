//! Integration tests for the macro table and expansion engine.

use std::borrow::Cow;

use rstest::rstest;

use nmakefile::error::MacroError;
use nmakefile::macros::{FILENAME_MACRO_ESCAPE, MacroTable};

fn table(entries: &[(&str, &str)]) -> MacroTable {
    let mut table = MacroTable::new();
    for (name, value) in entries {
        table.set(name, value).expect("set");
    }
    table
}

#[test]
fn defined_iff_set_and_value_is_raw() {
    let mut t = MacroTable::new();
    assert!(!t.is_defined("A"));
    t.set("A", "$(B) tail").expect("set");
    assert!(t.is_defined("A"));
    assert_eq!(t.value("A"), "$(B) tail");
    t.undefine("A");
    assert!(!t.is_defined("A"));
}

#[test]
fn empty_value_still_counts_as_defined() {
    let mut t = MacroTable::new();
    t.set("EMPTY", "").expect("set");
    assert!(t.is_defined("EMPTY"));
    assert_eq!(t.value("EMPTY"), "");
}

#[test]
fn environment_macros_mirror_their_expansion() {
    let mut t = MacroTable::new();
    t.set("V", "1.2").expect("set");
    t.set_environment("pkg_version", "v$(V)", false);
    assert_eq!(t.value("PKG_VERSION"), "v$(V)");
    assert_eq!(t.environment().get("PKG_VERSION"), Some("v1.2"));

    // Every successful mutation refreshes the mirror.
    t.set("V", "1.3").expect("set");
    t.set("PKG_VERSION", "v$(V)-hotfix").expect("set");
    assert_eq!(t.environment().get("PKG_VERSION"), Some("v1.3-hotfix"));
}

#[test]
fn expansion_without_dollar_is_the_identity() {
    let t = MacroTable::new();
    let input = "no macros here";
    let expanded = t.expand(input).expect("expand");
    assert!(matches!(expanded, Cow::Borrowed(s) if std::ptr::eq(s, input)));
}

#[rstest]
#[case::escaped_dollar("$$", "$")]
#[case::escaped_in_text("a$$b", "a$b")]
#[case::substitution("$(X:a=b)", "bbb")]
fn boundary_expansions(#[case] input: &str, #[case] expected: &str) {
    let t = table(&[("X", "aaa")]);
    assert_eq!(t.expand(input).expect("expand"), expected);
}

#[test]
fn dependents_line_escape_survives_expansion() {
    let t = MacroTable::new();
    let expanded = t.expand_in_dependents_line("$$@").expect("expand");
    assert_eq!(expanded, format!("{FILENAME_MACRO_ESCAPE}@"));
}

#[test]
fn quoted_specials_in_substitution() {
    let t = table(&[("X", "name=value")]);
    // `^=` is a literal equals in the before half, `^)` a literal close
    // paren in the after half.
    assert_eq!(t.expand("$(X:^==^))").expect("expand"), "name)value");
}

#[test]
fn expansion_is_idempotent_on_closed_results() {
    let t = table(&[("A", "head"), ("B", "$(A) tail")]);
    let once = t.expand("$(B)").expect("expand").into_owned();
    let twice = t.expand(&once).expect("expand");
    assert_eq!(once, twice);
}

#[test]
fn acyclic_macro_graphs_terminate_and_cycles_fail() {
    let t = table(&[("A", "$(B) $(B)"), ("B", "$(C)"), ("C", "leaf")]);
    assert_eq!(t.expand("$(A)").expect("expand"), "leaf leaf");

    let cyclic = table(&[("A", "$(B)"), ("B", "$(A)")]);
    let err = cyclic.expand("$(A)").expect_err("cycle");
    assert!(matches!(err, MacroError::Cycle { .. }));
}

#[test]
fn read_only_macros_survive_makefile_assignment() {
    let mut t = MacroTable::new();
    t.set_command_line("CFG", "release").expect("define");
    t.set("CFG", "debug").expect("non-forced set is accepted");
    assert_eq!(t.value("CFG"), "release");
}
