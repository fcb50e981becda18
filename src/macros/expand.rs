//! Recursive macro expansion with substitution modifiers and cycle
//! detection.
//!
//! Expansion walks the input once, copying plain text and resolving each
//! `$` site. Macro values are themselves expanded recursively; a per-call
//! set of in-progress names catches cycles while still allowing the same
//! macro to appear several times side by side. Filename macros (`$@`, `$<`,
//! `$*`, `$?`) cannot be resolved without a target context, so they are
//! re-emitted behind [`FILENAME_MACRO_ESCAPE`] for the executor to replace
//! later.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::error::MacroError;

use super::table::MacroTable;

/// Sentinel prefixed to a preserved filename macro form.
///
/// The byte-order mark never occurs in makefile text, so downstream
/// consumers treat anything after it as an unresolved filename macro.
/// Swap in a visible character when debugging filename macros.
pub const FILENAME_MACRO_ESCAPE: char = '\u{FEFF}';

/// Expand every `$` site in `text`.
///
/// With `in_dependents_line` set, `$$@` (and `$$(@`…`)`) is preserved as an
/// escaped filename macro instead of collapsing to a literal `$` plus text.
///
/// Returns `Cow::Borrowed` when `text` contains no `$` at all.
pub(crate) fn expand<'a>(
    table: &MacroTable,
    text: &'a str,
    in_dependents_line: bool,
) -> Result<Cow<'a, str>, MacroError> {
    if !text.contains('$') {
        return Ok(Cow::Borrowed(text));
    }
    let mut in_progress = HashSet::new();
    expand_with(table, text, in_dependents_line, &mut in_progress).map(Cow::Owned)
}

fn expand_with(
    table: &MacroTable,
    text: &str,
    in_dependents_line: bool,
    in_progress: &mut HashSet<String>,
) -> Result<String, MacroError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '$' && i + 1 < chars.len() {
            i += 1;
            let next = chars[i];
            if next == '(' {
                i = expand_parenthesized(table, &chars, i, in_dependents_line, in_progress, &mut out)?;
            } else if next == '$' {
                let mut filename_macro_found = false;
                if in_dependents_line {
                    // In a dependents line $$@ stands for the (escaped)
                    // target filename macro.
                    let mut j = i + 1;
                    let parenthesis = chars.get(j) == Some(&'(');
                    if parenthesis {
                        j += 1;
                    }
                    if chars.get(j) == Some(&'@') {
                        filename_macro_found = true;
                        out.push(FILENAME_MACRO_ESCAPE);
                        if parenthesis {
                            out.push('(');
                        }
                        out.push('@');
                        i = j;
                    }
                }
                if !filename_macro_found {
                    out.push('$');
                }
            } else if next.is_alphanumeric() {
                // Single character macro invocation a la $X.
                let name = next.to_string();
                let value = cycle_checked_value(table, &name, in_progress)?;
                let value = expand_with(table, &value, in_dependents_line, in_progress)?;
                in_progress.remove(&name);
                out.push_str(&value);
            } else {
                match next {
                    '<' | '*' | '@' | '?' => {
                        out.push(FILENAME_MACRO_ESCAPE);
                        out.push(next);
                    }
                    _ => return Err(MacroError::InvalidInvocation),
                }
            }
        } else {
            out.push(ch);
        }
        i += 1;
    }
    Ok(out)
}

/// Expand a `$(`…`)` invocation with the opening parenthesis at `chars[i]`.
/// Returns the index of the closing parenthesis.
fn expand_parenthesized(
    table: &MacroTable,
    chars: &[char],
    i: usize,
    in_dependents_line: bool,
    in_progress: &mut HashSet<String>,
    out: &mut String,
) -> Result<usize, MacroError> {
    let mut name_end = None;
    let mut close = None;
    let mut j = i + 1;
    while j < chars.len() {
        match chars[j] {
            ':' if name_end.is_none() => name_end = Some(j),
            ')' => {
                close = Some(j);
                break;
            }
            _ => {}
        }
        j += 1;
    }
    let Some(mut invocation_end) = close else {
        return Err(MacroError::UnterminatedInvocation);
    };
    let name_end = name_end.unwrap_or(invocation_end);

    let name: String = chars[i + 1..name_end].iter().collect();
    if name.is_empty() {
        return Err(MacroError::MissingName);
    }

    match name.chars().next() {
        Some('<' | '*' | '@' | '?') => {
            // Parenthesized filename macro: preserve the whole tail,
            // substitution text and all, behind the escape marker.
            out.push(FILENAME_MACRO_ESCAPE);
            out.push('(');
            out.extend(&chars[i + 1..=invocation_end]);
        }
        _ => {
            let value = cycle_checked_value(table, &name, in_progress)?;
            let mut value = expand_with(table, &value, in_dependents_line, in_progress)?;
            if name_end != invocation_end {
                let substitution = parse_substitution(chars, name_end + 1)?;
                value = value.replace(&substitution.before, &substitution.after);
                invocation_end = substitution.end;
            }
            in_progress.remove(&name);
            out.push_str(&value);
        }
    }
    Ok(invocation_end)
}

fn cycle_checked_value(
    table: &MacroTable,
    name: &str,
    in_progress: &mut HashSet<String>,
) -> Result<String, MacroError> {
    if in_progress.contains(name) {
        return Err(MacroError::Cycle {
            name: name.to_owned(),
        });
    }
    in_progress.insert(name.to_owned());
    Ok(table.value(name).to_owned())
}

struct Substitution {
    before: String,
    after: String,
    /// Index of the closing parenthesis that ends the invocation.
    end: usize,
}

/// Parse the `before=after)` tail of a substitution invocation starting at
/// `chars[start]` (just past the `:`).
///
/// `^` quotes the next character: a quoted `=` is not the separator and a
/// quoted `)` does not terminate the invocation. Carets are stripped from
/// the emitted halves.
fn parse_substitution(chars: &[char], start: usize) -> Result<Substitution, MacroError> {
    let mut before = String::new();
    let mut after = String::new();
    let mut seen_equals = false;
    let mut i = start;
    while i < chars.len() {
        let ch = chars[i];
        let half = if seen_equals { &mut after } else { &mut before };
        if ch == '^' {
            if let Some(&quoted) = chars.get(i + 1) {
                half.push(quoted);
                i += 2;
                continue;
            }
            // A dangling quote swallows nothing; the invocation is left
            // unterminated and reported below.
        } else if ch == '=' && !seen_equals {
            seen_equals = true;
        } else if ch == ')' {
            if seen_equals {
                return Ok(Substitution {
                    before,
                    after,
                    end: i,
                });
            }
            return Err(MacroError::BadSubstitution);
        } else {
            half.push(ch);
        }
        i += 1;
    }
    Err(MacroError::BadSubstitution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table(entries: &[(&str, &str)]) -> MacroTable {
        let mut table = MacroTable::new();
        for (name, value) in entries {
            table.set(name, value).expect("set");
        }
        table
    }

    #[test]
    fn text_without_dollar_is_returned_borrowed() {
        let table = MacroTable::new();
        let expanded = table.expand("plain text, no macros").expect("expand");
        assert!(matches!(expanded, Cow::Borrowed(_)));
    }

    #[rstest]
    #[case::plain("$(A)", "one")]
    #[case::embedded("x $(A) y", "x one y")]
    #[case::adjacent("$(A)$(A)", "oneone")]
    #[case::single_char("$B!", "two!")]
    #[case::escaped_dollar("a$$b", "a$b")]
    #[case::trailing_dollar("cost$", "cost$")]
    #[case::undefined("<$(NOPE)>", "<>")]
    fn basic_expansion(#[case] input: &str, #[case] expected: &str) {
        let table = table(&[("A", "one"), ("B", "two")]);
        assert_eq!(table.expand(input).expect("expand"), expected);
    }

    #[test]
    fn nested_macros_expand_recursively() {
        let table = table(&[("A", "$(B) end"), ("B", "deep")]);
        assert_eq!(table.expand("$(A)").expect("expand"), "deep end");
    }

    #[test]
    fn sibling_references_to_same_macro_are_not_a_cycle() {
        let table = table(&[("A", "a"), ("B", "$(A) $(A)")]);
        assert_eq!(table.expand("$(B) $(B)").expect("expand"), "a a a a");
    }

    #[test]
    fn self_referencing_macro_is_a_cycle() {
        // The single-character form dodges the assignment-time
        // self-reference replacement, leaving a genuine cycle.
        let table = table(&[("A", "x$A")]);
        let err = table.expand("$A").expect_err("cycle");
        assert_eq!(err, MacroError::Cycle { name: "A".into() });
    }

    #[test]
    fn mutual_recursion_is_a_cycle() {
        let table = table(&[("A", "$(B)"), ("B", "$(A)")]);
        let err = table.expand("$(A)").expect_err("cycle");
        assert!(matches!(err, MacroError::Cycle { .. }));
    }

    #[rstest]
    #[case::unterminated("$(A", MacroError::UnterminatedInvocation)]
    #[case::empty_name("$()", MacroError::MissingName)]
    #[case::colon_first("$(:a=b)", MacroError::MissingName)]
    #[case::no_equals("$(A:xy)", MacroError::BadSubstitution)]
    #[case::unknown_form("$-flag", MacroError::InvalidInvocation)]
    fn malformed_invocations(#[case] input: &str, #[case] expected: MacroError) {
        let table = table(&[("A", "aaa")]);
        assert_eq!(table.expand(input).expect_err("must fail"), expected);
    }

    #[rstest]
    #[case::simple("$(X:a=b)", "aaa", "bbb")]
    #[case::multi_char("$(X:obj=lib)", "a.obj b.obj", "a.lib b.lib")]
    #[case::no_match("$(X:zz=yy)", "aaa", "aaa")]
    #[case::empty_after("$(X:a=)", "abc", "bc")]
    fn substitution_invocations(#[case] input: &str, #[case] value: &str, #[case] expected: &str) {
        let table = table(&[("X", value)]);
        assert_eq!(table.expand(input).expect("expand"), expected);
    }

    #[test]
    fn substitution_applies_to_the_expanded_value() {
        let table = table(&[("X", "$(Y)"), ("Y", "aaa")]);
        assert_eq!(table.expand("$(X:a=b)").expect("expand"), "bbb");
    }

    #[test]
    fn quoted_equals_in_before_is_literal() {
        let table = table(&[("X", "debug=1")]);
        assert_eq!(table.expand("$(X:^==^))").expect("expand"), "debug)1");
    }

    #[test]
    fn quoted_paren_in_after_does_not_terminate() {
        let table = table(&[("X", "ab")]);
        assert_eq!(table.expand("$(X:b=^))").expect("expand"), "a)");
    }

    #[test]
    fn quoted_caret_stays_literal() {
        let table = table(&[("X", "a^b")]);
        assert_eq!(table.expand("$(X:^^=-)").expect("expand"), "a-b");
    }

    #[rstest]
    #[case::target("$@")]
    #[case::source("$<")]
    #[case::base("$*")]
    #[case::newer("$?")]
    fn short_filename_macros_are_escaped(#[case] input: &str) {
        let table = MacroTable::new();
        let expanded = table.expand(input).expect("expand");
        let mut expected = String::from(FILENAME_MACRO_ESCAPE);
        expected.push_str(&input[1..]);
        assert_eq!(expanded, expected);
    }

    #[test]
    fn parenthesized_filename_macro_preserves_tail() {
        let table = MacroTable::new();
        let expanded = table.expand("$(@D)").expect("expand");
        assert_eq!(expanded, format!("{FILENAME_MACRO_ESCAPE}(@D)"));
    }

    #[test]
    fn parenthesized_filename_macro_keeps_substitution_text() {
        let table = table(&[("A", "unused")]);
        let expanded = table.expand("$(<:.c=.obj)").expect("expand");
        assert_eq!(expanded, format!("{FILENAME_MACRO_ESCAPE}(<:.c=.obj)"));
    }

    #[test]
    fn double_dollar_at_target_is_literal_outside_dependents_lines() {
        let table = MacroTable::new();
        assert_eq!(table.expand("$$@").expect("expand"), "$@");
    }

    #[test]
    fn dependents_line_preserves_escaped_target_macro() {
        let table = MacroTable::new();
        let expanded = table.expand_in_dependents_line("$$@").expect("expand");
        assert_eq!(expanded, format!("{FILENAME_MACRO_ESCAPE}@"));
    }

    #[test]
    fn dependents_line_preserves_parenthesized_escape() {
        let table = MacroTable::new();
        let expanded = table.expand_in_dependents_line("$$(@D)").expect("expand");
        assert_eq!(expanded, format!("{FILENAME_MACRO_ESCAPE}(@D)"));
    }

    #[test]
    fn dependents_line_still_collapses_plain_double_dollar() {
        let table = MacroTable::new();
        assert_eq!(table.expand_in_dependents_line("$$x").expect("expand"), "$x");
    }

    #[test]
    fn expansion_is_idempotent_on_closed_results() {
        let table = table(&[("A", "one"), ("B", "$(A) two")]);
        let once = table.expand("$(B)").expect("expand").into_owned();
        let twice = table.expand(&once).expect("expand");
        assert_eq!(once, twice);
    }
}
