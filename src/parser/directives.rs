//! Dot directives: `.SUFFIXES`, `.IGNORE`, `.PRECIOUS`, `.SILENT`.

use std::sync::Arc;

use crate::fsmeta::FileMetaProvider;
use crate::input::InputStream;
use crate::regex;

use super::Parser;

/// A recognised dot directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Directive {
    Ignore,
    Precious,
    Silent,
    Suffixes,
}

/// Match a dot-directive line, yielding the directive and the text after
/// the colon.
pub(super) fn match_directive(line: &str) -> Option<(Directive, String)> {
    let caps = regex!(r"^\.(IGNORE|PRECIOUS|SILENT|SUFFIXES)\s*:(.*)$").captures(line)?;
    let directive = match caps.get(1)?.as_str() {
        "IGNORE" => Directive::Ignore,
        "PRECIOUS" => Directive::Precious,
        "SILENT" => Directive::Silent,
        _ => Directive::Suffixes,
    };
    let value = caps.get(2).map_or("", |m| m.as_str()).to_owned();
    Some((directive, value))
}

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Apply a dot directive. The directive value is taken literally,
    /// without macro expansion.
    pub(super) fn parse_dot_directive(&mut self, directive: Directive, value: &str) {
        match directive {
            Directive::Suffixes => {
                let entries: Vec<String> =
                    value.split_whitespace().map(str::to_owned).collect();
                // Copy on write: blocks that captured the old list keep
                // observing it.
                if entries.is_empty() {
                    self.suffixes = Arc::new(Vec::new());
                } else {
                    let mut list = (*self.suffixes).clone();
                    list.extend(entries);
                    self.suffixes = Arc::new(list);
                }
            }
            Directive::Ignore => self.ignore_exit_codes = true,
            Directive::Silent => self.silent_commands = true,
            Directive::Precious => {
                for name in value.split_whitespace() {
                    self.makefile.add_precious_target(name);
                }
            }
        }
        self.cursor.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::suffixes(".SUFFIXES: .foo .bar", Some((Directive::Suffixes, " .foo .bar")))]
    #[case::suffixes_empty(".SUFFIXES:", Some((Directive::Suffixes, "")))]
    #[case::ignore(".IGNORE:", Some((Directive::Ignore, "")))]
    #[case::silent(".SILENT :", Some((Directive::Silent, "")))]
    #[case::precious(".PRECIOUS: a b", Some((Directive::Precious, " a b")))]
    #[case::unknown_directive(".PHONY: all", None)]
    #[case::plain_rule("all: dep", None)]
    fn directive_matching(#[case] line: &str, #[case] expected: Option<(Directive, &str)>) {
        let actual = match_directive(line);
        match (actual, expected) {
            (None, None) => {}
            (Some((d, v)), Some((ed, ev))) => {
                assert_eq!(d, ed);
                assert_eq!(v, ev);
            }
            (actual, expected) => panic!("mismatch: {actual:?} vs {expected:?}"),
        }
    }
}
