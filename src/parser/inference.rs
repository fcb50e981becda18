//! Inference rules: `{frompath}.fromext{topath}.toext:` declarations.

use crate::error::ParseError;
use crate::fsmeta::FileMetaProvider;
use crate::input::InputStream;
use crate::makefile::InferenceRule;
use crate::regex;

use super::Parser;

const RULE_PATTERN: &str = r"^(\{.*\})?(\.\w+)(\{.*\})?(\.\w+)(:{1,2})$";

/// Whether the whole line is an inference-rule declaration.
///
/// Lines that also look like description blocks (such as `.c.obj:`) are
/// inference rules; the dispatcher tests this first.
pub(super) fn is_inference_rule(line: &str) -> bool {
    regex!(RULE_PATTERN).is_match(line)
}

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Parse the current line as an inference rule and collect its recipe.
    ///
    /// Commands are stored without macro expansion; they are expanded when
    /// the rule is applied to a concrete target. A rule equal to an
    /// existing one (same paths and extensions) replaces it.
    pub(super) fn parse_inference_rule(&mut self, line: &str) -> Result<(), ParseError> {
        let Some(caps) = regex!(RULE_PATTERN).captures(line) else {
            return Ok(());
        };
        let mut rule = InferenceRule {
            from_search_path: normalize_search_path(caps.get(1).map(|m| m.as_str())),
            from_extension: caps.get(2).map_or("", |m| m.as_str()).to_owned(),
            to_search_path: normalize_search_path(caps.get(3).map(|m| m.as_str())),
            to_extension: caps.get(4).map_or("", |m| m.as_str()).to_owned(),
            batch_mode: caps.get(5).is_some_and(|m| m.as_str().len() > 1),
            commands: Vec::new(),
        };

        self.cursor.advance();
        while self.parse_command(&mut rule.commands, true)? {
            self.cursor.advance();
        }

        tracing::debug!(
            from = %rule.from_search_path,
            from_ext = %rule.from_extension,
            to = %rule.to_search_path,
            to_ext = %rule.to_extension,
            batch = rule.batch_mode,
            "parsed inference rule",
        );
        self.makefile.add_inference_rule(rule);
        Ok(())
    }
}

/// Strip the braces from a search-path capture, default an absent or empty
/// path to `.`, and drop a trailing directory separator.
fn normalize_search_path(capture: Option<&str>) -> String {
    let path = capture
        .and_then(|c| c.strip_prefix('{'))
        .and_then(|c| c.strip_suffix('}'))
        .unwrap_or("");
    if path.is_empty() {
        return ".".to_owned();
    }
    let path = path
        .strip_suffix(['/', '\\'])
        .unwrap_or(path);
    path.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare(".c.obj:", true)]
    #[case::batch(".c.obj::", true)]
    #[case::with_paths("{src}.c{obj}.obj:", true)]
    #[case::from_path_only("{src}.c.obj:", true)]
    #[case::trailing_text(".c.obj: foo", false)]
    #[case::description_block("all: dep", false)]
    #[case::directive(".SUFFIXES: .c", false)]
    #[case::no_second_extension(".c:", false)]
    fn rule_recognition(#[case] line: &str, #[case] matches: bool) {
        assert_eq!(is_inference_rule(line), matches);
    }

    #[rstest]
    #[case::absent(None, ".")]
    #[case::empty_braces(Some("{}"), ".")]
    #[case::plain(Some("{src}"), "src")]
    #[case::trailing_slash(Some("{src/}"), "src")]
    #[case::trailing_backslash(Some("{src\\}"), "src")]
    #[case::nested(Some("{src/gen}"), "src/gen")]
    fn search_path_normalization(#[case] capture: Option<&str>, #[case] expected: &str) {
        assert_eq!(normalize_search_path(capture), expected);
    }
}
