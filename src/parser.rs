//! The makefile parser.
//!
//! [`Parser::apply`] pulls logical lines from an [`InputStream`] and
//! classifies each one in a fixed order: blank line, dot directive, macro
//! assignment, inference rule, description block. Anything else is logged
//! and skipped. Sub-parsers live in the submodules; after the stream is
//! exhausted the target graph is validated (cycles, timestamps, inference
//! rule preselection) before the finished [`Makefile`] is handed back.
//!
//! Leading whitespace is semantic (a line starting with a space or tab is
//! a command line, never a target), so classification works on untrimmed
//! text.

use std::sync::Arc;

use camino::Utf8Path;

use crate::error::ParseError;
use crate::fsmeta::FileMetaProvider;
use crate::input::{InputCursor, InputStream};
use crate::macros::MacroTable;
use crate::makefile::{DescriptionBlock, Makefile};
use crate::regex;

mod commands;
mod description;
mod directives;
mod inference;
mod validate;

/// Behavioural switches read once when parsing starts.
///
/// `suppress_output_messages` seeds silent mode for every parsed command;
/// `stop_on_errors = false` seeds ignore-exit-codes mode.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Start with `.SILENT` behaviour enabled.
    pub suppress_output_messages: bool,
    /// When `false`, commands default to ignoring their exit codes.
    pub stop_on_errors: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            suppress_output_messages: false,
            stop_on_errors: true,
        }
    }
}

/// Extensions tried by inference-rule matching before any `.SUFFIXES`
/// directive runs.
const INITIAL_SUFFIXES: [&str; 12] = [
    ".exe", ".obj", ".asm", ".c", ".cpp", ".cxx", ".bas", ".cbl", ".for", ".pas", ".res", ".rc",
];

/// Builds a [`Makefile`] from a stream of logical lines.
pub struct Parser<S, M> {
    cursor: InputCursor<S>,
    meta: M,
    makefile: Makefile,
    active_targets: Vec<String>,
    silent_commands: bool,
    ignore_exit_codes: bool,
    suffixes: Arc<Vec<String>>,
}

impl<S: InputStream, M: FileMetaProvider> Parser<S, M> {
    /// Parse `stream` against `macro_table` and validate the result.
    ///
    /// `active_targets` are the targets the caller intends to build; when
    /// empty, the first target defined in the makefile is used. Cycle
    /// detection runs from each active target, timestamps are propagated
    /// over the whole graph, and inference rules are preselected.
    ///
    /// # Errors
    ///
    /// Any [`ParseError`] raised by a sub-parser or by graph validation.
    pub fn apply(
        stream: S,
        macro_table: MacroTable,
        meta: M,
        options: &Options,
        active_targets: Vec<String>,
    ) -> Result<Makefile, ParseError> {
        let suffixes = INITIAL_SUFFIXES.iter().map(|s| (*s).to_owned()).collect();
        let mut parser = Self {
            cursor: InputCursor::new(stream),
            meta,
            makefile: Makefile::new(macro_table),
            active_targets,
            silent_commands: options.suppress_output_messages,
            ignore_exit_codes: !options.stop_on_errors,
            suffixes: Arc::new(suffixes),
        };
        parser.run()?;
        Ok(parser.makefile)
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(line) = self.cursor.current().map(str::to_owned) {
            if line.trim().is_empty() {
                self.cursor.advance();
            } else if let Some((directive, value)) = directives::match_directive(&line) {
                self.parse_dot_directive(directive, &value);
            } else if let Some((name, value)) = match_macro_assignment(&line) {
                self.parse_macro_assignment(name, value)?;
            } else if inference::is_inference_rule(&line) {
                self.parse_inference_rule(&line)?;
            } else if let Some((separator_pos, separator_len)) = description_block_separator(&line)
            {
                self.parse_description_block(&line, separator_pos, separator_len)?;
            } else {
                tracing::warn!(
                    line = self.cursor.line_number(),
                    text = %line,
                    "don't know what to do",
                );
                self.cursor.advance();
            }
        }
        self.finish()
    }

    /// A macro definition reaching the parser as a logical line.
    fn parse_macro_assignment(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        let line = self.cursor.line_number();
        self.makefile
            .macro_table_mut()
            .set(name, value)
            .map_err(|e| ParseError::from_macro(line, e))?;
        self.cursor.advance();
        Ok(())
    }

    /// Graph checks and annotations run once the stream is exhausted.
    fn finish(&mut self) -> Result<(), ParseError> {
        for name in &self.active_targets {
            if self.makefile.target(name).is_none() {
                return Err(ParseError::MissingActiveTarget {
                    target: name.clone(),
                });
            }
        }
        if self.active_targets.is_empty()
            && let Some(first) = self.makefile.first_target()
        {
            self.active_targets.push(first.target.clone());
        }

        for name in self.active_targets.clone() {
            validate::check_for_cycles(&self.makefile, &name)?;
        }
        self.update_time_stamps();
        self.preselect_inference_rules();
        Ok(())
    }

    /// Register a new target, stating its file to seed existence and
    /// timestamp.
    fn create_target(&mut self, name: &str) {
        let mut block = DescriptionBlock::new(name.to_owned(), Arc::clone(&self.suffixes));
        let path = Utf8Path::new(name);
        block.file_exists = self.meta.exists(path);
        if block.file_exists {
            block.time_stamp = self.meta.mtime(path);
        }
        self.makefile.append(block);
    }
}

/// Locate the `:`/`::` separator of a description block, returning its
/// byte position and length. Lines led by whitespace are command lines and
/// never match.
fn description_block_separator(line: &str) -> Option<(usize, usize)> {
    if line.is_empty() || line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }
    let separator_pos = line.find(':')?;
    let separator_len = if line[separator_pos + 1..].starts_with(':') {
        2
    } else {
        1
    };
    Some((separator_pos, separator_len))
}

/// Split a `NAME = value` macro assignment line.
fn match_macro_assignment(line: &str) -> Option<(&str, &str)> {
    let caps = regex!(r"^([^\s=]+)\s*=\s*(.*?)\s*$").captures(line)?;
    let name = caps.get(1)?.as_str();
    let value = caps.get(2)?.as_str();
    Some((name, value))
}
