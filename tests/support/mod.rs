//! Shared helpers for the integration test suites.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use time::OffsetDateTime;

use nmakefile::error::ParseError;
use nmakefile::fsmeta::FileMetaProvider;
use nmakefile::input::StringInput;
use nmakefile::macros::MacroTable;
use nmakefile::makefile::Makefile;
use nmakefile::parser::{Options, Parser};

/// An in-memory filesystem view: only registered files exist.
#[derive(Debug, Default)]
pub struct FakeFileMeta {
    files: HashMap<Utf8PathBuf, OffsetDateTime>,
}

impl FakeFileMeta {
    pub fn with_file(mut self, path: &str, stamp: OffsetDateTime) -> Self {
        self.files.insert(Utf8PathBuf::from(path), stamp);
        self
    }
}

impl FileMetaProvider for FakeFileMeta {
    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.contains_key(path)
    }

    fn mtime(&self, path: &Utf8Path) -> Option<OffsetDateTime> {
        self.files.get(path).copied()
    }
}

/// Parse `text` with an empty macro table, no files, and default options.
pub fn parse(text: &str) -> Result<Makefile, ParseError> {
    parse_with(text, FakeFileMeta::default(), &[])
}

/// Parse `text` with the given filesystem view and active targets.
pub fn parse_with(
    text: &str,
    meta: FakeFileMeta,
    active_targets: &[&str],
) -> Result<Makefile, ParseError> {
    Parser::apply(
        StringInput::new(text),
        MacroTable::new(),
        meta,
        &Options::default(),
        active_targets.iter().map(|s| (*s).to_owned()).collect(),
    )
}
