//! Logical-line input for the parser.
//!
//! The preprocessor (directive handling, line continuation, file
//! inclusion) is an external collaborator. The parser consumes its output
//! through
//! [`InputStream`], one logical line at a time, and tracks the current line
//! with [`InputCursor`]. [`StringInput`] serves in-memory text for tests and
//! embedders that preprocess elsewhere.

/// A source of preprocessed logical lines.
///
/// Implementations must return lines without trailing newlines and with all
/// continuations already joined. `line_number` reports the position of the
/// most recently returned line for diagnostics.
pub trait InputStream {
    /// Produce the next logical line, or `None` at end of input.
    fn read_line(&mut self) -> Option<String>;

    /// Line number of the line most recently returned by `read_line`.
    fn line_number(&self) -> u32;
}

/// An [`InputStream`] over an in-memory string, splitting on `\n`.
#[derive(Debug)]
pub struct StringInput {
    lines: Vec<String>,
    next: usize,
}

impl StringInput {
    /// Split `text` into logical lines. A trailing newline does not produce
    /// an extra empty line.
    #[must_use]
    pub fn new(text: &str) -> Self {
        if text.is_empty() {
            return Self {
                lines: Vec::new(),
                next: 0,
            };
        }
        let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        if text.ends_with('\n') {
            lines.pop();
        }
        Self { lines, next: 0 }
    }
}

impl InputStream for StringInput {
    fn read_line(&mut self) -> Option<String> {
        let line = self.lines.get(self.next).cloned()?;
        self.next += 1;
        Some(line)
    }

    fn line_number(&self) -> u32 {
        u32::try_from(self.next).unwrap_or(u32::MAX)
    }
}

/// Holds the line currently under consideration by the parser.
///
/// The dispatcher and every sub-parser advance through the same cursor, so
/// "the current line" has a single owner and sub-parsers can leave a
/// non-command line in place for the dispatcher to reclassify.
#[derive(Debug)]
pub struct InputCursor<S> {
    stream: S,
    current: Option<String>,
}

impl<S: InputStream> InputCursor<S> {
    /// Wrap `stream` and pull the first line.
    pub fn new(mut stream: S) -> Self {
        let current = stream.read_line();
        Self { stream, current }
    }

    /// The line under consideration, `None` once the stream is exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Replace the current line with the next one from the stream.
    pub fn advance(&mut self) {
        self.current = self.stream.read_line();
    }

    /// Line number of the current line.
    #[must_use]
    pub fn line_number(&self) -> u32 {
        self.stream.line_number()
    }
}
