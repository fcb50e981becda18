//! Parser and evaluator for NMAKE-style makefiles.
//!
//! Input text that has already been preprocessed into a stream of logical
//! lines (see [`input::InputStream`]) is transformed into an in-memory
//! [`makefile::Makefile`] build graph for a downstream executor. The crate
//! covers the macro table and expansion engine and the makefile parser with
//! its graph validation; preprocessing, command execution, and the CLI are
//! external collaborators.
//!
//! ```rust
//! use nmakefile::fsmeta::SystemFileMeta;
//! use nmakefile::input::StringInput;
//! use nmakefile::macros::MacroTable;
//! use nmakefile::parser::{Options, Parser};
//!
//! let text = "CC = cl\n\
//!             all: app.exe\n\
//!             app.exe:\n\
//!             \t$(CC) main.c\n";
//! let makefile = Parser::apply(
//!     StringInput::new(text),
//!     MacroTable::new(),
//!     SystemFileMeta,
//!     &Options::default(),
//!     Vec::new(),
//! )
//! .expect("parse");
//!
//! assert_eq!(makefile.first_target().map(|t| t.target.as_str()), Some("all"));
//! let app = makefile.target("app.exe").expect("target");
//! assert_eq!(app.commands[0].command_line, "cl main.c");
//! ```

macro_rules! regex {
    ($pattern:expr) => {{
        use std::sync::OnceLock;
        static REGEX: OnceLock<regex::Regex> = OnceLock::new();
        REGEX.get_or_init(|| regex::Regex::new($pattern).unwrap_or_else(|e| panic!("{e}")))
    }};
}
pub(crate) use regex;

pub mod error;
pub mod fsmeta;
pub mod input;
pub mod macros;
pub mod makefile;
pub mod parser;
